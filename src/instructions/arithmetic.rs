//! 算術指令的處理模組
//!
//! 包含 ADD, ADC, SUB, SBC, AND, OR, XOR, CP, INC, DEC 與 16 位元加法。
//! H = 第 3 位元進位/借位，C = 第 7 位元 (16 位元運算為第 15 位元) 進位/借位。

use super::table::AluOp;
use crate::cpu::{Flag, Registers};

/// 對 A 執行一個 8 位元 ALU 運算，CP 只設定旗標
pub fn alu(regs: &mut Registers, op: AluOp, value: u8) {
    let a = regs.a;
    match op {
        AluOp::Add => regs.a = add(regs, a, value, false),
        AluOp::Adc => {
            let carry = regs.flag(Flag::C);
            regs.a = add(regs, a, value, carry);
        }
        AluOp::Sub => regs.a = sub(regs, a, value, false),
        AluOp::Sbc => {
            let carry = regs.flag(Flag::C);
            regs.a = sub(regs, a, value, carry);
        }
        AluOp::Cp => {
            sub(regs, a, value, false);
        }
        AluOp::And => {
            regs.a = a & value;
            regs.set_flags(regs.a == 0, false, true, false);
        }
        AluOp::Xor => {
            regs.a = a ^ value;
            regs.set_flags(regs.a == 0, false, false, false);
        }
        AluOp::Or => {
            regs.a = a | value;
            regs.set_flags(regs.a == 0, false, false, false);
        }
    }
}

fn add(regs: &mut Registers, a: u8, value: u8, carry_in: bool) -> u8 {
    let carry = carry_in as u16;
    let result = a as u16 + value as u16 + carry;
    let half = (a & 0x0F) as u16 + (value & 0x0F) as u16 + carry > 0x0F;
    let result8 = result as u8;
    regs.set_flags(result8 == 0, false, half, result > 0xFF);
    result8
}

fn sub(regs: &mut Registers, a: u8, value: u8, carry_in: bool) -> u8 {
    let carry = carry_in as i16;
    let result = a as i16 - value as i16 - carry;
    let half = ((a & 0x0F) as i16) - ((value & 0x0F) as i16) - carry < 0;
    let result8 = result as u8;
    regs.set_flags(result8 == 0, true, half, result < 0);
    result8
}

/// INC r：C 不變
pub fn inc8(regs: &mut Registers, value: u8) -> u8 {
    let result = value.wrapping_add(1);
    regs.set_flag(Flag::Z, result == 0);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::H, (value & 0x0F) == 0x0F);
    result
}

/// DEC r：C 不變
pub fn dec8(regs: &mut Registers, value: u8) -> u8 {
    let result = value.wrapping_sub(1);
    regs.set_flag(Flag::Z, result == 0);
    regs.set_flag(Flag::N, true);
    regs.set_flag(Flag::H, (value & 0x0F) == 0x00);
    result
}

/// ADD HL,rr：Z 不變，H 來自第 11 位元，C 來自第 15 位元
pub fn add_hl(regs: &mut Registers, value: u16) {
    let hl = regs.hl();
    let result = hl as u32 + value as u32;
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::H, (hl & 0x0FFF) + (value & 0x0FFF) > 0x0FFF);
    regs.set_flag(Flag::C, result > 0xFFFF);
    regs.set_hl(result as u16);
}

/// SP + e8 (ADD SP,e8 與 LD HL,SP+e8 共用)
///
/// 旗標由無號低位元組相加決定，Z 與 N 一律清除。
pub fn sp_plus_offset(regs: &mut Registers, offset: u8) -> u16 {
    let sp = regs.sp;
    let half = (sp & 0x000F) + (offset as u16 & 0x000F) > 0x000F;
    let carry = (sp & 0x00FF) + offset as u16 > 0x00FF;
    regs.set_flags(false, false, half, carry);
    sp.wrapping_add_signed(offset as i8 as i16)
}

/// DAA：依上一個運算 (N/H/C) 將 A 調整為 BCD
pub fn daa(regs: &mut Registers) {
    let mut a = regs.a;
    let mut carry = regs.flag(Flag::C);
    let half = regs.flag(Flag::H);

    if !regs.flag(Flag::N) {
        if carry || a > 0x99 {
            a = a.wrapping_add(0x60);
            carry = true;
        }
        if half || (a & 0x0F) > 0x09 {
            a = a.wrapping_add(0x06);
        }
    } else {
        if carry {
            a = a.wrapping_sub(0x60);
        }
        if half {
            a = a.wrapping_sub(0x06);
        }
    }

    regs.a = a;
    regs.set_flag(Flag::Z, a == 0);
    regs.set_flag(Flag::H, false);
    regs.set_flag(Flag::C, carry);
}
