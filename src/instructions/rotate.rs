//! 旋轉/移位與位元指令的處理模組
//!
//! 移出的位元進入 C；「經由進位」的版本 (RL/RR/RLA/RRA) 由舊的 C 補入。

use super::table::ShiftOp;
use crate::cpu::{Flag, Registers};

/// 執行 CB 前綴的旋轉/移位 (Z 依結果設定)
pub fn shift(regs: &mut Registers, op: ShiftOp, value: u8) -> u8 {
    let carry_in = regs.flag(Flag::C) as u8;
    let (result, carry_out) = match op {
        ShiftOp::Rlc => (value.rotate_left(1), value & 0x80 != 0),
        ShiftOp::Rrc => (value.rotate_right(1), value & 0x01 != 0),
        ShiftOp::Rl => ((value << 1) | carry_in, value & 0x80 != 0),
        ShiftOp::Rr => ((value >> 1) | (carry_in << 7), value & 0x01 != 0),
        ShiftOp::Sla => (value << 1, value & 0x80 != 0),
        // SRA 保留符號位元
        ShiftOp::Sra => ((value >> 1) | (value & 0x80), value & 0x01 != 0),
        ShiftOp::Swap => (value.rotate_left(4), false),
        ShiftOp::Srl => (value >> 1, value & 0x01 != 0),
    };
    regs.set_flags(result == 0, false, false, carry_out);
    result
}

/// RLCA/RRCA/RLA/RRA：與 CB 版本相同但 Z 一律清除
pub fn rotate_accumulator(regs: &mut Registers, op: ShiftOp) {
    let a = regs.a;
    regs.a = shift(regs, op, a);
    regs.set_flag(Flag::Z, false);
}

/// BIT n,r：C 不變
pub fn bit(regs: &mut Registers, bit: u8, value: u8) {
    regs.set_flag(Flag::Z, value & (1 << bit) == 0);
    regs.set_flag(Flag::N, false);
    regs.set_flag(Flag::H, true);
}

pub fn res(bit: u8, value: u8) -> u8 {
    value & !(1 << bit)
}

pub fn set(bit: u8, value: u8) -> u8 {
    value | (1 << bit)
}
