//! 跳轉和控制流指令的處理模組
//!
//! 這個模組負責處理 JP, JR, CALL, RET, RETI, RST 等跳轉指令。
//! 條件不成立時返回 `Flow::NotTaken`，由 CPU 依指令長度前進 PC。

use super::table::Cond;
use super::Flow;
use crate::cpu::{Cpu, Flag};
use crate::interrupts::InterruptLines;
use crate::mmu::Mmu;

/// 檢查條件是否滿足 (無條件時永遠成立)
fn check_condition(cpu: &Cpu, cond: Option<Cond>) -> bool {
    match cond {
        None => true,
        Some(Cond::NZ) => !cpu.regs.flag(Flag::Z),
        Some(Cond::Z) => cpu.regs.flag(Flag::Z),
        Some(Cond::NC) => !cpu.regs.flag(Flag::C),
        Some(Cond::C) => cpu.regs.flag(Flag::C),
    }
}

/// JR [cc,]e8 - 相對於下一個指令的位址
pub fn jr(cpu: &mut Cpu, mmu: &Mmu, cond: Option<Cond>) -> Flow {
    if !check_condition(cpu, cond) {
        return Flow::NotTaken;
    }
    let offset = cpu.operand_byte(mmu, 1) as i8;
    cpu.regs.pc = cpu.regs.pc.wrapping_add(2).wrapping_add_signed(offset as i16);
    Flow::Jumped
}

/// JP [cc,]a16
pub fn jp(cpu: &mut Cpu, mmu: &Mmu, cond: Option<Cond>) -> Flow {
    if !check_condition(cpu, cond) {
        return Flow::NotTaken;
    }
    cpu.regs.pc = cpu.operand_word(mmu);
    Flow::Jumped
}

pub fn jp_hl(cpu: &mut Cpu) -> Flow {
    cpu.regs.pc = cpu.regs.hl();
    Flow::Jumped
}

/// CALL [cc,]a16 - 推入下一個指令的位址
pub fn call(cpu: &mut Cpu, mmu: &mut Mmu, cond: Option<Cond>) -> Flow {
    if !check_condition(cpu, cond) {
        return Flow::NotTaken;
    }
    let target = cpu.operand_word(mmu);
    let return_addr = cpu.regs.pc.wrapping_add(3);
    cpu.push_word(mmu, return_addr);
    cpu.regs.pc = target;
    Flow::Jumped
}

/// RET [cc]
pub fn ret(cpu: &mut Cpu, mmu: &Mmu, cond: Option<Cond>) -> Flow {
    if !check_condition(cpu, cond) {
        return Flow::NotTaken;
    }
    cpu.regs.pc = cpu.pop_word(mmu);
    Flow::Jumped
}

/// RETI - 返回並立即重新啟用中斷
pub fn reti(cpu: &mut Cpu, mmu: &Mmu, lines: &mut InterruptLines) -> Flow {
    cpu.regs.pc = cpu.pop_word(mmu);
    lines.enable_now();
    Flow::Jumped
}

/// RST n - 推入下一個指令的位址並跳到固定向量
pub fn rst(cpu: &mut Cpu, mmu: &mut Mmu, target: u16) -> Flow {
    let return_addr = cpu.regs.pc.wrapping_add(1);
    cpu.push_word(mmu, return_addr);
    cpu.regs.pc = target;
    Flow::Jumped
}
