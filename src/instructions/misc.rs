//! 雜項指令的處理模組
//!
//! 這個模組負責處理 CPL, SCF, CCF, 累加器旋轉, HALT, STOP, EI, DI

use super::rotate;
use super::table::ShiftOp;
use super::Flow;
use crate::cpu::{Cpu, CpuState, Flag};
use crate::interrupts::InterruptLines;

/// 處理 CPL (Complement) 指令
pub fn cpl(cpu: &mut Cpu) -> Flow {
    cpu.regs.a = !cpu.regs.a;
    cpu.regs.set_flag(Flag::N, true);
    cpu.regs.set_flag(Flag::H, true);
    Flow::Next
}

/// 處理 SCF (Set Carry Flag) 指令
pub fn scf(cpu: &mut Cpu) -> Flow {
    cpu.regs.set_flag(Flag::N, false);
    cpu.regs.set_flag(Flag::H, false);
    cpu.regs.set_flag(Flag::C, true);
    Flow::Next
}

/// 處理 CCF (Complement Carry Flag) 指令
pub fn ccf(cpu: &mut Cpu) -> Flow {
    let carry = cpu.regs.flag(Flag::C);
    cpu.regs.set_flag(Flag::N, false);
    cpu.regs.set_flag(Flag::H, false);
    cpu.regs.set_flag(Flag::C, !carry);
    Flow::Next
}

/// RLCA / RRCA / RLA / RRA
pub fn rotate_a(cpu: &mut Cpu, op: ShiftOp) -> Flow {
    rotate::rotate_accumulator(&mut cpu.regs, op);
    Flow::Next
}

/// 處理 HALT 指令：停止取指令，直到有已啟用的中斷待處理
pub fn halt(cpu: &mut Cpu) -> Flow {
    cpu.state = CpuState::Halted;
    Flow::Next
}

/// 處理 STOP 指令：與 HALT 相同處理
pub fn stop(cpu: &mut Cpu) -> Flow {
    cpu.state = CpuState::Stopped;
    Flow::Next
}

/// 處理 DI：立即關閉 IME
pub fn di(lines: &mut InterruptLines) -> Flow {
    lines.disable();
    Flow::Next
}

/// 處理 EI：下一個指令完成後才啟用 IME
pub fn ei(lines: &mut InterruptLines) -> Flow {
    lines.schedule_enable();
    Flow::Next
}
