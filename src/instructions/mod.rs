//! 指令處理模組
//!
//! 這個模組整合了操作碼表與所有指令類型的處理器

pub mod arithmetic;
pub mod jump;
pub mod ld;
pub mod misc;
pub mod rotate;
pub mod table;

pub use table::{
    AluOp, CB_TABLE, Cond, Op, OpcodeEntry, PRIMARY_TABLE, R8, R16, R16Mem, R16Stack, ShiftOp,
};

use crate::cpu::Cpu;
use crate::error::{Error, Result};
use crate::interrupts::InterruptLines;
use crate::mmu::Mmu;

/// 指令執行後 PC 與週期的處理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// PC 依指令長度前進，使用基本週期
    Next,
    /// 條件不成立：PC 依指令長度前進，使用較短的週期
    NotTaken,
    /// 指令已自行設定 PC，使用基本週期
    Jumped,
}

/// 主要的指令處理器
///
/// 進入時 PC 仍指向操作碼，運算元從 PC+1 起讀取。
pub fn execute_instruction(
    cpu: &mut Cpu,
    mmu: &mut Mmu,
    lines: &mut InterruptLines,
    entry: &OpcodeEntry,
) -> Result<Flow> {
    let flow = match entry.op {
        // 載入指令
        Op::LdR8R8(dst, src) => ld::ld_r8_r8(cpu, mmu, dst, src),
        Op::LdR8Imm(dst) => ld::ld_r8_imm(cpu, mmu, dst),
        Op::LdR16Imm(dst) => ld::ld_r16_imm(cpu, mmu, dst),
        Op::LdMemA(addr) => ld::ld_mem_a(cpu, mmu, addr),
        Op::LdAMem(addr) => ld::ld_a_mem(cpu, mmu, addr),
        Op::LdAbsSp => ld::ld_abs_sp(cpu, mmu),
        Op::LdAbsA => ld::ld_abs_a(cpu, mmu),
        Op::LdAAbs => ld::ld_a_abs(cpu, mmu),
        Op::LdhImmA => ld::ldh_imm_a(cpu, mmu),
        Op::LdhAImm => ld::ldh_a_imm(cpu, mmu),
        Op::LdhCA => ld::ldh_c_a(cpu, mmu),
        Op::LdhAC => ld::ldh_a_c(cpu, mmu),
        Op::LdHlSpOffset => ld::ld_hl_sp_offset(cpu, mmu),
        Op::LdSpHl => ld::ld_sp_hl(cpu),
        Op::Push(reg) => ld::push(cpu, mmu, reg),
        Op::Pop(reg) => ld::pop(cpu, mmu, reg),

        // 算術指令
        Op::Alu(op, src) => {
            let value = cpu.read_r8(mmu, src);
            arithmetic::alu(&mut cpu.regs, op, value);
            Flow::Next
        }
        Op::AluImm(op) => {
            let value = cpu.operand_byte(mmu, 1);
            arithmetic::alu(&mut cpu.regs, op, value);
            Flow::Next
        }
        Op::Inc8(reg) => {
            let value = cpu.read_r8(mmu, reg);
            let result = arithmetic::inc8(&mut cpu.regs, value);
            cpu.write_r8(mmu, reg, result);
            Flow::Next
        }
        Op::Dec8(reg) => {
            let value = cpu.read_r8(mmu, reg);
            let result = arithmetic::dec8(&mut cpu.regs, value);
            cpu.write_r8(mmu, reg, result);
            Flow::Next
        }
        Op::Inc16(reg) => {
            let value = cpu.regs.r16(reg);
            cpu.regs.set_r16(reg, value.wrapping_add(1));
            Flow::Next
        }
        Op::Dec16(reg) => {
            let value = cpu.regs.r16(reg);
            cpu.regs.set_r16(reg, value.wrapping_sub(1));
            Flow::Next
        }
        Op::AddHl(reg) => {
            let value = cpu.regs.r16(reg);
            arithmetic::add_hl(&mut cpu.regs, value);
            Flow::Next
        }
        Op::AddSpOffset => {
            let offset = cpu.operand_byte(mmu, 1);
            cpu.regs.sp = arithmetic::sp_plus_offset(&mut cpu.regs, offset);
            Flow::Next
        }
        Op::Daa => {
            arithmetic::daa(&mut cpu.regs);
            Flow::Next
        }

        // 雜項指令
        Op::Nop => Flow::Next,
        Op::Cpl => misc::cpl(cpu),
        Op::Scf => misc::scf(cpu),
        Op::Ccf => misc::ccf(cpu),
        Op::Halt => misc::halt(cpu),
        Op::Stop => misc::stop(cpu),
        Op::Di => misc::di(lines),
        Op::Ei => misc::ei(lines),

        // 旋轉指令
        Op::Rlca => misc::rotate_a(cpu, ShiftOp::Rlc),
        Op::Rrca => misc::rotate_a(cpu, ShiftOp::Rrc),
        Op::Rla => misc::rotate_a(cpu, ShiftOp::Rl),
        Op::Rra => misc::rotate_a(cpu, ShiftOp::Rr),

        // 跳轉指令
        Op::Jr(cond) => jump::jr(cpu, mmu, cond),
        Op::Jp(cond) => jump::jp(cpu, mmu, cond),
        Op::JpHl => jump::jp_hl(cpu),
        Op::Call(cond) => jump::call(cpu, mmu, cond),
        Op::Ret(cond) => jump::ret(cpu, mmu, cond),
        Op::Reti => jump::reti(cpu, mmu, lines),
        Op::Rst(target) => jump::rst(cpu, mmu, target),

        // CB 前綴指令
        Op::Shift(op, reg) => {
            let value = cpu.read_r8(mmu, reg);
            let result = rotate::shift(&mut cpu.regs, op, value);
            cpu.write_r8(mmu, reg, result);
            Flow::Next
        }
        Op::Bit(bit, reg) => {
            let value = cpu.read_r8(mmu, reg);
            rotate::bit(&mut cpu.regs, bit, value);
            Flow::Next
        }
        Op::Res(bit, reg) => {
            let value = cpu.read_r8(mmu, reg);
            cpu.write_r8(mmu, reg, rotate::res(bit, value));
            Flow::Next
        }
        Op::Set(bit, reg) => {
            let value = cpu.read_r8(mmu, reg);
            cpu.write_r8(mmu, reg, rotate::set(bit, value));
            Flow::Next
        }

        // 未定義的操作碼；PREFIX 只會經由 CB 表分派，不會直接執行
        Op::Illegal | Op::Prefix => {
            let pc = cpu.regs.pc;
            return Err(Error::UnknownOpcode {
                opcode: mmu.read_byte(pc),
                pc,
                prefixed: false,
            });
        }
    };
    Ok(flow)
}
