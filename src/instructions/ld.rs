//! 載入與堆疊指令的處理模組
//!
//! 這個模組負責處理 LD, LDH, PUSH, POP 等指令

use super::arithmetic;
use super::table::{R8, R16, R16Mem, R16Stack};
use super::Flow;
use crate::cpu::Cpu;
use crate::mmu::Mmu;

/// LD r,r'
pub fn ld_r8_r8(cpu: &mut Cpu, mmu: &mut Mmu, dst: R8, src: R8) -> Flow {
    let value = cpu.read_r8(mmu, src);
    cpu.write_r8(mmu, dst, value);
    Flow::Next
}

/// LD r,n8
pub fn ld_r8_imm(cpu: &mut Cpu, mmu: &mut Mmu, dst: R8) -> Flow {
    let value = cpu.operand_byte(mmu, 1);
    cpu.write_r8(mmu, dst, value);
    Flow::Next
}

/// LD rr,n16
pub fn ld_r16_imm(cpu: &mut Cpu, mmu: &Mmu, dst: R16) -> Flow {
    let value = cpu.operand_word(mmu);
    cpu.regs.set_r16(dst, value);
    Flow::Next
}

// 解析間接位址，(HL+)/(HL-) 在取得位址後更新 HL
fn indirect_address(cpu: &mut Cpu, addr: R16Mem) -> u16 {
    match addr {
        R16Mem::BC => cpu.regs.bc(),
        R16Mem::DE => cpu.regs.de(),
        R16Mem::HlInc => {
            let hl = cpu.regs.hl();
            cpu.regs.set_hl(hl.wrapping_add(1));
            hl
        }
        R16Mem::HlDec => {
            let hl = cpu.regs.hl();
            cpu.regs.set_hl(hl.wrapping_sub(1));
            hl
        }
    }
}

/// LD (rr),A
pub fn ld_mem_a(cpu: &mut Cpu, mmu: &mut Mmu, addr: R16Mem) -> Flow {
    let target = indirect_address(cpu, addr);
    mmu.write_byte(target, cpu.regs.a);
    Flow::Next
}

/// LD A,(rr)
pub fn ld_a_mem(cpu: &mut Cpu, mmu: &Mmu, addr: R16Mem) -> Flow {
    let source = indirect_address(cpu, addr);
    cpu.regs.a = mmu.read_byte(source);
    Flow::Next
}

/// LD (a16),SP - 以 little-endian 寫入
pub fn ld_abs_sp(cpu: &mut Cpu, mmu: &mut Mmu) -> Flow {
    let target = cpu.operand_word(mmu);
    mmu.write_word(target, cpu.regs.sp);
    Flow::Next
}

pub fn ld_abs_a(cpu: &mut Cpu, mmu: &mut Mmu) -> Flow {
    let target = cpu.operand_word(mmu);
    mmu.write_byte(target, cpu.regs.a);
    Flow::Next
}

pub fn ld_a_abs(cpu: &mut Cpu, mmu: &Mmu) -> Flow {
    let source = cpu.operand_word(mmu);
    cpu.regs.a = mmu.read_byte(source);
    Flow::Next
}

/// LDH (a8),A - 寫入 0xFF00 + a8
pub fn ldh_imm_a(cpu: &mut Cpu, mmu: &mut Mmu) -> Flow {
    let addr = 0xFF00 | cpu.operand_byte(mmu, 1) as u16;
    mmu.write_byte(addr, cpu.regs.a);
    Flow::Next
}

/// LDH A,(a8)
pub fn ldh_a_imm(cpu: &mut Cpu, mmu: &Mmu) -> Flow {
    let addr = 0xFF00 | cpu.operand_byte(mmu, 1) as u16;
    cpu.regs.a = mmu.read_byte(addr);
    Flow::Next
}

/// LDH (C),A
pub fn ldh_c_a(cpu: &mut Cpu, mmu: &mut Mmu) -> Flow {
    let addr = 0xFF00 | cpu.regs.c as u16;
    mmu.write_byte(addr, cpu.regs.a);
    Flow::Next
}

/// LDH A,(C)
pub fn ldh_a_c(cpu: &mut Cpu, mmu: &Mmu) -> Flow {
    let addr = 0xFF00 | cpu.regs.c as u16;
    cpu.regs.a = mmu.read_byte(addr);
    Flow::Next
}

/// LD HL,SP+e8
pub fn ld_hl_sp_offset(cpu: &mut Cpu, mmu: &Mmu) -> Flow {
    let offset = cpu.operand_byte(mmu, 1);
    let value = arithmetic::sp_plus_offset(&mut cpu.regs, offset);
    cpu.regs.set_hl(value);
    Flow::Next
}

pub fn ld_sp_hl(cpu: &mut Cpu) -> Flow {
    cpu.regs.sp = cpu.regs.hl();
    Flow::Next
}

pub fn push(cpu: &mut Cpu, mmu: &mut Mmu, reg: R16Stack) -> Flow {
    let value = cpu.regs.r16_stack(reg);
    cpu.push_word(mmu, value);
    Flow::Next
}

/// POP rr (POP AF 會清除 F 的低 4 位元)
pub fn pop(cpu: &mut Cpu, mmu: &Mmu, reg: R16Stack) -> Flow {
    let value = cpu.pop_word(mmu);
    cpu.regs.set_r16_stack(reg, value);
    Flow::Next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmu::tests::test_mmu;

    #[test]
    fn test_ld_hl_increment_and_decrement() {
        let mut cpu = Cpu::new();
        let mut mmu = test_mmu();
        cpu.regs.a = 0x42;
        cpu.regs.set_hl(0xC010);
        ld_mem_a(&mut cpu, &mut mmu, R16Mem::HlInc);
        assert_eq!(mmu.read_byte(0xC010), 0x42);
        assert_eq!(cpu.regs.hl(), 0xC011);
        ld_mem_a(&mut cpu, &mut mmu, R16Mem::HlDec);
        assert_eq!(cpu.regs.hl(), 0xC010);
        assert_eq!(mmu.read_byte(0xC011), 0x42);
    }

    #[test]
    fn test_ld_abs_sp_little_endian() {
        let mut cpu = Cpu::new();
        let mut mmu = test_mmu();
        cpu.regs.pc = 0xC000;
        mmu.write_byte(0xC001, 0x00);
        mmu.write_byte(0xC002, 0xD0);
        cpu.regs.sp = 0xBEEF;
        ld_abs_sp(&mut cpu, &mut mmu);
        assert_eq!(mmu.read_byte(0xD000), 0xEF);
        assert_eq!(mmu.read_byte(0xD001), 0xBE);
    }

    #[test]
    fn test_ldh_uses_high_page() {
        let mut cpu = Cpu::new();
        let mut mmu = test_mmu();
        cpu.regs.a = 0x5C;
        cpu.regs.c = 0x80;
        ldh_c_a(&mut cpu, &mut mmu);
        assert_eq!(mmu.read_byte(0xFF80), 0x5C);
        cpu.regs.a = 0;
        ldh_a_c(&mut cpu, &mmu);
        assert_eq!(cpu.regs.a, 0x5C);
    }

    #[test]
    fn test_pop_af_masks_low_nibble() {
        let mut cpu = Cpu::new();
        let mut mmu = test_mmu();
        cpu.regs.sp = 0xDFF0;
        cpu.push_word(&mut mmu, 0x12FF);
        pop(&mut cpu, &mmu, R16Stack::AF);
        assert_eq!(cpu.regs.a, 0x12);
        assert_eq!(cpu.regs.f(), 0xF0);
    }
}
