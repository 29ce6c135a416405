// CPU - 暫存器檔案、堆疊操作與「執行一個指令」的主流程

use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::instructions::{self, Flow, R8, R16, R16Stack, CB_TABLE, PRIMARY_TABLE};
use crate::interrupts::InterruptLines;
use crate::mmu::Mmu;

/// CB 前綴跳脫位元組
pub const CB_PREFIX: u8 = 0xCB;

/// F 暫存器的四個旗標位元
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Z = 0x80, // Zero
    N = 0x40, // Subtract
    H = 0x20, // Half Carry
    C = 0x10, // Carry
}

/// CPU 運行狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CpuState {
    Running, // 正常運行
    Halted,  // 暫停 (HALT)
    Stopped, // 停止 (STOP)，模擬上與 HALT 相同
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    /// 開機 ROM 執行完畢後的暫存器狀態 (DMG)
    pub fn post_boot() -> Self {
        Registers {
            a: 0x01,
            f: 0xB0,
            b: 0x00,
            c: 0x13,
            d: 0x00,
            e: 0xD8,
            h: 0x01,
            l: 0x4D,
            sp: 0xFFFE,
            pc: 0x0100,
        }
    }

    pub fn f(&self) -> u8 {
        self.f
    }

    // 低 4 位元永遠為 0
    pub fn set_f(&mut self, value: u8) {
        self.f = value & 0xF0;
    }

    pub fn flag(&self, flag: Flag) -> bool {
        self.f & flag as u8 != 0
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        if value {
            self.f |= flag as u8;
        } else {
            self.f &= !(flag as u8);
        }
    }

    /// 一次設定全部四個旗標
    pub fn set_flags(&mut self, z: bool, n: bool, h: bool, c: bool) {
        self.f = ((z as u8) << 7) | ((n as u8) << 6) | ((h as u8) << 5) | ((c as u8) << 4);
    }

    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f])
    }

    pub fn set_af(&mut self, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.a = hi;
        self.set_f(lo);
    }

    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    pub fn set_bc(&mut self, value: u16) {
        [self.b, self.c] = value.to_be_bytes();
    }

    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    pub fn set_de(&mut self, value: u16) {
        [self.d, self.e] = value.to_be_bytes();
    }

    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    pub fn set_hl(&mut self, value: u16) {
        [self.h, self.l] = value.to_be_bytes();
    }

    pub fn r16(&self, reg: R16) -> u16 {
        match reg {
            R16::BC => self.bc(),
            R16::DE => self.de(),
            R16::HL => self.hl(),
            R16::SP => self.sp,
        }
    }

    pub fn set_r16(&mut self, reg: R16, value: u16) {
        match reg {
            R16::BC => self.set_bc(value),
            R16::DE => self.set_de(value),
            R16::HL => self.set_hl(value),
            R16::SP => self.sp = value,
        }
    }

    pub fn r16_stack(&self, reg: R16Stack) -> u16 {
        match reg {
            R16Stack::BC => self.bc(),
            R16Stack::DE => self.de(),
            R16Stack::HL => self.hl(),
            R16Stack::AF => self.af(),
        }
    }

    pub fn set_r16_stack(&mut self, reg: R16Stack, value: u16) {
        match reg {
            R16Stack::BC => self.set_bc(value),
            R16Stack::DE => self.set_de(value),
            R16Stack::HL => self.set_hl(value),
            R16Stack::AF => self.set_af(value),
        }
    }
}

/// 給除錯器用的唯讀暫存器快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterSnapshot {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
    pub state: CpuState,
    pub ime: bool,
    pub instructions: u64,
}

impl fmt::Display for RegisterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AF={:02X}{:02X} BC={:02X}{:02X} DE={:02X}{:02X} HL={:02X}{:02X} SP={:04X} PC={:04X} IME={} {:?}",
            self.a,
            self.f,
            self.b,
            self.c,
            self.d,
            self.e,
            self.h,
            self.l,
            self.sp,
            self.pc,
            self.ime as u8,
            self.state
        )
    }
}

#[derive(Debug)]
pub struct Cpu {
    pub regs: Registers,
    pub state: CpuState,
    pub instr_count: u64, // 已執行的指令數 (用於除錯)
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            regs: Registers::post_boot(),
            state: CpuState::Running,
            instr_count: 0,
        }
    }

    /// 上電狀態，所有暫存器為 0，從開機 ROM 的 0x0000 開始
    pub fn power_on() -> Self {
        Cpu {
            regs: Registers::default(),
            state: CpuState::Running,
            instr_count: 0,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.state != CpuState::Running
    }

    pub fn wake(&mut self) {
        self.state = CpuState::Running;
    }

    pub fn snapshot(&self, ime: bool) -> RegisterSnapshot {
        let r = &self.regs;
        RegisterSnapshot {
            a: r.a,
            f: r.f(),
            b: r.b,
            c: r.c,
            d: r.d,
            e: r.e,
            h: r.h,
            l: r.l,
            sp: r.sp,
            pc: r.pc,
            state: self.state,
            ime,
            instructions: self.instr_count,
        }
    }

    // 讀取 PC 之後第 n 個位元組 (指令的運算元)
    pub fn operand_byte(&self, mmu: &Mmu, n: u16) -> u8 {
        mmu.read_byte(self.regs.pc.wrapping_add(n))
    }

    pub fn operand_word(&self, mmu: &Mmu) -> u16 {
        mmu.read_word(self.regs.pc.wrapping_add(1))
    }

    pub fn read_r8(&self, mmu: &Mmu, reg: R8) -> u8 {
        match reg {
            R8::B => self.regs.b,
            R8::C => self.regs.c,
            R8::D => self.regs.d,
            R8::E => self.regs.e,
            R8::H => self.regs.h,
            R8::L => self.regs.l,
            R8::HlInd => mmu.read_byte(self.regs.hl()),
            R8::A => self.regs.a,
        }
    }

    pub fn write_r8(&mut self, mmu: &mut Mmu, reg: R8, value: u8) {
        match reg {
            R8::B => self.regs.b = value,
            R8::C => self.regs.c = value,
            R8::D => self.regs.d = value,
            R8::E => self.regs.e = value,
            R8::H => self.regs.h = value,
            R8::L => self.regs.l = value,
            R8::HlInd => mmu.write_byte(self.regs.hl(), value),
            R8::A => self.regs.a = value,
        }
    }

    // 堆疊操作：先遞減 SP 再寫入，高位元組先推入 (位於較高位址)
    pub fn push_word(&mut self, mmu: &mut Mmu, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write_byte(self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        mmu.write_byte(self.regs.sp, lo);
    }

    // 先讀取低位元組，讀取後遞增 SP
    pub fn pop_word(&mut self, mmu: &Mmu) -> u16 {
        let lo = mmu.read_byte(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = mmu.read_byte(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_be_bytes([hi, lo])
    }

    /// 執行一個指令，返回消耗的週期數
    ///
    /// HALT/STOP 狀態下不取指令，每次呼叫消耗 4 週期，
    /// 由驅動程式在中斷待處理時喚醒。
    pub fn execute(&mut self, mmu: &mut Mmu, lines: &mut InterruptLines) -> Result<u32> {
        if self.is_halted() {
            return Ok(4);
        }

        let pc = self.regs.pc;
        let first_byte = mmu.read_byte(pc);
        let entry = if first_byte == CB_PREFIX {
            let second_byte = mmu.read_byte(pc.wrapping_add(1));
            &CB_TABLE[second_byte as usize]
        } else {
            &PRIMARY_TABLE[first_byte as usize]
        };

        let flow = instructions::execute_instruction(self, mmu, lines, entry)?;

        self.instr_count += 1;
        lines.instruction_completed();

        // 跳躍類指令自行設定 PC，其餘依指令長度前進
        let cycles = match flow {
            Flow::Next => {
                self.regs.pc = pc.wrapping_add(entry.length as u16);
                entry.cycles
            }
            Flow::NotTaken => {
                self.regs.pc = pc.wrapping_add(entry.length as u16);
                entry.alt_cycles
            }
            Flow::Jumped => entry.cycles,
        };
        Ok(cycles as u32)
    }
}
