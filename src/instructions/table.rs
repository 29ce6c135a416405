//! 操作碼表
//!
//! 兩張 256 項的固定表 (一般與 CB 前綴)，於第一次使用時建立，之後唯讀共享。
//! 每一項記錄助記符、指令長度、基本週期、未分支週期與要執行的操作。

use std::fmt;
use std::sync::LazyLock;

/// 8 位元運算元，順序與操作碼編碼的 3 位元欄位相同
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R8 {
    B,
    C,
    D,
    E,
    H,
    L,
    HlInd, // (HL)
    A,
}

impl R8 {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => R8::B,
            1 => R8::C,
            2 => R8::D,
            3 => R8::E,
            4 => R8::H,
            5 => R8::L,
            6 => R8::HlInd,
            _ => R8::A,
        }
    }
}

impl fmt::Display for R8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            R8::B => "B",
            R8::C => "C",
            R8::D => "D",
            R8::E => "E",
            R8::H => "H",
            R8::L => "L",
            R8::HlInd => "(HL)",
            R8::A => "A",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R16 {
    BC,
    DE,
    HL,
    SP,
}

/// PUSH/POP 使用的暫存器組 (SP 的位置換成 AF)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R16Stack {
    BC,
    DE,
    HL,
    AF,
}

/// LD (rr),A / LD A,(rr) 的間接位址來源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum R16Mem {
    BC,
    DE,
    HlInc, // (HL+)
    HlDec, // (HL-)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    NZ,
    Z,
    NC,
    C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

/// CB 表 0x00-0x3F 的旋轉/移位操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    Stop,
    Halt,
    Di,
    Ei,
    Prefix,
    Illegal,

    // 載入
    LdR8R8(R8, R8),
    LdR8Imm(R8),
    LdR16Imm(R16),
    LdMemA(R16Mem),
    LdAMem(R16Mem),
    LdAbsSp,
    LdAbsA,
    LdAAbs,
    LdhImmA,
    LdhAImm,
    LdhCA,
    LdhAC,
    LdHlSpOffset,
    LdSpHl,
    Push(R16Stack),
    Pop(R16Stack),

    // 算術/邏輯
    Alu(AluOp, R8),
    AluImm(AluOp),
    Inc8(R8),
    Dec8(R8),
    Inc16(R16),
    Dec16(R16),
    AddHl(R16),
    AddSpOffset,
    Daa,
    Cpl,
    Scf,
    Ccf,

    // 累加器旋轉 (Z 一律清除)
    Rlca,
    Rrca,
    Rla,
    Rra,

    // 控制流程
    Jr(Option<Cond>),
    Jp(Option<Cond>),
    JpHl,
    Call(Option<Cond>),
    Ret(Option<Cond>),
    Reti,
    Rst(u16),

    // CB 前綴
    Shift(ShiftOp, R8),
    Bit(u8, R8),
    Res(u8, R8),
    Set(u8, R8),
}

/// 操作碼描述 - 建立後不再修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeEntry {
    pub mnemonic: String,
    pub length: u8,
    pub cycles: u8,
    /// 條件不成立時的週期數；非條件指令與 `cycles` 相同
    pub alt_cycles: u8,
    pub op: Op,
}

impl OpcodeEntry {
    fn new(mnemonic: impl Into<String>, length: u8, cycles: u8, op: Op) -> Self {
        OpcodeEntry {
            mnemonic: mnemonic.into(),
            length,
            cycles,
            alt_cycles: cycles,
            op,
        }
    }

    fn conditional(
        mnemonic: impl Into<String>,
        length: u8,
        taken: u8,
        not_taken: u8,
        op: Op,
    ) -> Self {
        OpcodeEntry {
            mnemonic: mnemonic.into(),
            length,
            cycles: taken,
            alt_cycles: not_taken,
            op,
        }
    }
}

pub static PRIMARY_TABLE: LazyLock<[OpcodeEntry; 256]> =
    LazyLock::new(|| std::array::from_fn(|opcode| primary_entry(opcode as u8)));

pub static CB_TABLE: LazyLock<[OpcodeEntry; 256]> =
    LazyLock::new(|| std::array::from_fn(|opcode| cb_entry(opcode as u8)));

const R16_TABLE: [R16; 4] = [R16::BC, R16::DE, R16::HL, R16::SP];
const R16_STACK_TABLE: [R16Stack; 4] = [R16Stack::BC, R16Stack::DE, R16Stack::HL, R16Stack::AF];
const R16_MEM_TABLE: [R16Mem; 4] = [R16Mem::BC, R16Mem::DE, R16Mem::HlInc, R16Mem::HlDec];
const COND_TABLE: [Cond; 4] = [Cond::NZ, Cond::Z, Cond::NC, Cond::C];
const ALU_TABLE: [AluOp; 8] = [
    AluOp::Add,
    AluOp::Adc,
    AluOp::Sub,
    AluOp::Sbc,
    AluOp::And,
    AluOp::Xor,
    AluOp::Or,
    AluOp::Cp,
];
const SHIFT_TABLE: [ShiftOp; 8] = [
    ShiftOp::Rlc,
    ShiftOp::Rrc,
    ShiftOp::Rl,
    ShiftOp::Rr,
    ShiftOp::Sla,
    ShiftOp::Sra,
    ShiftOp::Swap,
    ShiftOp::Srl,
];

fn r16_name(reg: R16) -> &'static str {
    match reg {
        R16::BC => "BC",
        R16::DE => "DE",
        R16::HL => "HL",
        R16::SP => "SP",
    }
}

fn r16_stack_name(reg: R16Stack) -> &'static str {
    match reg {
        R16Stack::BC => "BC",
        R16Stack::DE => "DE",
        R16Stack::HL => "HL",
        R16Stack::AF => "AF",
    }
}

fn r16_mem_name(reg: R16Mem) -> &'static str {
    match reg {
        R16Mem::BC => "(BC)",
        R16Mem::DE => "(DE)",
        R16Mem::HlInc => "(HL+)",
        R16Mem::HlDec => "(HL-)",
    }
}

fn cond_name(cond: Cond) -> &'static str {
    match cond {
        Cond::NZ => "NZ",
        Cond::Z => "Z",
        Cond::NC => "NC",
        Cond::C => "C",
    }
}

fn alu_name(op: AluOp) -> &'static str {
    match op {
        AluOp::Add => "ADD A,",
        AluOp::Adc => "ADC A,",
        AluOp::Sub => "SUB ",
        AluOp::Sbc => "SBC A,",
        AluOp::And => "AND ",
        AluOp::Xor => "XOR ",
        AluOp::Or => "OR ",
        AluOp::Cp => "CP ",
    }
}

fn shift_name(op: ShiftOp) -> &'static str {
    match op {
        ShiftOp::Rlc => "RLC",
        ShiftOp::Rrc => "RRC",
        ShiftOp::Rl => "RL",
        ShiftOp::Rr => "RR",
        ShiftOp::Sla => "SLA",
        ShiftOp::Sra => "SRA",
        ShiftOp::Swap => "SWAP",
        ShiftOp::Srl => "SRL",
    }
}

// (HL) 運算元多一次記憶體存取
fn mem_penalty(reg: R8, extra: u8) -> u8 {
    if reg == R8::HlInd { extra } else { 0 }
}

/// 依操作碼位元欄位 (xx yyy zzz) 解碼一般指令
fn primary_entry(opcode: u8) -> OpcodeEntry {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let z = opcode & 0x07;
    let p = (y >> 1) as usize;
    let q = y & 0x01;

    match (x, z) {
        (0, 0) => match y {
            0 => OpcodeEntry::new("NOP", 1, 4, Op::Nop),
            1 => OpcodeEntry::new("LD (a16),SP", 3, 20, Op::LdAbsSp),
            2 => OpcodeEntry::new("STOP", 2, 4, Op::Stop),
            3 => OpcodeEntry::new("JR e8", 2, 12, Op::Jr(None)),
            _ => {
                let cond = COND_TABLE[(y - 4) as usize];
                let name = format!("JR {},e8", cond_name(cond));
                OpcodeEntry::conditional(name, 2, 12, 8, Op::Jr(Some(cond)))
            }
        },
        (0, 1) => {
            let reg = R16_TABLE[p];
            if q == 0 {
                OpcodeEntry::new(format!("LD {},n16", r16_name(reg)), 3, 12, Op::LdR16Imm(reg))
            } else {
                OpcodeEntry::new(format!("ADD HL,{}", r16_name(reg)), 1, 8, Op::AddHl(reg))
            }
        }
        (0, 2) => {
            let reg = R16_MEM_TABLE[p];
            if q == 0 {
                OpcodeEntry::new(format!("LD {},A", r16_mem_name(reg)), 1, 8, Op::LdMemA(reg))
            } else {
                OpcodeEntry::new(format!("LD A,{}", r16_mem_name(reg)), 1, 8, Op::LdAMem(reg))
            }
        }
        (0, 3) => {
            let reg = R16_TABLE[p];
            if q == 0 {
                OpcodeEntry::new(format!("INC {}", r16_name(reg)), 1, 8, Op::Inc16(reg))
            } else {
                OpcodeEntry::new(format!("DEC {}", r16_name(reg)), 1, 8, Op::Dec16(reg))
            }
        }
        (0, 4) => {
            let reg = R8::from_bits(y);
            OpcodeEntry::new(format!("INC {}", reg), 1, 4 + mem_penalty(reg, 8), Op::Inc8(reg))
        }
        (0, 5) => {
            let reg = R8::from_bits(y);
            OpcodeEntry::new(format!("DEC {}", reg), 1, 4 + mem_penalty(reg, 8), Op::Dec8(reg))
        }
        (0, 6) => {
            let reg = R8::from_bits(y);
            OpcodeEntry::new(format!("LD {},n8", reg), 2, 8 + mem_penalty(reg, 4), Op::LdR8Imm(reg))
        }
        (0, _) => match y {
            0 => OpcodeEntry::new("RLCA", 1, 4, Op::Rlca),
            1 => OpcodeEntry::new("RRCA", 1, 4, Op::Rrca),
            2 => OpcodeEntry::new("RLA", 1, 4, Op::Rla),
            3 => OpcodeEntry::new("RRA", 1, 4, Op::Rra),
            4 => OpcodeEntry::new("DAA", 1, 4, Op::Daa),
            5 => OpcodeEntry::new("CPL", 1, 4, Op::Cpl),
            6 => OpcodeEntry::new("SCF", 1, 4, Op::Scf),
            _ => OpcodeEntry::new("CCF", 1, 4, Op::Ccf),
        },
        (1, _) => {
            if opcode == 0x76 {
                return OpcodeEntry::new("HALT", 1, 4, Op::Halt);
            }
            let dst = R8::from_bits(y);
            let src = R8::from_bits(z);
            let cycles = 4 + mem_penalty(dst, 4) + mem_penalty(src, 4);
            let name = format!("LD {},{}", dst, src);
            OpcodeEntry::new(name, 1, cycles, Op::LdR8R8(dst, src))
        }
        (2, _) => {
            let op = ALU_TABLE[y as usize];
            let src = R8::from_bits(z);
            let name = format!("{}{}", alu_name(op), src);
            OpcodeEntry::new(name, 1, 4 + mem_penalty(src, 4), Op::Alu(op, src))
        }
        _ => block3_entry(opcode, y, z),
    }
}

fn block3_entry(opcode: u8, y: u8, z: u8) -> OpcodeEntry {
    let p = (y >> 1) as usize;
    let q = y & 0x01;
    match z {
        0 => match y {
            0..=3 => {
                let cond = COND_TABLE[y as usize];
                let name = format!("RET {}", cond_name(cond));
                OpcodeEntry::conditional(name, 1, 20, 8, Op::Ret(Some(cond)))
            }
            4 => OpcodeEntry::new("LDH (a8),A", 2, 12, Op::LdhImmA),
            5 => OpcodeEntry::new("ADD SP,e8", 2, 16, Op::AddSpOffset),
            6 => OpcodeEntry::new("LDH A,(a8)", 2, 12, Op::LdhAImm),
            _ => OpcodeEntry::new("LD HL,SP+e8", 2, 12, Op::LdHlSpOffset),
        },
        1 => {
            if q == 0 {
                let reg = R16_STACK_TABLE[p];
                let name = format!("POP {}", r16_stack_name(reg));
                return OpcodeEntry::new(name, 1, 12, Op::Pop(reg));
            }
            match p {
                0 => OpcodeEntry::new("RET", 1, 16, Op::Ret(None)),
                1 => OpcodeEntry::new("RETI", 1, 16, Op::Reti),
                2 => OpcodeEntry::new("JP HL", 1, 4, Op::JpHl),
                _ => OpcodeEntry::new("LD SP,HL", 1, 8, Op::LdSpHl),
            }
        }
        2 => match y {
            0..=3 => {
                let cond = COND_TABLE[y as usize];
                let name = format!("JP {},a16", cond_name(cond));
                OpcodeEntry::conditional(name, 3, 16, 12, Op::Jp(Some(cond)))
            }
            4 => OpcodeEntry::new("LDH (C),A", 1, 8, Op::LdhCA),
            5 => OpcodeEntry::new("LD (a16),A", 3, 16, Op::LdAbsA),
            6 => OpcodeEntry::new("LDH A,(C)", 1, 8, Op::LdhAC),
            _ => OpcodeEntry::new("LD A,(a16)", 3, 16, Op::LdAAbs),
        },
        3 => match y {
            0 => OpcodeEntry::new("JP a16", 3, 16, Op::Jp(None)),
            1 => OpcodeEntry::new("PREFIX", 1, 4, Op::Prefix),
            6 => OpcodeEntry::new("DI", 1, 4, Op::Di),
            7 => OpcodeEntry::new("EI", 1, 4, Op::Ei),
            _ => illegal(opcode),
        },
        4 => match y {
            0..=3 => {
                let cond = COND_TABLE[y as usize];
                let name = format!("CALL {},a16", cond_name(cond));
                OpcodeEntry::conditional(name, 3, 24, 12, Op::Call(Some(cond)))
            }
            _ => illegal(opcode),
        },
        5 => {
            if q == 0 {
                let reg = R16_STACK_TABLE[p];
                let name = format!("PUSH {}", r16_stack_name(reg));
                OpcodeEntry::new(name, 1, 16, Op::Push(reg))
            } else if p == 0 {
                OpcodeEntry::new("CALL a16", 3, 24, Op::Call(None))
            } else {
                illegal(opcode)
            }
        }
        6 => {
            let op = ALU_TABLE[y as usize];
            OpcodeEntry::new(format!("{}n8", alu_name(op)), 2, 8, Op::AluImm(op))
        }
        _ => {
            let target = (y as u16) * 8;
            OpcodeEntry::new(format!("RST ${:02X}", target), 1, 16, Op::Rst(target))
        }
    }
}

// 0xD3, 0xDB, 0xDD, 0xE3, 0xE4, 0xEB, 0xEC, 0xED, 0xF4, 0xFC, 0xFD
fn illegal(opcode: u8) -> OpcodeEntry {
    OpcodeEntry::new(format!("ILLEGAL_{:02X}", opcode), 1, 4, Op::Illegal)
}

fn cb_entry(opcode: u8) -> OpcodeEntry {
    let x = opcode >> 6;
    let y = (opcode >> 3) & 0x07;
    let reg = R8::from_bits(opcode);
    // 讀改寫多 8 週期；BIT 只讀取 (HL)，不寫回
    let cycles = 8 + mem_penalty(reg, if x == 1 { 4 } else { 8 });
    match x {
        0 => {
            let op = SHIFT_TABLE[y as usize];
            let name = format!("{} {}", shift_name(op), reg);
            OpcodeEntry::new(name, 2, cycles, Op::Shift(op, reg))
        }
        1 => OpcodeEntry::new(format!("BIT {},{}", y, reg), 2, cycles, Op::Bit(y, reg)),
        2 => OpcodeEntry::new(format!("RES {},{}", y, reg), 2, cycles, Op::Res(y, reg)),
        _ => OpcodeEntry::new(format!("SET {},{}", y, reg), 2, cycles, Op::Set(y, reg)),
    }
}
