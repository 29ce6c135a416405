// 錯誤型別 - 模擬器的致命錯誤分類
//
// 可恢復的硬體怪癖 (關閉的外部 RAM、ROM 區寫入、LY 寫入) 不會產生錯誤，
// 只有下列情況會中止模擬。

use crate::cpu::RegisterSnapshot;
use crate::mbc::MbcKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unrecognized opcode {opcode:#04X} (CB-prefixed: {prefixed}) at PC={pc:#06X}")]
    UnknownOpcode { opcode: u8, pc: u16, prefixed: bool },

    #[error("unsupported cartridge type {0:#04X}")]
    UnsupportedCartridge(u8),

    #[error("unsupported {field} code {code:#04X} in cartridge header")]
    UnsupportedHeaderCode { field: &'static str, code: u8 },

    #[error("ROM image too small: {0} bytes, header needs 0x150")]
    RomTooSmall(usize),

    #[error("boot ROM must be exactly 256 bytes, got {0}")]
    BootRomSize(usize),

    #[error("{kind:?} bank {bank} outside configured bank count {count}")]
    BankOutOfRange { kind: MbcKind, bank: usize, count: usize },

    #[error("emulation stopped: {cause} [{snapshot}]")]
    Fatal {
        cause: Box<Error>,
        snapshot: RegisterSnapshot,
    },

    #[error("emulator already stopped at PC={pc:#06X}, refusing to step")]
    Faulted { pc: u16 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// 是否為執行期間的致命錯誤 (而非載入/設定錯誤)
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal { .. } | Error::Faulted { .. })
    }
}
