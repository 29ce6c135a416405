//! DMG (初代 Game Boy) 模擬核心
//!
//! CPU、記憶體匯流排與 MBC、中斷、計時器以及 PPU 掃描線狀態機。
//! 顯示、輸入擷取與除錯介面由外部透過 [`GameBoy`] 的 API 接上。

pub mod config;
pub mod cpu;
pub mod error;
pub mod gameboy;
pub mod instructions;
pub mod interrupts;
pub mod joypad;
pub mod logger;
pub mod mbc;
pub mod mmu;
pub mod ppu;
pub mod rom;
pub mod timer;

pub use config::EmulatorConfig;
pub use cpu::RegisterSnapshot;
pub use error::{Error, Result};
pub use gameboy::{ChannelSink, FrameSink, GameBoy};
pub use joypad::ButtonState;
pub use ppu::{shade_to_rgb, Framebuffer, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use rom::{Cartridge, CartridgeHeader};
