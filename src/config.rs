// 模擬器設定 - 從 JSON 檔載入，所有欄位都有預設值

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mmu::DEFAULT_DISABLED_RAM_VALUE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// 每條掃描線最多繪製的精靈數 (硬體為 10)
    pub sprites_per_line: usize,
    /// 讀取關閉中的外部 RAM 時返回的值
    pub disabled_ram_value: u8,
    /// 畫面通道的容量，消費者落後時丟棄新的幀
    pub frame_channel_capacity: usize,
    /// 256 位元組的開機 ROM；沒有時直接從 0x0100 開始執行
    pub boot_rom: Option<PathBuf>,
    pub log_level: String,
    pub log_file: PathBuf,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        EmulatorConfig {
            sprites_per_line: 40,
            disabled_ram_value: DEFAULT_DISABLED_RAM_VALUE,
            frame_channel_capacity: 4,
            boot_rom: None,
            log_level: "info".to_string(),
            log_file: PathBuf::from("logs/emulator.log"),
        }
    }
}

impl EmulatorConfig {
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// 解析 `log_level`，無法辨識時使用 Info
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
