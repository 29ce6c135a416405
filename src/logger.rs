// 檔案日誌 - 實作 log::Log，把紀錄附加到 logs/emulator.log

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};

use crate::error::Result;

#[derive(Debug)]
pub struct FileLogger {
    level: LevelFilter,
    // 檔案鎖，避免多執行緒寫入衝突
    file: Mutex<File>,
}

impl FileLogger {
    /// 開啟 (或建立) 日誌檔，目錄不存在時自動建立
    pub fn open(path: impl AsRef<Path>, level: LevelFilter) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileLogger {
            level,
            file: Mutex::new(file),
        })
    }

    /// 安裝為全域 logger；已經安裝過時保留原本的，返回是否安裝成功
    pub fn install(self) -> bool {
        let level = self.level;
        // 全域 logger 需要 'static，整個行程期間存在
        let logger: &'static FileLogger = Box::leak(Box::new(self));
        if log::set_logger(logger).is_ok() {
            log::set_max_level(level);
            true
        } else {
            false
        }
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // 鎖中毒時仍然寫入
        let mut file = match self.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = writeln!(file, "[{:<5}] {}: {}", record.level(), record.target(), record.args());
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}
