// 無視窗執行器 - 跑指定幀數並印出串口輸出 (相容性測試 ROM 透過串口回報結果)

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use clap::Parser;
use walkdir::WalkDir;

use dmg_core::logger::FileLogger;
use dmg_core::{ChannelSink, EmulatorConfig, GameBoy, Result};

#[derive(Debug, Parser)]
#[command(name = "dmg-run", about = "Run Game Boy ROMs headless and print their serial output")]
struct Args {
    /// ROM 檔案或包含 .gb/.gbc 檔案的目錄
    rom: PathBuf,

    /// 每個 ROM 執行的幀數
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// JSON 設定檔
    #[arg(long)]
    config: Option<PathBuf>,

    /// 先執行 256 位元組的開機 ROM (覆蓋設定檔中的 boot_rom)
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// 結束時以 JSON 印出暫存器快照
    #[arg(long)]
    dump_registers: bool,
}

fn is_rom(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("gb") | Some("gbc")
    )
}

fn collect_roms(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let mut roms: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_rom(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    roms.sort();
    roms
}

fn run_rom(path: &Path, args: &Args, config: &EmulatorConfig) -> Result<()> {
    let mut gb = GameBoy::load(path, config)?;

    // 另一個執行緒消費畫面，模擬本身不等待
    let (sink, frames) = ChannelSink::new(config.frame_channel_capacity);
    gb.set_frame_sink(Box::new(sink));
    let consumer = thread::spawn(move || {
        let (mut presented, mut drawn) = (0u64, 0u64);
        for frame in frames.iter() {
            presented += 1;
            // 畫面全白代表 ROM 尚未繪圖
            if frame.iter().flatten().any(|&shade| shade != 0) {
                drawn += 1;
            }
        }
        (presented, drawn)
    });

    let mut outcome = Ok(());
    for _ in 0..args.frames {
        if let Err(err) = gb.run_frame() {
            outcome = Err(err);
            break;
        }
    }

    let snapshot = gb.register_snapshot();
    let serial = gb.serial_output().to_string();
    let header_title = gb.cartridge().title.clone();
    // 關閉通道讓消費執行緒結束
    drop(gb);
    let (presented, drawn) = consumer.join().unwrap_or((0, 0));

    println!(
        "== {} \"{}\" ({} frames presented, {} non-blank)",
        path.display(),
        header_title,
        presented,
        drawn
    );
    if !serial.is_empty() {
        println!("{}", serial.trim_end());
    }
    if args.dump_registers {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    outcome
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match EmulatorConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("無法載入設定 {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        },
        None => EmulatorConfig::default(),
    };
    if let Some(path) = &args.boot_rom {
        config.boot_rom = Some(path.clone());
    }

    match FileLogger::open(&config.log_file, config.level_filter()) {
        Ok(logger) => {
            if !logger.install() {
                eprintln!("已經有全域 logger，略過檔案日誌");
            }
        }
        Err(err) => eprintln!("無法開啟日誌檔 {}: {}", config.log_file.display(), err),
    }

    let roms = collect_roms(&args.rom);
    if roms.is_empty() {
        eprintln!("找不到 ROM: {}", args.rom.display());
        return ExitCode::FAILURE;
    }

    let mut failed = 0;
    for rom in &roms {
        if let Err(err) = run_rom(rom, &args, &config) {
            eprintln!("{}: {}", rom.display(), err);
            failed += 1;
        }
    }
    log::logger().flush();

    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
