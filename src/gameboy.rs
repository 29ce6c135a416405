// Game Boy 模擬器主結構 - 把 CPU、MMU、Timer、PPU 與中斷組成 step 迴圈

use std::fmt;
use std::fs;
use std::path::Path;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use crate::config::EmulatorConfig;
use crate::cpu::{Cpu, RegisterSnapshot};
use crate::error::{Error, Result};
use crate::interrupts::InterruptLines;
use crate::joypad::ButtonState;
use crate::mmu::Mmu;
use crate::ppu::{Framebuffer, Ppu, FRAME_CYCLES};
use crate::rom::{Cartridge, CartridgeHeader};
use crate::timer::Timer;

/// 接收完成畫面的外部顯示端，每幀 (進入 VBlank 時) 呼叫一次
pub trait FrameSink: Send {
    fn present(&mut self, frame: &Framebuffer);
}

/// 透過 crossbeam 有界通道把畫面交給另一個執行緒
///
/// 消費者跟不上時丟棄新的幀，模擬不會因此阻塞。
#[derive(Debug)]
pub struct ChannelSink {
    sender: Sender<Box<Framebuffer>>,
    dropped: u64,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (ChannelSink, Receiver<Box<Framebuffer>>) {
        let (sender, receiver) = channel::bounded(capacity.max(1));
        (ChannelSink { sender, dropped: 0 }, receiver)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl FrameSink for ChannelSink {
    fn present(&mut self, frame: &Framebuffer) {
        match self.sender.try_send(Box::new(*frame)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.dropped += 1,
            // 接收端已關閉，沒有人在看畫面
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

pub struct GameBoy {
    cpu: Cpu,
    mmu: Mmu,
    ppu: Ppu,
    timer: Timer,
    lines: InterruptLines,
    header: CartridgeHeader,
    sink: Option<Box<dyn FrameSink>>,
    cycles: u64,
    frames: u64,
    faulted_at: Option<u16>,
}

impl fmt::Debug for GameBoy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameBoy")
            .field("cartridge", &self.header.title)
            .field("registers", &self.register_snapshot())
            .field("cycles", &self.cycles)
            .field("frames", &self.frames)
            .field("faulted_at", &self.faulted_at)
            .finish_non_exhaustive()
    }
}

impl GameBoy {
    /// 設定了 `boot_rom` 時從開機 ROM 開始，否則從開機完成後的狀態開始
    pub fn new(cartridge: Cartridge, config: &EmulatorConfig) -> Result<Self> {
        let boot_rom = match &config.boot_rom {
            Some(path) => Some(fs::read(path)?),
            None => None,
        };
        Self::build(cartridge, boot_rom, config)
    }

    pub fn with_boot_rom(
        cartridge: Cartridge,
        boot_rom: Vec<u8>,
        config: &EmulatorConfig,
    ) -> Result<Self> {
        Self::build(cartridge, Some(boot_rom), config)
    }

    fn build(
        cartridge: Cartridge,
        boot_rom: Option<Vec<u8>>,
        config: &EmulatorConfig,
    ) -> Result<Self> {
        let header = cartridge.header.clone();
        let (mut mmu, cpu, timer) = match boot_rom {
            Some(boot_rom) => {
                log::info!("running boot ROM before \"{}\"", header.title);
                let mmu = Mmu::with_boot_rom(cartridge, boot_rom)?;
                (mmu, Cpu::power_on(), Timer::power_on())
            }
            None => (Mmu::new(cartridge)?, Cpu::new(), Timer::new()),
        };
        mmu.set_disabled_ram_value(config.disabled_ram_value);

        Ok(GameBoy {
            cpu,
            mmu,
            ppu: Ppu::new(config.sprites_per_line),
            timer,
            lines: InterruptLines::new(),
            header,
            sink: None,
            cycles: 0,
            frames: 0,
            faulted_at: None,
        })
    }

    pub fn from_rom_bytes(rom: Vec<u8>, config: &EmulatorConfig) -> Result<Self> {
        Self::new(Cartridge::from_bytes(rom)?, config)
    }

    // 載入 ROM
    pub fn load(path: impl AsRef<Path>, config: &EmulatorConfig) -> Result<Self> {
        Self::new(Cartridge::load(path)?, config)
    }

    pub fn set_frame_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.sink = Some(sink);
    }

    /// 執行一個指令 (或 HALT 中的 4 週期)，返回消耗的週期數
    ///
    /// 致命錯誤後不會再執行，之後每次呼叫都返回 `Error::Faulted`。
    pub fn step(&mut self) -> Result<u32> {
        if let Some(pc) = self.faulted_at {
            return Err(Error::Faulted { pc });
        }

        let pc = self.cpu.regs.pc;
        let mut cycles = match self.cpu.execute(&mut self.mmu, &mut self.lines) {
            Ok(cycles) => cycles,
            Err(cause) => return Err(self.fault(cause, pc)),
        };
        if let Some(cause) = self.mmu.take_fault() {
            return Err(self.fault(cause, pc));
        }
        self.advance_peripherals(cycles);

        if let Some(service) = self.lines.service_if_pending(&mut self.cpu, &mut self.mmu) {
            self.advance_peripherals(service);
            cycles += service;
        }

        self.cycles += cycles as u64;
        Ok(cycles)
    }

    /// 執行至少一整幀 (70224 週期)，返回實際消耗的週期
    pub fn run_frame(&mut self) -> Result<u32> {
        let mut frame_cycles = 0;
        while frame_cycles < FRAME_CYCLES {
            frame_cycles += self.step()?;
        }
        Ok(frame_cycles)
    }

    // 依指令週期推進 Timer 與 PPU，完成一幀時交給顯示端
    fn advance_peripherals(&mut self, cycles: u32) {
        self.timer.advance(cycles, &mut self.mmu);
        if self.ppu.advance(cycles, &mut self.mmu) {
            self.frames += 1;
            if let Some(sink) = self.sink.as_mut() {
                sink.present(self.ppu.framebuffer());
            }
        }
    }

    fn fault(&mut self, cause: Error, pc: u16) -> Error {
        let snapshot = self.register_snapshot();
        log::error!("fatal at PC={:04X}: {} [{}]", pc, cause, snapshot);
        self.faulted_at = Some(pc);
        Error::Fatal {
            cause: Box::new(cause),
            snapshot,
        }
    }

    pub fn set_button_state(&mut self, buttons: ButtonState) {
        self.mmu.set_buttons(buttons);
    }

    // 獲取當前畫面緩衝區
    pub fn framebuffer(&self) -> &Framebuffer {
        self.ppu.framebuffer()
    }

    pub fn register_snapshot(&self) -> RegisterSnapshot {
        self.cpu.snapshot(self.lines.master_enabled())
    }

    /// 給除錯器讀取記憶體，不會有副作用
    pub fn read_memory(&self, address: u16) -> u8 {
        self.mmu.read_byte(address)
    }

    pub fn serial_output(&self) -> &str {
        self.mmu.serial_output()
    }

    pub fn cartridge(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted_at.is_some()
    }

    /// 開機 ROM 是否仍覆蓋在 0x0000-0x00FF
    pub fn boot_rom_mapped(&self) -> bool {
        self.mmu.boot_rom_mapped()
    }
}
