// 記憶體管理單元 (MMU) - 負責 CPU 與記憶體/I/O 的通訊
//
// 所有可定址的儲存空間與 MBC 狀態都在這裡。讀寫永遠不會失敗；
// MBC 發現的不變量違規會被暫存，由驅動程式在指令結束後取走。

use crate::error::Error;
use crate::interrupts::Interrupt;
use crate::joypad::{ButtonState, Joypad};
use crate::mbc::{BankController, MbcKind};
use crate::rom::Cartridge;

// I/O 暫存器位址
pub const JOYP: u16 = 0xFF00;
pub const SB: u16 = 0xFF01;
pub const SC: u16 = 0xFF02;
pub const DIV: u16 = 0xFF04;
pub const TIMA: u16 = 0xFF05;
pub const TMA: u16 = 0xFF06;
pub const TAC: u16 = 0xFF07;
pub const IF: u16 = 0xFF0F;
pub const LCDC: u16 = 0xFF40;
pub const STAT: u16 = 0xFF41;
pub const SCY: u16 = 0xFF42;
pub const SCX: u16 = 0xFF43;
pub const LY: u16 = 0xFF44;
pub const LYC: u16 = 0xFF45;
pub const DMA: u16 = 0xFF46;
pub const BGP: u16 = 0xFF47;
pub const OBP0: u16 = 0xFF48;
pub const OBP1: u16 = 0xFF49;
pub const WY: u16 = 0xFF4A;
pub const WX: u16 = 0xFF4B;
pub const BOOT: u16 = 0xFF50;
pub const IE: u16 = 0xFFFF;

pub const OAM_SIZE: usize = 0xA0;
pub const BOOT_ROM_SIZE: usize = 0x100;

/// 關閉的外部 RAM 讀取時的預設值 (open bus)
pub const DEFAULT_DISABLED_RAM_VALUE: u8 = 0xFF;

#[derive(Debug)]
pub struct Mmu {
    rom: Vec<u8>,         // ROM 數據 (包含所有銀行)
    boot_rom: Option<Vec<u8>>, // 開機 ROM，寫入 0xFF50 前覆蓋 0x0000-0x00FF
    vram: [u8; 0x2000],   // VRAM - 8KB 視訊 RAM
    ext_ram: Vec<u8>,     // 外部卡帶 RAM (根據 MBC 分頁)
    wram: [u8; 0x2000],   // WRAM - 8KB 內部工作 RAM
    oam: [u8; OAM_SIZE],  // OAM - 160 位元組物件屬性記憶體
    io: [u8; 0x80],       // I/O 暫存器
    hram: [u8; 0x7F],     // HRAM - 127 位元組高位 RAM
    ie: u8,               // 中斷啟用寄存器
    mbc: BankController,
    joypad: Joypad,
    disabled_ram_value: u8,
    serial_output: String, // 串口輸出緩衝區 (用於測試 ROM)
    div_reset: bool,
    ly_reset: bool,
    fault: Option<Error>,
}

impl Mmu {
    /// 從開機 ROM 執行完畢後的狀態開始
    pub fn new(cartridge: Cartridge) -> crate::error::Result<Mmu> {
        let mut mmu = Self::power_on(cartridge)?;
        mmu.reset_io();
        Ok(mmu)
    }

    /// 上電狀態，開機 ROM 映射在 0x0000-0x00FF，I/O 暫存器全為 0
    pub fn with_boot_rom(cartridge: Cartridge, boot_rom: Vec<u8>) -> crate::error::Result<Mmu> {
        if boot_rom.len() != BOOT_ROM_SIZE {
            return Err(Error::BootRomSize(boot_rom.len()));
        }
        let mut mmu = Self::power_on(cartridge)?;
        mmu.boot_rom = Some(boot_rom);
        Ok(mmu)
    }

    fn power_on(cartridge: Cartridge) -> crate::error::Result<Mmu> {
        let header = cartridge.header.clone();
        let ram_len = header.ram_size()?;
        let rom_banks = cartridge.rom_banks();
        Ok(Mmu {
            rom: cartridge.into_rom(),
            boot_rom: None,
            vram: [0; 0x2000],
            ext_ram: vec![0; ram_len],
            wram: [0; 0x2000],
            oam: [0; OAM_SIZE],
            io: [0; 0x80],
            hram: [0; 0x7F],
            ie: 0,
            mbc: BankController::new(header.mbc, rom_banks, ram_len),
            joypad: Joypad::new(),
            disabled_ram_value: DEFAULT_DISABLED_RAM_VALUE,
            serial_output: String::new(),
            div_reset: false,
            ly_reset: false,
            fault: None,
        })
    }

    // 開機 ROM 結束後的 I/O 狀態 (DMG)
    fn reset_io(&mut self) {
        self.set_io_register(DIV, 0xAB);
        self.set_io_register(TAC, 0xF8);
        self.set_io_register(IF, 0x01);
        self.set_io_register(LCDC, 0x91);
        self.set_io_register(STAT, 0x80);
        self.set_io_register(BGP, 0xFC);
        self.set_io_register(OBP0, 0xFF);
        self.set_io_register(OBP1, 0xFF);
        self.set_io_register(SC, 0x7E);
    }

    pub fn set_disabled_ram_value(&mut self, value: u8) {
        self.disabled_ram_value = value;
    }

    pub fn mbc(&self) -> &BankController {
        &self.mbc
    }

    pub fn boot_rom_mapped(&self) -> bool {
        self.boot_rom.is_some()
    }

    pub fn read_byte(&self, address: u16) -> u8 {
        if let Some(boot_rom) = &self.boot_rom {
            if (address as usize) < BOOT_ROM_SIZE {
                return boot_rom[address as usize];
            }
        }
        match address {
            0x0000..=0x7FFF => {
                // 超出映像的偏移只可能在 MBC 錯誤後出現
                let offset = self.mbc.rom_offset(address);
                self.rom.get(offset).copied().unwrap_or(0xFF)
            }
            0x8000..=0x9FFF => self.vram[(address - 0x8000) as usize], // VRAM
            0xA000..=0xBFFF => match self.mbc.ram_offset(address, self.ext_ram.len()) {
                Some(offset) if self.mbc.kind() == MbcKind::Mbc2 => 0xF0 | self.ext_ram[offset],
                Some(offset) => self.ext_ram[offset],
                None => self.disabled_ram_value,
            },
            0xC000..=0xDFFF => self.wram[(address - 0xC000) as usize], // WRAM
            0xE000..=0xFDFF => self.wram[(address - 0xE000) as usize], // Echo RAM
            0xFE00..=0xFE9F => self.oam[(address - 0xFE00) as usize],  // OAM
            0xFEA0..=0xFEFF => 0xFF,                                   // 未使用區域
            0xFF00..=0xFF7F => self.read_io(address),
            0xFF80..=0xFFFE => self.hram[(address - 0xFF80) as usize], // HRAM
            0xFFFF => self.ie,
        }
    }

    fn read_io(&self, address: u16) -> u8 {
        let raw = self.io_register(address);
        match address {
            JOYP => self.joypad.read_register(),
            SC => raw | 0x7E,
            TAC => raw | 0xF8,
            IF => raw | 0xE0, // 高 3 位始終為 1
            STAT => raw | 0x80,
            _ => raw,
        }
    }

    pub fn write_byte(&mut self, address: u16, value: u8) {
        match address {
            0x0000..=0x7FFF => {
                // ROM 不可寫入，改為 MBC 設定
                if let Err(err) = self.mbc.write_register(address, value) {
                    log::error!("bank controller fault at {:04X}: {}", address, err);
                    self.fault.get_or_insert(err);
                }
            }
            0x8000..=0x9FFF => self.vram[(address - 0x8000) as usize] = value,
            0xA000..=0xBFFF => {
                if let Some(offset) = self.mbc.ram_offset(address, self.ext_ram.len()) {
                    self.ext_ram[offset] = match self.mbc.kind() {
                        MbcKind::Mbc2 => value & 0x0F,
                        _ => value,
                    };
                }
            }
            0xC000..=0xDFFF => self.wram[(address - 0xC000) as usize] = value,
            0xE000..=0xFDFF => self.wram[(address - 0xE000) as usize] = value,
            0xFE00..=0xFE9F => self.oam[(address - 0xFE00) as usize] = value,
            0xFEA0..=0xFEFF => {}
            0xFF00..=0xFF7F => self.write_io(address, value),
            0xFF80..=0xFFFE => self.hram[(address - 0xFF80) as usize] = value,
            0xFFFF => self.ie = value,
        }
    }

    fn write_io(&mut self, address: u16, value: u8) {
        match address {
            JOYP => self.joypad.write_register(value),
            SC => {
                self.set_io_register(SC, value);
                // 啟動傳輸 (Bit 7) 時立即完成
                if value & 0x80 != 0 {
                    self.complete_serial_transfer();
                }
            }
            DIV => {
                // 寫入任何值都會將 DIV 清零
                self.set_io_register(DIV, 0);
                self.div_reset = true;
            }
            IF => self.set_io_register(IF, value & 0x1F),
            STAT => {
                // 只有位元 3-6 可寫入，模式與 LYC 比對位元由 PPU 維護
                let current = self.io_register(STAT);
                self.set_io_register(STAT, (current & 0x07) | (value & 0x78));
            }
            LY => {
                // 掃描線由 PPU 維護，這裡只清零並通知 PPU 重新開始
                self.set_io_register(LY, 0);
                self.ly_reset = true;
            }
            DMA => {
                self.set_io_register(DMA, value);
                self.perform_dma(value);
            }
            BOOT => {
                self.set_io_register(BOOT, value);
                // 寫入非 0 值後開機 ROM 永久卸下
                if value != 0 && self.boot_rom.take().is_some() {
                    log::info!("boot ROM unmapped, cartridge visible at 0x0000");
                }
            }
            _ => self.set_io_register(address, value),
        }
    }

    fn complete_serial_transfer(&mut self) {
        let byte = self.io_register(SB);
        if (0x20..0x7F).contains(&byte) || byte == b'\n' {
            self.serial_output.push(byte as char);
        }
        // 沒連接設備時，讀取回來的數據會是 0xFF
        self.set_io_register(SB, 0xFF);
        let sc = self.io_register(SC);
        self.set_io_register(SC, sc & 0x7F);
        self.request_interrupt(Interrupt::Serial);
    }

    // 執行 OAM DMA 傳輸 (0xFF46)
    fn perform_dma(&mut self, value: u8) {
        let source_base = (value as u16) << 8;
        for i in 0..OAM_SIZE as u16 {
            self.oam[i as usize] = self.read_byte(source_base.wrapping_add(i));
        }
    }

    // 讀取字組 (little-endian)
    pub fn read_word(&self, address: u16) -> u16 {
        let low = self.read_byte(address);
        let high = self.read_byte(address.wrapping_add(1));
        u16::from_le_bytes([low, high])
    }

    // 寫入字組 (little-endian)
    pub fn write_word(&mut self, address: u16, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.write_byte(address, low);
        self.write_byte(address.wrapping_add(1), high);
    }

    /// 直接存取 I/O 暫存器的原始值，不經過攔截邏輯
    pub fn io_register(&self, address: u16) -> u8 {
        self.io[(address & 0x7F) as usize]
    }

    pub fn set_io_register(&mut self, address: u16, value: u8) {
        self.io[(address & 0x7F) as usize] = value;
    }

    pub fn interrupt_flags(&self) -> u8 {
        self.io_register(IF) & 0x1F
    }

    pub fn interrupt_enable(&self) -> u8 {
        self.ie
    }

    pub fn request_interrupt(&mut self, irq: Interrupt) {
        let flags = self.interrupt_flags() | irq.mask();
        self.set_io_register(IF, flags);
    }

    pub fn clear_interrupt(&mut self, irq: Interrupt) {
        let flags = self.interrupt_flags() & !irq.mask();
        self.set_io_register(IF, flags);
    }

    /// 更新按鍵快照，必要時請求 Joypad 中斷
    pub fn set_buttons(&mut self, buttons: ButtonState) {
        if self.joypad.set_buttons(buttons) {
            self.request_interrupt(Interrupt::Joypad);
        }
    }

    pub fn take_div_reset(&mut self) -> bool {
        std::mem::take(&mut self.div_reset)
    }

    pub fn take_ly_reset(&mut self) -> bool {
        std::mem::take(&mut self.ly_reset)
    }

    /// 取走 MBC 暫存的錯誤
    pub fn take_fault(&mut self) -> Option<Error> {
        self.fault.take()
    }

    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    pub fn oam(&self) -> &[u8] {
        &self.oam
    }

    pub fn serial_output(&self) -> &str {
        &self.serial_output
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::rom::tests::blank_image;

    /// 32 KiB 無 MBC 的卡帶
    pub(crate) fn test_mmu() -> Mmu {
        mmu_with(blank_image(0x00, 0x00, 0x00, 0x8000))
    }

    pub(crate) fn mmu_with(image: Vec<u8>) -> Mmu {
        let cartridge = Cartridge::from_bytes(image).unwrap();
        Mmu::new(cartridge).unwrap()
    }

    // 每個銀行第一個位元組寫入銀行號碼
    fn banked_image(cartridge_type: u8, rom_code: u8, ram_code: u8) -> Vec<u8> {
        let banks = 2usize << rom_code;
        let mut rom = blank_image(cartridge_type, rom_code, ram_code, banks * 0x4000);
        for bank in 1..banks {
            rom[bank * 0x4000] = bank as u8;
        }
        rom
    }

    #[test]
    fn test_echo_ram_aliases_wram() {
        let mut mmu = test_mmu();
        mmu.write_byte(0xE000, 0x01);
        assert_eq!(mmu.read_byte(0xC000), 0x01);
        mmu.write_byte(0xDDFF, 0x5A);
        assert_eq!(mmu.read_byte(0xFDFF), 0x5A);
    }

    #[test]
    fn test_word_little_endian() {
        let mut mmu = test_mmu();
        mmu.write_word(0xC100, 0x1234);
        assert_eq!(mmu.read_byte(0xC100), 0x34);
        assert_eq!(mmu.read_byte(0xC101), 0x12);
        assert_eq!(mmu.read_word(0xC100), 0x1234);
    }

    #[test]
    fn test_rom_writes_do_not_store() {
        let mut mmu = test_mmu();
        let before = mmu.read_byte(0x0147);
        mmu.write_byte(0x0147, 0x42);
        assert_eq!(mmu.read_byte(0x0147), before);
        assert!(mmu.take_fault().is_none());
    }

    #[test]
    fn test_mbc1_rom_bank_switching() {
        let mut mmu = mmu_with(banked_image(0x01, 0x02, 0x00)); // 8 banks
        assert_eq!(mmu.read_byte(0x4000), 1);
        mmu.write_byte(0x2000, 0x05);
        assert_eq!(mmu.read_byte(0x4000), 5);
        mmu.write_byte(0x2000, 0x00);
        assert_eq!(mmu.read_byte(0x4000), 1);
        assert!(mmu.take_fault().is_none());
    }

    #[test]
    fn test_disabled_ram_returns_fallback() {
        let mut mmu = mmu_with(banked_image(0x03, 0x01, 0x02));
        mmu.write_byte(0xA000, 0x12);
        assert_eq!(mmu.read_byte(0xA000), 0xFF);
        mmu.set_disabled_ram_value(0x00);
        assert_eq!(mmu.read_byte(0xA000), 0x00);

        mmu.write_byte(0x0000, 0x0A);
        mmu.write_byte(0xA000, 0x12);
        assert_eq!(mmu.read_byte(0xA000), 0x12);
        mmu.write_byte(0x0000, 0x00);
        assert_eq!(mmu.read_byte(0xA000), 0x00);
    }

    #[test]
    fn test_mbc2_nibble_ram() {
        let mut mmu = mmu_with(banked_image(0x06, 0x03, 0x00));
        mmu.write_byte(0x0000, 0x0A);
        mmu.write_byte(0xA001, 0xAB);
        assert_eq!(mmu.read_byte(0xA001), 0xFB);
        assert_eq!(mmu.read_byte(0xA201), 0xFB);
        mmu.write_byte(0x2100, 0x03);
        assert_eq!(mmu.read_byte(0x4000), 3);
    }

    #[test]
    fn test_bank_fault_latched() {
        // 6 個銀行的映像 (非 2 的冪)
        let mut image = banked_image(0x01, 0x01, 0x00);
        image.resize(6 * 0x4000, 0);
        let mut mmu = mmu_with(image);
        mmu.write_byte(0x2000, 0x07);
        assert!(matches!(mmu.take_fault(), Some(Error::BankOutOfRange { bank: 7, count: 6, .. })));
        assert!(mmu.take_fault().is_none());
    }

    #[test]
    fn test_ly_write_resets() {
        let mut mmu = test_mmu();
        mmu.set_io_register(LY, 0x42);
        assert!(!mmu.take_ly_reset());
        mmu.write_byte(LY, 0x99);
        assert_eq!(mmu.read_byte(LY), 0);
        assert!(mmu.take_ly_reset());
        assert!(!mmu.take_ly_reset());
    }

    #[test]
    fn test_boot_rom_overlays_until_unmapped() {
        let mut image = blank_image(0x00, 0x00, 0x00, 0x8000);
        image[0x0000] = 0xAA;
        image[0x0100] = 0xBB;
        let mut boot_rom = vec![0u8; BOOT_ROM_SIZE];
        boot_rom[0x0000] = 0x31;
        boot_rom[0x00FF] = 0x50;
        let mut mmu = Mmu::with_boot_rom(Cartridge::from_bytes(image).unwrap(), boot_rom).unwrap();

        assert!(mmu.boot_rom_mapped());
        assert_eq!(mmu.read_byte(0x0000), 0x31);
        assert_eq!(mmu.read_byte(0x00FF), 0x50);
        assert_eq!(mmu.read_byte(0x0100), 0xBB);
        // 上電時 I/O 尚未初始化
        assert_eq!(mmu.read_byte(LCDC), 0x00);
        assert_eq!(mmu.interrupt_flags(), 0x00);

        mmu.write_byte(BOOT, 0x00);
        assert!(mmu.boot_rom_mapped());
        mmu.write_byte(BOOT, 0x01);
        assert!(!mmu.boot_rom_mapped());
        assert_eq!(mmu.read_byte(0x0000), 0xAA);
    }

    #[test]
    fn test_boot_rom_wrong_size() {
        let cartridge = Cartridge::from_bytes(blank_image(0x00, 0x00, 0x00, 0x8000)).unwrap();
        let err = Mmu::with_boot_rom(cartridge, vec![0; 0x80]).unwrap_err();
        assert!(matches!(err, Error::BootRomSize(0x80)));
    }

    #[test]
    fn test_dma_copies_160_bytes() {
        let mut mmu = test_mmu();
        for i in 0..0xA0u16 {
            mmu.write_byte(0xC000 + i, i as u8 ^ 0x55);
        }
        mmu.write_byte(DMA, 0xC0);
        for i in 0..0xA0u16 {
            assert_eq!(mmu.read_byte(0xFE00 + i), i as u8 ^ 0x55);
        }
    }

    #[test]
    fn test_div_write_latches_reset() {
        let mut mmu = test_mmu();
        assert_eq!(mmu.read_byte(DIV), 0xAB);
        mmu.write_byte(DIV, 0x77);
        assert_eq!(mmu.read_byte(DIV), 0);
        assert!(mmu.take_div_reset());
        assert!(!mmu.take_div_reset());
    }

    #[test]
    fn test_stat_and_if_read_masks() {
        let mut mmu = test_mmu();
        mmu.set_io_register(STAT, 0x03);
        mmu.write_byte(STAT, 0xFF);
        assert_eq!(mmu.read_byte(STAT), 0xFB);
        mmu.write_byte(IF, 0x00);
        assert_eq!(mmu.read_byte(IF), 0xE0);
        assert_eq!(mmu.read_byte(0xFEA0), 0xFF);
    }

    #[test]
    fn test_serial_transfer_stub() {
        let mut mmu = test_mmu();
        mmu.write_byte(IF, 0x00);
        for &b in b"ok\n" {
            mmu.write_byte(SB, b);
            mmu.write_byte(SC, 0x81);
        }
        assert_eq!(mmu.serial_output(), "ok\n");
        assert_eq!(mmu.read_byte(SB), 0xFF);
        assert_eq!(mmu.read_byte(SC) & 0x80, 0);
        assert_eq!(mmu.interrupt_flags(), Interrupt::Serial.mask());
    }

    #[test]
    fn test_joypad_interrupt_through_bus() {
        let mut mmu = test_mmu();
        mmu.write_byte(IF, 0x00);
        mmu.write_byte(JOYP, 0x20);
        mmu.set_buttons(ButtonState { left: true, ..Default::default() });
        assert_eq!(mmu.read_byte(JOYP) & 0x0F, 0x0D);
        assert_eq!(mmu.interrupt_flags(), Interrupt::Joypad.mask());
    }
}
