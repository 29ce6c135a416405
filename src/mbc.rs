// MBC (Memory Bank Controller) - 卡帶端的 ROM/RAM 分頁邏輯
//
// ROM 區寫入不會儲存，而是改變控制器的暫存器。

use crate::error::{Error, Result};

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;

/// MBC2 內建 512 x 4 位元 RAM
pub const MBC2_RAM_SIZE: usize = 0x200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcKind {
    None,
    Mbc1,
    Mbc2,
}

impl MbcKind {
    /// 依卡帶標頭 0x147 決定控制器種類，不支援的類型是致命錯誤
    pub fn from_cartridge_type(code: u8) -> Result<MbcKind> {
        match code {
            0x00 | 0x08 | 0x09 => Ok(MbcKind::None),
            0x01..=0x03 => Ok(MbcKind::Mbc1),
            0x05 | 0x06 => Ok(MbcKind::Mbc2),
            other => Err(Error::UnsupportedCartridge(other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BankController {
    kind: MbcKind,
    rom_banks: usize,
    ram_banks: usize,
    ram_enable: bool,
    bank_low: u8,  // MBC1: 5 位元, MBC2: 4 位元
    bank_high: u8, // MBC1 的 2 位元次要暫存器
    mode: u8,      // MBC1: 0 = ROM banking, 1 = RAM banking
}

impl BankController {
    /// `rom_banks` 為 16 KiB 銀行數，`ram_len` 為外部 RAM 位元組數
    pub fn new(kind: MbcKind, rom_banks: usize, ram_len: usize) -> Self {
        BankController {
            kind,
            rom_banks: rom_banks.max(2),
            ram_banks: ram_len.div_ceil(RAM_BANK_SIZE),
            ram_enable: false,
            bank_low: 1,
            bank_high: 0,
            mode: 0,
        }
    }

    pub fn kind(&self) -> MbcKind {
        self.kind
    }

    pub fn rom_bank_count(&self) -> usize {
        self.rom_banks
    }

    pub fn ram_enabled(&self) -> bool {
        match self.kind {
            // ROM+RAM 卡帶沒有啟用閂鎖
            MbcKind::None => true,
            MbcKind::Mbc1 | MbcKind::Mbc2 => self.ram_enable,
        }
    }

    // 地址線數量有限，銀行號碼超出部分會被截掉
    fn rom_mask(&self) -> usize {
        self.rom_banks.next_power_of_two() - 1
    }

    /// 0x0000-0x3FFF 區域對應的銀行
    pub fn low_rom_bank(&self) -> usize {
        match self.kind {
            MbcKind::Mbc1 if self.mode & 1 == 1 => {
                ((self.bank_high as usize) << 5) & self.rom_mask()
            }
            _ => 0,
        }
    }

    /// 0x4000-0x7FFF 區域對應的銀行
    pub fn rom_bank(&self) -> usize {
        let bank = match self.kind {
            MbcKind::None => 1,
            MbcKind::Mbc1 => {
                (self.bank_low as usize & 0x1F) | ((self.bank_high as usize & 0x03) << 5)
            }
            MbcKind::Mbc2 => self.bank_low as usize & 0x0F,
        };
        bank & self.rom_mask()
    }

    pub fn ram_bank(&self) -> usize {
        match self.kind {
            MbcKind::Mbc1 if self.mode & 1 == 1 && self.ram_banks > 1 => {
                (self.bank_high as usize & 0x03) % self.ram_banks
            }
            _ => 0,
        }
    }

    /// ROM 映像中的位元組偏移
    pub fn rom_offset(&self, address: u16) -> usize {
        let addr = address as usize;
        if addr < ROM_BANK_SIZE {
            self.low_rom_bank() * ROM_BANK_SIZE + addr
        } else {
            self.rom_bank() * ROM_BANK_SIZE + (addr - ROM_BANK_SIZE)
        }
    }

    /// 外部 RAM 的位元組偏移，RAM 關閉時返回 None
    pub fn ram_offset(&self, address: u16, ram_len: usize) -> Option<usize> {
        if !self.ram_enabled() || ram_len == 0 {
            return None;
        }
        let addr = (address as usize).wrapping_sub(0xA000);
        let offset = match self.kind {
            // 512 位元組在整個 0xA000-0xBFFF 重複出現
            MbcKind::Mbc2 => addr & (MBC2_RAM_SIZE - 1),
            _ => self.ram_bank() * RAM_BANK_SIZE + addr,
        };
        Some(offset % ram_len)
    }

    /// 處理 0x0000-0x7FFF 的寫入
    ///
    /// 寫入後選到的銀行若超出卡帶的銀行數，返回 `BankOutOfRange`。
    pub fn write_register(&mut self, address: u16, value: u8) -> Result<()> {
        match self.kind {
            MbcKind::None => return Ok(()),
            MbcKind::Mbc1 => match address {
                0x0000..=0x1FFF => self.ram_enable = value & 0x0F == 0x0A,
                0x2000..=0x3FFF => {
                    // 0 會被視為 1
                    self.bank_low = (value & 0x1F).max(1);
                }
                0x4000..=0x5FFF => self.bank_high = value & 0x03,
                0x6000..=0x7FFF => self.mode = value & 0x01,
                _ => {}
            },
            MbcKind::Mbc2 => {
                if address < 0x4000 {
                    // 位址 bit 8 決定是 RAM 啟用還是 ROM 銀行暫存器
                    if address & 0x0100 == 0 {
                        self.ram_enable = value & 0x0F == 0x0A;
                    } else {
                        self.bank_low = (value & 0x0F).max(1);
                    }
                }
            }
        }
        self.check_banks()?;
        if address >= 0x2000 {
            log::debug!(
                "{:?} bank select: rom={} low={} ram={}",
                self.kind,
                self.rom_bank(),
                self.low_rom_bank(),
                self.ram_bank()
            );
        }
        Ok(())
    }

    fn check_banks(&self) -> Result<()> {
        for bank in [self.low_rom_bank(), self.rom_bank()] {
            if bank >= self.rom_banks {
                return Err(Error::BankOutOfRange {
                    kind: self.kind,
                    bank,
                    count: self.rom_banks,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cartridge_type_codes() {
        assert_eq!(MbcKind::from_cartridge_type(0x00).unwrap(), MbcKind::None);
        assert_eq!(MbcKind::from_cartridge_type(0x03).unwrap(), MbcKind::Mbc1);
        assert_eq!(MbcKind::from_cartridge_type(0x06).unwrap(), MbcKind::Mbc2);
        assert!(matches!(
            MbcKind::from_cartridge_type(0x13),
            Err(Error::UnsupportedCartridge(0x13))
        ));
    }

    #[test]
    fn test_mbc1_bank_zero_maps_to_one() {
        let mut mbc = BankController::new(MbcKind::Mbc1, 32, 0);
        mbc.write_register(0x2000, 0x00).unwrap();
        assert_eq!(mbc.rom_bank(), 1);
        mbc.write_register(0x2000, 0x05).unwrap();
        assert_eq!(mbc.rom_bank(), 5);
        assert_eq!(mbc.rom_offset(0x4000), 5 * ROM_BANK_SIZE);
        assert_eq!(mbc.rom_offset(0x0123), 0x0123);
    }

    #[test]
    fn test_mbc1_upper_bits_and_mode() {
        let mut mbc = BankController::new(MbcKind::Mbc1, 128, 0x8000);
        mbc.write_register(0x2000, 0x02).unwrap();
        mbc.write_register(0x4000, 0x01).unwrap();
        assert_eq!(mbc.rom_bank(), 0x22);
        assert_eq!(mbc.low_rom_bank(), 0);
        assert_eq!(mbc.ram_bank(), 0);
        // 模式 1：次要暫存器同時選擇 RAM 銀行與低區 ROM 銀行
        mbc.write_register(0x6000, 0x01).unwrap();
        assert_eq!(mbc.low_rom_bank(), 0x20);
        assert_eq!(mbc.ram_bank(), 1);
    }

    #[test]
    fn test_mbc1_bank_number_masked_to_rom_size() {
        let mut mbc = BankController::new(MbcKind::Mbc1, 4, 0);
        mbc.write_register(0x2000, 0x07).unwrap();
        assert_eq!(mbc.rom_bank(), 3);
    }

    #[test]
    fn test_bank_outside_odd_sized_image_is_fatal() {
        // 6 個銀行的映像：遮罩為 7，選到 6 或 7 便超出範圍
        let mut mbc = BankController::new(MbcKind::Mbc1, 6, 0);
        mbc.write_register(0x2000, 0x05).unwrap();
        let err = mbc.write_register(0x2000, 0x07).unwrap_err();
        assert!(matches!(
            err,
            Error::BankOutOfRange { kind: MbcKind::Mbc1, bank: 7, count: 6 }
        ));
    }

    #[test]
    fn test_ram_enable_latch() {
        let mut mbc = BankController::new(MbcKind::Mbc1, 4, 0x2000);
        assert_eq!(mbc.ram_offset(0xA000, 0x2000), None);
        mbc.write_register(0x0000, 0x0A).unwrap();
        assert_eq!(mbc.ram_offset(0xA010, 0x2000), Some(0x10));
        mbc.write_register(0x1FFF, 0x00).unwrap();
        assert!(!mbc.ram_enabled());
    }

    #[test]
    fn test_mbc2_register_select_by_address_bit8() {
        let mut mbc = BankController::new(MbcKind::Mbc2, 16, MBC2_RAM_SIZE);
        // bit 8 為 0：RAM 啟用
        mbc.write_register(0x0000, 0x0A).unwrap();
        assert!(mbc.ram_enabled());
        assert_eq!(mbc.rom_bank(), 1);
        // bit 8 為 1：ROM 銀行
        mbc.write_register(0x2100, 0x0F).unwrap();
        assert_eq!(mbc.rom_bank(), 15);
        mbc.write_register(0x0100, 0x00).unwrap();
        assert_eq!(mbc.rom_bank(), 1);
        // 512 位元組鏡像
        assert_eq!(mbc.ram_offset(0xA200, MBC2_RAM_SIZE), Some(0));
    }

    #[test]
    fn test_rom_only_ignores_writes() {
        let mut mbc = BankController::new(MbcKind::None, 2, 0);
        mbc.write_register(0x2000, 0x03).unwrap();
        assert_eq!(mbc.rom_bank(), 1);
        assert_eq!(mbc.ram_offset(0xA000, 0), None);
    }
}
