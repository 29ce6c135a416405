// 卡帶映像與標頭解析

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::mbc::{MbcKind, MBC2_RAM_SIZE, ROM_BANK_SIZE};

const HEADER_END: usize = 0x150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    pub title: String,
    pub cartridge_type: u8,
    pub mbc: MbcKind,
    pub rom_size_code: u8,
    pub ram_size_code: u8,
    pub destination: u8,
}

impl CartridgeHeader {
    pub fn parse(rom_data: &[u8]) -> Result<CartridgeHeader> {
        if rom_data.len() < HEADER_END {
            return Err(Error::RomTooSmall(rom_data.len()));
        }

        // 標題以 NUL 結尾，非 ASCII 字元以替代字元呈現
        let title_bytes = &rom_data[0x0134..=0x0143];
        let end = title_bytes.iter().position(|&b| b == 0).unwrap_or(title_bytes.len());
        let title = String::from_utf8_lossy(&title_bytes[..end]).trim_end().to_string();

        let cartridge_type = rom_data[0x0147];
        let header = CartridgeHeader {
            title,
            cartridge_type,
            mbc: MbcKind::from_cartridge_type(cartridge_type)?,
            rom_size_code: rom_data[0x0148],
            ram_size_code: rom_data[0x0149],
            destination: rom_data[0x014A],
        };
        // 提早驗證大小代碼
        header.rom_banks()?;
        header.ram_size()?;
        Ok(header)
    }

    /// 16 KiB ROM 銀行數 (2 << code)
    pub fn rom_banks(&self) -> Result<usize> {
        match self.rom_size_code {
            code @ 0x00..=0x08 => Ok(2 << code),
            code => Err(Error::UnsupportedHeaderCode { field: "ROM size", code }),
        }
    }

    /// 外部 RAM 位元組數，MBC2 固定為內建 512 位元組
    pub fn ram_size(&self) -> Result<usize> {
        if self.mbc == MbcKind::Mbc2 {
            return Ok(MBC2_RAM_SIZE);
        }
        match self.ram_size_code {
            0x00 => Ok(0),
            0x01 => Ok(2 * 1024),
            0x02 => Ok(8 * 1024),
            0x03 => Ok(32 * 1024),
            0x04 => Ok(128 * 1024),
            0x05 => Ok(64 * 1024),
            code => Err(Error::UnsupportedHeaderCode { field: "RAM size", code }),
        }
    }

    pub fn is_japanese(&self) -> bool {
        self.destination == 0x00
    }
}

/// 已驗證標頭的卡帶映像
#[derive(Debug, Clone)]
pub struct Cartridge {
    pub header: CartridgeHeader,
    rom: Vec<u8>,
}

impl Cartridge {
    /// 解析標頭，並把映像補齊到整數個 16 KiB 銀行 (至少為標頭宣告的大小)
    pub fn from_bytes(mut rom: Vec<u8>) -> Result<Cartridge> {
        let header = CartridgeHeader::parse(&rom)?;
        let image_banks = rom.len().div_ceil(ROM_BANK_SIZE);
        let banks = image_banks.max(header.rom_banks()?);
        if rom.len() != banks * ROM_BANK_SIZE {
            log::debug!("padding ROM image from {} to {} bytes", rom.len(), banks * ROM_BANK_SIZE);
            rom.resize(banks * ROM_BANK_SIZE, 0xFF);
        }
        Ok(Cartridge { header, rom })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Cartridge> {
        let path = path.as_ref();
        let rom = fs::read(path)?;
        let cartridge = Cartridge::from_bytes(rom)?;
        log::info!(
            "loaded ROM {} \"{}\" ({:?}, {} banks, {} bytes RAM)",
            path.display(),
            cartridge.header.title,
            cartridge.header.mbc,
            cartridge.rom_banks(),
            cartridge.header.ram_size()?
        );
        Ok(cartridge)
    }

    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub fn rom_banks(&self) -> usize {
        self.rom.len() / ROM_BANK_SIZE
    }

    pub fn into_rom(self) -> Vec<u8> {
        self.rom
    }
}
