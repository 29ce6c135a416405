// PPU (Picture Processing Unit) - Game Boy 圖形處理器
//
// 以模式為單位的掃描線狀態機：OAM 搜索 80、像素傳輸 172、HBlank 204 週期，
// 每條掃描線 456 週期，154 條掃描線組成一幀 (70224 週期)。
// LCD 暫存器存放在 MMU 的 I/O 區；目前掃描線由 PPU 持有並同步到 LY。

use crate::interrupts::Interrupt;
use crate::mmu::{Mmu, BGP, LCDC, LY, LYC, OBP0, OBP1, SCX, SCY, STAT, WX, WY};

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

pub const OAM_SEARCH_CYCLES: u32 = 80;
pub const PIXEL_TRANSFER_CYCLES: u32 = 172;
pub const HBLANK_CYCLES: u32 = 204;
pub const SCANLINE_CYCLES: u32 = OAM_SEARCH_CYCLES + PIXEL_TRANSFER_CYCLES + HBLANK_CYCLES;
pub const SCANLINES_PER_FRAME: u32 = 154;
pub const FRAME_CYCLES: u32 = SCANLINE_CYCLES * SCANLINES_PER_FRAME;

const VBLANK_START_LINE: u8 = 144;
const LAST_LINE: u8 = 153;
const OAM_ENTRIES: usize = 40;

/// 經過調色板後的 4 階灰度 (0 = 最亮)
pub type Framebuffer = [[u8; SCREEN_WIDTH]; SCREEN_HEIGHT];

/// 把 0-3 的灰度轉成 RGB
pub fn shade_to_rgb(shade: u8) -> [u8; 3] {
    match shade & 0x03 {
        0 => [0xFF, 0xFF, 0xFF],
        1 => [0xAA, 0xAA, 0xAA],
        2 => [0x55, 0x55, 0x55],
        _ => [0x00, 0x00, 0x00],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdMode {
    HBlank = 0,        // 水平空白期
    VBlank = 1,        // 垂直空白期
    OamSearch = 2,     // OAM 搜索
    PixelTransfer = 3, // 像素傳輸
}

impl LcdMode {
    /// 此模式在一條掃描線中佔用的週期
    fn duration(self) -> u32 {
        match self {
            LcdMode::OamSearch => OAM_SEARCH_CYCLES,
            LcdMode::PixelTransfer => PIXEL_TRANSFER_CYCLES,
            LcdMode::HBlank => HBLANK_CYCLES,
            LcdMode::VBlank => SCANLINE_CYCLES,
        }
    }
}

/// Tile 數據定址模式
#[derive(Debug, Clone, Copy, PartialEq)]
enum TileAddressing {
    /// 0x8000-0x8FFF，無符號索引 (0-255)
    Unsigned8000,
    /// 0x8800-0x97FF，帶符號索引 (-128 到 127)，基址 0x9000
    Signed8800,
}

#[derive(Debug, Clone, Copy)]
struct Sprite {
    y_pos: u8, // 實際位置 = y_pos - 16
    x_pos: u8, // 實際位置 = x_pos - 8
    tile_index: u8,
    attributes: u8,
}

impl Sprite {
    fn from_oam(oam: &[u8], oam_index: usize) -> Sprite {
        let base = oam_index * 4;
        Sprite {
            y_pos: oam[base],
            x_pos: oam[base + 1],
            tile_index: oam[base + 2],
            attributes: oam[base + 3],
        }
    }

    fn actual_y(&self) -> i16 {
        self.y_pos as i16 - 16
    }

    fn actual_x(&self) -> i16 {
        self.x_pos as i16 - 8
    }

    fn behind_bg(&self) -> bool {
        self.attributes & 0x80 != 0
    }

    fn flip_y(&self) -> bool {
        self.attributes & 0x40 != 0
    }

    fn flip_x(&self) -> bool {
        self.attributes & 0x20 != 0
    }

    fn palette_register(&self) -> u16 {
        if self.attributes & 0x10 != 0 { OBP1 } else { OBP0 }
    }
}

// 從調色板中提取指定索引的灰度 (0-3)
fn palette_shade(palette: u8, color_index: u8) -> u8 {
    (palette >> (color_index * 2)) & 0x03
}

// 兩個位元平面組合成 2 位元顏色索引，bit 7 是最左邊
fn color_index(low: u8, high: u8, bit: u8) -> u8 {
    (((high >> bit) & 0x01) << 1) | ((low >> bit) & 0x01)
}

#[derive(Debug)]
pub struct Ppu {
    mode: LcdMode,
    ly: u8,
    mode_cycles: u32,
    lcd_on: bool,
    framebuffer: Box<Framebuffer>,
    // 當前掃描線的可見精靈，已依 X 排序
    line_sprites: Vec<Sprite>,
    sprites_per_line: usize,
    // 視窗內部行計數器 - 追蹤已渲染的視窗行數
    window_line: u8,
    // STAT 中斷升緣觸發檢測
    stat_line: bool,
}

impl Ppu {
    pub fn new(sprites_per_line: usize) -> Self {
        Ppu {
            mode: LcdMode::OamSearch,
            ly: 0,
            mode_cycles: 0,
            lcd_on: true,
            framebuffer: Box::new([[0; SCREEN_WIDTH]; SCREEN_HEIGHT]),
            line_sprites: Vec::with_capacity(OAM_ENTRIES),
            sprites_per_line: sprites_per_line.min(OAM_ENTRIES),
            window_line: 0,
            stat_line: false,
        }
    }

    pub fn mode(&self) -> LcdMode {
        self.mode
    }

    pub fn scanline(&self) -> u8 {
        self.ly
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// 推進經過的週期，進入 VBlank (一幀完成) 時返回 true
    ///
    /// CPU 寫入 LY 時從第 0 行的 OAM 搜索重新開始。
    pub fn advance(&mut self, cycles: u32, mmu: &mut Mmu) -> bool {
        let ly_written = mmu.take_ly_reset();
        let lcd_enabled = mmu.io_register(LCDC) & 0x80 != 0;
        if !lcd_enabled {
            if self.lcd_on {
                log::debug!("LCD disabled");
                self.lcd_on = false;
            }
            // 關閉期間維持在重置狀態
            self.reset(mmu);
            return false;
        }
        if !self.lcd_on {
            log::debug!("LCD enabled");
            self.lcd_on = true;
            self.reset(mmu);
        } else if ly_written {
            log::debug!(
                "LY written during {:?} at line {}, restarting frame",
                self.mode,
                self.ly
            );
            self.reset(mmu);
        }

        let mut frame_ready = false;
        self.mode_cycles += cycles;
        while self.mode_cycles >= self.mode.duration() {
            self.mode_cycles -= self.mode.duration();
            frame_ready |= self.finish_mode(mmu);
        }
        frame_ready
    }

    fn reset(&mut self, mmu: &mut Mmu) {
        self.mode_cycles = 0;
        self.window_line = 0;
        self.stat_line = false;
        self.set_ly(0, mmu);
        self.set_mode(LcdMode::OamSearch, mmu);
    }

    // 目前模式的週期用完，切換到下一個模式
    fn finish_mode(&mut self, mmu: &mut Mmu) -> bool {
        let ly = self.ly;
        let mut frame_ready = false;
        match self.mode {
            LcdMode::OamSearch => {
                self.collect_sprites(mmu, ly);
                self.set_mode(LcdMode::PixelTransfer, mmu);
            }
            LcdMode::PixelTransfer => {
                self.render_scanline(mmu, ly);
                self.set_mode(LcdMode::HBlank, mmu);
            }
            LcdMode::HBlank => {
                let next = ly + 1;
                self.set_ly(next, mmu);
                if next >= VBLANK_START_LINE {
                    self.set_mode(LcdMode::VBlank, mmu);
                    mmu.request_interrupt(Interrupt::VBlank);
                    frame_ready = true;
                } else {
                    self.set_mode(LcdMode::OamSearch, mmu);
                }
            }
            LcdMode::VBlank => {
                if ly >= LAST_LINE {
                    // 新幀開始時重置視窗行計數器
                    self.set_ly(0, mmu);
                    self.window_line = 0;
                    self.set_mode(LcdMode::OamSearch, mmu);
                } else {
                    self.set_ly(ly + 1, mmu);
                }
            }
        }
        self.update_stat(mmu);
        frame_ready
    }

    fn set_ly(&mut self, ly: u8, mmu: &mut Mmu) {
        self.ly = ly;
        mmu.set_io_register(LY, ly);
    }

    fn set_mode(&mut self, mode: LcdMode, mmu: &mut Mmu) {
        self.mode = mode;
        let stat = mmu.io_register(STAT);
        mmu.set_io_register(STAT, (stat & 0xFC) | mode as u8);
    }

    // 更新 LYC == LY 標誌並檢查 STAT 中斷條件
    fn update_stat(&mut self, mmu: &mut Mmu) {
        let mut stat = mmu.io_register(STAT);
        if self.ly == mmu.io_register(LYC) {
            stat |= 0x04;
        } else {
            stat &= !0x04;
        }
        mmu.set_io_register(STAT, stat);

        let line = (stat & 0x40 != 0 && stat & 0x04 != 0)
            || match self.mode {
                LcdMode::HBlank => stat & 0x08 != 0,
                LcdMode::VBlank => stat & 0x10 != 0,
                LcdMode::OamSearch => stat & 0x20 != 0,
                LcdMode::PixelTransfer => false,
            };

        // 升緣觸發中斷 - 只在從無中斷變為有中斷時觸發
        if line && !self.stat_line {
            mmu.request_interrupt(Interrupt::LcdStat);
        }
        self.stat_line = line;
    }

    fn sprite_height(lcdc: u8) -> i16 {
        if lcdc & 0x04 != 0 { 16 } else { 8 }
    }

    // OAM 搜索：找出覆蓋這條掃描線的精靈
    fn collect_sprites(&mut self, mmu: &Mmu, ly: u8) {
        self.line_sprites.clear();
        let height = Self::sprite_height(mmu.io_register(LCDC));
        let oam = mmu.oam();
        for index in 0..OAM_ENTRIES {
            if self.line_sprites.len() >= self.sprites_per_line {
                break;
            }
            let sprite = Sprite::from_oam(oam, index);
            let top = sprite.actual_y();
            if (ly as i16) >= top && (ly as i16) < top + height {
                self.line_sprites.push(sprite);
            }
        }
        // X 較小的優先；穩定排序保留 OAM 順序
        self.line_sprites.sort_by_key(|sprite| sprite.x_pos);
    }

    fn tile_row(mmu: &Mmu, tile_index: u8, row: u8, addressing: TileAddressing) -> (u8, u8) {
        let tile_addr = match addressing {
            TileAddressing::Unsigned8000 => tile_index as usize * 16,
            TileAddressing::Signed8800 => (0x1000 + (tile_index as i8 as isize) * 16) as usize,
        };
        let vram = mmu.vram();
        let line_addr = tile_addr + row as usize * 2;
        (vram[line_addr], vram[line_addr + 1])
    }

    // 從 32x32 的圖塊地圖讀取圖塊索引
    fn map_tile(mmu: &Mmu, high_map: bool, x: u8, y: u8) -> u8 {
        let base = if high_map { 0x1C00 } else { 0x1800 };
        mmu.vram()[base + (y as usize / 8) * 32 + x as usize / 8]
    }

    // 渲染當前掃描線
    fn render_scanline(&mut self, mmu: &Mmu, ly: u8) {
        if ly as usize >= SCREEN_HEIGHT {
            return;
        }
        let lcdc = mmu.io_register(LCDC);
        let scx = mmu.io_register(SCX);
        let scy = mmu.io_register(SCY);
        let wy = mmu.io_register(WY);
        let wx = mmu.io_register(WX);
        let bgp = mmu.io_register(BGP);

        let bg_enabled = lcdc & 0x01 != 0;
        let addressing = if lcdc & 0x10 != 0 {
            TileAddressing::Unsigned8000
        } else {
            TileAddressing::Signed8800
        };
        let window_visible = bg_enabled && lcdc & 0x20 != 0 && ly >= wy && wx <= 166;
        let mut window_used = false;

        // 背景/視窗的顏色索引，精靈優先級需要用到
        let mut bg_indices = [0u8; SCREEN_WIDTH];
        for x in 0..SCREEN_WIDTH as u8 {
            if !bg_enabled {
                continue;
            }
            let in_window = window_visible && x as u16 + 7 >= wx as u16;
            let (map_x, map_y, high_map) = if in_window {
                window_used = true;
                (x + 7 - wx, self.window_line, lcdc & 0x40 != 0)
            } else {
                (x.wrapping_add(scx), ly.wrapping_add(scy), lcdc & 0x08 != 0)
            };
            let tile = Self::map_tile(mmu, high_map, map_x, map_y);
            let (low, high) = Self::tile_row(mmu, tile, map_y % 8, addressing);
            bg_indices[x as usize] = color_index(low, high, 7 - map_x % 8);
        }

        let row = &mut self.framebuffer[ly as usize];
        for (x, &index) in bg_indices.iter().enumerate() {
            row[x] = if bg_enabled { palette_shade(bgp, index) } else { 0 };
        }

        if lcdc & 0x02 != 0 {
            self.render_sprites(mmu, ly, lcdc, &bg_indices);
        }

        if window_used {
            self.window_line = self.window_line.wrapping_add(1);
        }
    }

    fn render_sprites(&mut self, mmu: &Mmu, ly: u8, lcdc: u8, bg_indices: &[u8; SCREEN_WIDTH]) {
        let height = Self::sprite_height(lcdc);
        let row = &mut self.framebuffer[ly as usize];
        for x in 0..SCREEN_WIDTH {
            // 依排序後的順序，第一個不透明的像素勝出
            for sprite in &self.line_sprites {
                let left = sprite.actual_x();
                if (x as i16) < left || (x as i16) >= left + 8 {
                    continue;
                }
                let mut rel_y = (ly as i16 - sprite.actual_y()) as u8;
                if sprite.flip_y() {
                    rel_y = height as u8 - 1 - rel_y;
                }
                // 8x16 模式下 bit 0 被忽略
                let tile = if height == 16 {
                    (sprite.tile_index & 0xFE) + rel_y / 8
                } else {
                    sprite.tile_index
                };
                // 精靈總是使用 0x8000-0x8FFF 圖塊集
                let (low, high) =
                    Self::tile_row(mmu, tile, rel_y % 8, TileAddressing::Unsigned8000);
                let rel_x = (x as i16 - left) as u8;
                let bit = if sprite.flip_x() { rel_x } else { 7 - rel_x };
                let index = color_index(low, high, bit);
                // 顏色索引 0 是透明的
                if index == 0 {
                    continue;
                }
                if !(sprite.behind_bg() && bg_indices[x] != 0) {
                    let palette = mmu.io_register(sprite.palette_register());
                    row[x] = palette_shade(palette, index);
                }
                break;
            }
        }
        log::trace!("line {} drew {} sprites", ly, self.line_sprites.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmu::tests::test_mmu;
    use crate::mmu::IF;

    fn setup() -> (Ppu, Mmu) {
        let mut mmu = test_mmu();
        mmu.write_byte(IF, 0x00);
        mmu.write_byte(BGP, 0xE4);
        mmu.write_byte(OBP0, 0xE4);
        (Ppu::new(40), mmu)
    }

    fn write_tile_row(mmu: &mut Mmu, tile: u16, row: u16, low: u8, high: u8) {
        mmu.write_byte(0x8000 + tile * 16 + row * 2, low);
        mmu.write_byte(0x8000 + tile * 16 + row * 2 + 1, high);
    }

    fn write_sprite(mmu: &mut Mmu, index: u16, y: u8, x: u8, tile: u8, attributes: u8) {
        let base = 0xFE00 + index * 4;
        mmu.write_byte(base, y);
        mmu.write_byte(base + 1, x);
        mmu.write_byte(base + 2, tile);
        mmu.write_byte(base + 3, attributes);
    }

    #[test]
    fn test_frame_is_70224_cycles() {
        assert_eq!(FRAME_CYCLES, 70_224);
        let (mut ppu, mut mmu) = setup();
        assert!(!ppu.advance(65_663, &mut mmu));
        assert!(ppu.advance(1, &mut mmu));
        assert_eq!(mmu.read_byte(LY), 144);
        assert_eq!(ppu.mode(), LcdMode::VBlank);
        // 下一幀剛好 70224 週期之後
        assert!(!ppu.advance(FRAME_CYCLES - 1, &mut mmu));
        assert!(ppu.advance(1, &mut mmu));
    }

    #[test]
    fn test_small_steps_frame_length() {
        let (mut ppu, mut mmu) = setup();
        let mut total = 0u32;
        let mut frames = Vec::new();
        while frames.len() < 3 {
            total += 4;
            if ppu.advance(4, &mut mmu) {
                frames.push(total);
            }
        }
        assert_eq!(frames[1] - frames[0], FRAME_CYCLES);
        assert_eq!(frames[2] - frames[1], FRAME_CYCLES);
    }

    #[test]
    fn test_mode_sequence_within_line() {
        let (mut ppu, mut mmu) = setup();
        assert_eq!(ppu.mode(), LcdMode::OamSearch);
        ppu.advance(79, &mut mmu);
        assert_eq!(ppu.mode(), LcdMode::OamSearch);
        ppu.advance(1, &mut mmu);
        assert_eq!(ppu.mode(), LcdMode::PixelTransfer);
        assert_eq!(mmu.read_byte(STAT) & 0x03, 3);
        ppu.advance(172, &mut mmu);
        assert_eq!(ppu.mode(), LcdMode::HBlank);
        ppu.advance(204, &mut mmu);
        assert_eq!(ppu.mode(), LcdMode::OamSearch);
        assert_eq!(mmu.read_byte(LY), 1);
    }

    #[test]
    fn test_vblank_interrupt_and_wrap() {
        let (mut ppu, mut mmu) = setup();
        ppu.advance(144 * SCANLINE_CYCLES, &mut mmu);
        assert_eq!(mmu.interrupt_flags() & Interrupt::VBlank.mask(), Interrupt::VBlank.mask());
        ppu.advance(9 * SCANLINE_CYCLES, &mut mmu);
        assert_eq!(mmu.read_byte(LY), 153);
        assert_eq!(ppu.mode(), LcdMode::VBlank);
        ppu.advance(SCANLINE_CYCLES, &mut mmu);
        assert_eq!(mmu.read_byte(LY), 0);
        assert_eq!(ppu.mode(), LcdMode::OamSearch);
    }

    #[test]
    fn test_lcd_off_holds_reset_state() {
        let (mut ppu, mut mmu) = setup();
        ppu.advance(10 * SCANLINE_CYCLES + 100, &mut mmu);
        mmu.write_byte(LCDC, 0x11);
        assert!(!ppu.advance(FRAME_CYCLES * 2, &mut mmu));
        assert_eq!(mmu.read_byte(LY), 0);
        assert_eq!(ppu.mode(), LcdMode::OamSearch);
        // 重新開啟後從第 0 行開始計時
        mmu.write_byte(LCDC, 0x91);
        ppu.advance(SCANLINE_CYCLES, &mut mmu);
        assert_eq!(mmu.read_byte(LY), 1);
    }

    #[test]
    fn test_lyc_stat_interrupt() {
        let (mut ppu, mut mmu) = setup();
        mmu.write_byte(LYC, 2);
        mmu.write_byte(STAT, 0x40);
        ppu.advance(SCANLINE_CYCLES, &mut mmu);
        assert_eq!(mmu.interrupt_flags() & Interrupt::LcdStat.mask(), 0);
        ppu.advance(SCANLINE_CYCLES, &mut mmu);
        assert_eq!(mmu.read_byte(STAT) & 0x04, 0x04);
        assert_eq!(mmu.interrupt_flags() & Interrupt::LcdStat.mask(), Interrupt::LcdStat.mask());
    }

    #[test]
    fn test_hblank_stat_interrupt() {
        let (mut ppu, mut mmu) = setup();
        mmu.write_byte(STAT, 0x08);
        ppu.advance(OAM_SEARCH_CYCLES, &mut mmu);
        assert_eq!(mmu.interrupt_flags() & Interrupt::LcdStat.mask(), 0);
        ppu.advance(PIXEL_TRANSFER_CYCLES, &mut mmu);
        assert_eq!(ppu.mode(), LcdMode::HBlank);
        assert_eq!(mmu.interrupt_flags(), Interrupt::LcdStat.mask());
    }

    #[test]
    fn test_vblank_stat_interrupt() {
        let (mut ppu, mut mmu) = setup();
        mmu.write_byte(STAT, 0x10);
        ppu.advance(144 * SCANLINE_CYCLES - 1, &mut mmu);
        assert_eq!(mmu.interrupt_flags() & Interrupt::LcdStat.mask(), 0);
        ppu.advance(1, &mut mmu);
        assert_eq!(ppu.mode(), LcdMode::VBlank);
        let both = Interrupt::VBlank.mask() | Interrupt::LcdStat.mask();
        assert_eq!(mmu.interrupt_flags(), both);
    }

    #[test]
    fn test_oam_search_stat_interrupt() {
        let (mut ppu, mut mmu) = setup();
        mmu.write_byte(STAT, 0x20);
        ppu.advance(OAM_SEARCH_CYCLES + PIXEL_TRANSFER_CYCLES, &mut mmu);
        assert_eq!(mmu.interrupt_flags() & Interrupt::LcdStat.mask(), 0);
        ppu.advance(HBLANK_CYCLES, &mut mmu);
        assert_eq!(ppu.mode(), LcdMode::OamSearch);
        assert_eq!(ppu.scanline(), 1);
        assert_eq!(mmu.interrupt_flags(), Interrupt::LcdStat.mask());
    }

    #[test]
    fn test_stat_interrupt_only_on_rising_edge() {
        let (mut ppu, mut mmu) = setup();
        // HBlank 與 VBlank 都啟用：第 143 行 HBlank 直接接 VBlank，中斷線一直為高
        mmu.write_byte(STAT, 0x18);
        let line_143_hblank = 143 * SCANLINE_CYCLES + OAM_SEARCH_CYCLES + PIXEL_TRANSFER_CYCLES;
        ppu.advance(line_143_hblank, &mut mmu);
        assert_eq!(ppu.mode(), LcdMode::HBlank);
        assert_ne!(mmu.interrupt_flags() & Interrupt::LcdStat.mask(), 0);
        mmu.write_byte(IF, 0x00);

        assert!(ppu.advance(HBLANK_CYCLES, &mut mmu));
        assert_eq!(mmu.interrupt_flags(), Interrupt::VBlank.mask());

        // VBlank 結束後回到 OAM 搜索，下一次 HBlank 重新觸發
        mmu.write_byte(IF, 0x00);
        ppu.advance(10 * SCANLINE_CYCLES, &mut mmu);
        assert_eq!(ppu.mode(), LcdMode::OamSearch);
        assert_eq!(mmu.interrupt_flags(), 0);
        ppu.advance(OAM_SEARCH_CYCLES + PIXEL_TRANSFER_CYCLES, &mut mmu);
        assert_eq!(mmu.interrupt_flags(), Interrupt::LcdStat.mask());
    }

    #[test]
    fn test_ly_write_during_vblank_restarts_frame() {
        let (mut ppu, mut mmu) = setup();
        ppu.advance(145 * SCANLINE_CYCLES, &mut mmu);
        assert_eq!(mmu.read_byte(LY), 145);
        assert_eq!(ppu.mode(), LcdMode::VBlank);

        mmu.write_byte(LY, 0x99);
        let mut elapsed = 0;
        loop {
            elapsed += 4;
            if ppu.advance(4, &mut mmu) {
                break;
            }
            // 可見掃描線上不會停留在 VBlank
            assert_ne!(ppu.mode(), LcdMode::VBlank, "line {}", ppu.scanline());
            assert_eq!(mmu.read_byte(LY), ppu.scanline());
        }
        // 從第 0 行重新數 144 條掃描線後進入 VBlank
        assert_eq!(elapsed, 144 * SCANLINE_CYCLES);
        assert_eq!(ppu.scanline(), 144);
        // 之後每幀恢復 70224 週期
        assert!(!ppu.advance(FRAME_CYCLES - 1, &mut mmu));
        assert!(ppu.advance(1, &mut mmu));
    }

    #[test]
    fn test_background_line_rendered_at_hblank() {
        let (mut ppu, mut mmu) = setup();
        // 圖塊 0 第 0 行全部是顏色 1
        write_tile_row(&mut mmu, 0, 0, 0xFF, 0x00);
        ppu.advance(OAM_SEARCH_CYCLES + PIXEL_TRANSFER_CYCLES - 1, &mut mmu);
        assert_eq!(ppu.framebuffer()[0][0], 0);
        ppu.advance(1, &mut mmu);
        assert!(ppu.framebuffer()[0].iter().all(|&shade| shade == 1));
    }

    #[test]
    fn test_scroll_and_signed_addressing() {
        let (mut ppu, mut mmu) = setup();
        mmu.write_byte(LCDC, 0x81); // 0x8800 定址
        // 圖塊 0 在 0x9000
        mmu.write_byte(0x9000, 0x0F);
        mmu.write_byte(0x9001, 0x0F);
        mmu.write_byte(SCX, 4);
        ppu.advance(OAM_SEARCH_CYCLES + PIXEL_TRANSFER_CYCLES, &mut mmu);
        assert_eq!(ppu.framebuffer()[0][0], 3);
        assert_eq!(ppu.framebuffer()[0][4], 0);
    }

    #[test]
    fn test_background_disabled_renders_zero() {
        let (mut ppu, mut mmu) = setup();
        write_tile_row(&mut mmu, 0, 0, 0xFF, 0xFF);
        mmu.write_byte(LCDC, 0x90);
        ppu.advance(SCANLINE_CYCLES, &mut mmu);
        assert!(ppu.framebuffer()[0].iter().all(|&shade| shade == 0));
    }

    #[test]
    fn test_sprite_transparency_and_oam_order() {
        let (mut ppu, mut mmu) = setup();
        mmu.write_byte(LCDC, 0x93);
        // 圖塊 1：最左像素顏色 1；圖塊 2：最左像素顏色 3
        write_tile_row(&mut mmu, 1, 0, 0x80, 0x00);
        write_tile_row(&mut mmu, 2, 0, 0x80, 0x80);
        write_sprite(&mut mmu, 0, 16, 12, 1, 0x00);
        write_sprite(&mut mmu, 1, 16, 12, 2, 0x00);
        ppu.advance(SCANLINE_CYCLES, &mut mmu);
        // 同樣 X 時 OAM 較前者優先
        assert_eq!(ppu.framebuffer()[0][4], 1);
        // 顏色 0 透明，露出背景
        assert_eq!(ppu.framebuffer()[0][5], 0);
    }

    #[test]
    fn test_sprite_behind_background() {
        let (mut ppu, mut mmu) = setup();
        mmu.write_byte(LCDC, 0x93);
        write_tile_row(&mut mmu, 0, 0, 0x0F, 0x00); // 背景右半邊顏色 1
        write_tile_row(&mut mmu, 1, 0, 0xFF, 0xFF);
        write_sprite(&mut mmu, 0, 16, 8, 1, 0x80);
        ppu.advance(SCANLINE_CYCLES, &mut mmu);
        // 背景顏色 0 的地方精靈可見
        assert_eq!(ppu.framebuffer()[0][0], 3);
        // 背景顏色非 0 時背景優先
        assert_eq!(ppu.framebuffer()[0][4], 1);
    }

    #[test]
    fn test_sprite_flip_and_tall_mode() {
        let (mut ppu, mut mmu) = setup();
        mmu.write_byte(LCDC, 0x97); // 8x16
        write_tile_row(&mut mmu, 3, 7, 0x01, 0x00); // 下半部圖塊最後一行，最右像素
        // 垂直翻轉：第 0 行對應精靈第 15 行；水平翻轉：最右像素出現在最左
        write_sprite(&mut mmu, 0, 16, 8, 2, 0x60);
        ppu.advance(SCANLINE_CYCLES, &mut mmu);
        assert_eq!(ppu.framebuffer()[0][0], 1);
        assert_eq!(ppu.framebuffer()[0][7], 0);
    }

    #[test]
    fn test_sprite_limit_per_line() {
        let mut mmu = test_mmu();
        mmu.write_byte(OBP0, 0xE4);
        mmu.write_byte(LCDC, 0x93);
        write_tile_row(&mut mmu, 1, 0, 0xFF, 0xFF);
        for i in 0..12u16 {
            write_sprite(&mut mmu, i, 16, 8 + (i as u8) * 8, 1, 0x00);
        }
        let mut limited = Ppu::new(10);
        limited.advance(SCANLINE_CYCLES, &mut mmu);
        assert_eq!(limited.framebuffer()[0][9 * 8], 3);
        assert_eq!(limited.framebuffer()[0][10 * 8], 0);

        mmu.write_byte(LY, 0);
        let mut unlimited = Ppu::new(40);
        unlimited.advance(SCANLINE_CYCLES, &mut mmu);
        assert_eq!(unlimited.framebuffer()[0][11 * 8], 3);
    }

    #[test]
    fn test_window_uses_own_line_counter() {
        let (mut ppu, mut mmu) = setup();
        // 視窗地圖 0x9C00 使用圖塊 1，背景使用圖塊 0 (空白)
        for i in 0..32 * 32 {
            mmu.write_byte(0x9C00 + i, 1);
        }
        write_tile_row(&mut mmu, 1, 0, 0xFF, 0xFF);
        mmu.write_byte(WY, 3);
        mmu.write_byte(WX, 7 + 80);
        mmu.write_byte(LCDC, 0xF1);
        ppu.advance(3 * SCANLINE_CYCLES, &mut mmu);
        assert_eq!(ppu.framebuffer()[2][100], 0);
        ppu.advance(SCANLINE_CYCLES, &mut mmu);
        // 第 3 行是視窗的第 0 行
        assert_eq!(ppu.framebuffer()[3][79], 0);
        assert_eq!(ppu.framebuffer()[3][80], 3);
        ppu.advance(SCANLINE_CYCLES, &mut mmu);
        assert_eq!(ppu.framebuffer()[4][80], 0);
    }

    #[test]
    fn test_shade_to_rgb() {
        assert_eq!(shade_to_rgb(0), [0xFF; 3]);
        assert_eq!(shade_to_rgb(2), [0x55; 3]);
    }
}
