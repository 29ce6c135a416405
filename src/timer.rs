// Timer (計時器) - DIV/TIMA/TMA/TAC，暫存器本身存放在 MMU 的 I/O 區

use crate::interrupts::Interrupt;
use crate::mmu::{Mmu, DIV, TAC, TIMA, TMA};

#[derive(Debug, Clone)]
pub struct Timer {
    divider: u16, // 內部分頻器 (高 8 位元即為 0xFF04 的 DIV 寄存器)
    counter: u32, // TIMA 累積的週期
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Timer {
            divider: 0xAB00, // 開機後 DIV 不為 0
            counter: 0,
        }
    }

    /// 上電時分頻器從 0 開始
    pub fn power_on() -> Self {
        Timer {
            divider: 0,
            counter: 0,
        }
    }

    pub fn divider(&self) -> u16 {
        self.divider
    }

    /// TAC 低兩位選擇的 TIMA 週期 (T-cycles)
    pub fn period(tac: u8) -> u32 {
        match tac & 0x03 {
            0 => 1024, // 4096 Hz
            1 => 16,   // 262144 Hz
            2 => 64,   // 65536 Hz
            _ => 256,  // 16384 Hz
        }
    }

    /// 推進經過的週期，TIMA 溢出時重載 TMA 並請求 Timer 中斷
    pub fn advance(&mut self, cycles: u32, mmu: &mut Mmu) {
        // 寫入 DIV 會把內部分頻器整個歸零
        if mmu.take_div_reset() {
            self.divider = 0;
            self.counter = 0;
        }

        self.divider = self.divider.wrapping_add(cycles as u16);
        mmu.set_io_register(DIV, (self.divider >> 8) as u8);

        let tac = mmu.io_register(TAC);
        if tac & 0x04 == 0 {
            return;
        }

        let period = Self::period(tac);
        self.counter += cycles;
        while self.counter >= period {
            self.counter -= period;
            let (tima, overflow) = mmu.io_register(TIMA).overflowing_add(1);
            if overflow {
                let tma = mmu.io_register(TMA);
                mmu.set_io_register(TIMA, tma);
                mmu.request_interrupt(Interrupt::Timer);
            } else {
                mmu.set_io_register(TIMA, tima);
            }
        }
    }
}
