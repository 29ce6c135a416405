// 中斷控制 - IF/IE 暫存器存在 MMU 中，IME 與 EI 延遲由這裡管理

use crate::cpu::Cpu;
use crate::mmu::Mmu;

/// 中斷服務固定消耗的週期
pub const INTERRUPT_SERVICE_CYCLES: u32 = 20;

/// 五個中斷來源，位元 0 優先權最高
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank = 0,
    LcdStat = 1,
    Timer = 2,
    Serial = 3,
    Joypad = 4,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    pub fn mask(self) -> u8 {
        1 << self as u8
    }

    pub fn vector(self) -> u16 {
        0x40 + 8 * self as u16
    }

    /// 找到最高優先級 (最低位元) 的中斷
    pub fn highest(pending: u8) -> Option<Interrupt> {
        Interrupt::ALL.into_iter().find(|irq| pending & irq.mask() != 0)
    }
}

/// 中斷主啟用狀態 (IME) 與 EI 的延遲閂鎖
#[derive(Debug, Default)]
pub struct InterruptLines {
    master: bool,
    // EI 後剩餘幾個指令完成才啟用 IME (EI 本身算一個)
    enable_delay: u8,
}

impl InterruptLines {
    pub fn new() -> Self {
        InterruptLines::default()
    }

    pub fn master_enabled(&self) -> bool {
        self.master
    }

    pub fn enable_pending(&self) -> bool {
        self.enable_delay > 0
    }

    /// EI：排程在下一個指令完成後啟用
    pub fn schedule_enable(&mut self) {
        if !self.master {
            self.enable_delay = 2;
        }
    }

    /// DI：立即關閉，並取消尚未生效的 EI
    pub fn disable(&mut self) {
        self.master = false;
        self.enable_delay = 0;
    }

    /// RETI：立即啟用
    pub fn enable_now(&mut self) {
        self.master = true;
        self.enable_delay = 0;
    }

    /// 每個指令完成後由 CPU 呼叫
    pub fn instruction_completed(&mut self) {
        if self.enable_delay > 0 {
            self.enable_delay -= 1;
            if self.enable_delay == 0 {
                self.master = true;
            }
        }
    }

    /// IF & IE 中有效的待處理中斷
    pub fn pending(&self, mmu: &Mmu) -> u8 {
        mmu.interrupt_flags() & mmu.interrupt_enable() & 0x1F
    }

    /// 若有已啟用的中斷待處理則服務它，返回消耗的週期
    ///
    /// 任何待處理的中斷都會喚醒 HALT 中的 CPU，即使 IME 關閉。
    pub fn service_if_pending(&mut self, cpu: &mut Cpu, mmu: &mut Mmu) -> Option<u32> {
        let pending = self.pending(mmu);
        if pending == 0 {
            return None;
        }
        cpu.wake();

        if !self.master {
            return None;
        }
        let irq = Interrupt::highest(pending)?;

        // 清除對應的中斷標誌
        mmu.clear_interrupt(irq);
        self.master = false;
        self.enable_delay = 0;

        // 推入當前 PC 到堆疊並跳轉
        let return_addr = cpu.regs.pc;
        cpu.push_word(mmu, return_addr);
        cpu.regs.pc = irq.vector();
        log::trace!("servicing {:?} interrupt, return to {:04X}", irq, return_addr);

        Some(INTERRUPT_SERVICE_CYCLES)
    }
}
