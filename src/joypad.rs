// Joypad (按鍵輸入) - 0xFF00 暫存器
//
// 按鍵狀態由外部在每個 step 前以 ButtonState 快照提供。

/// 某一時刻的按鍵快照 (true = 按下)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub a: bool,
    pub b: bool,
    pub select: bool,
    pub start: bool,
    pub right: bool,
    pub left: bool,
    pub up: bool,
    pub down: bool,
}

impl ButtonState {
    // 按下時位元為 0
    fn active_low(bits: [bool; 4]) -> u8 {
        bits.iter()
            .enumerate()
            .fold(0x0F, |acc, (i, &pressed)| if pressed { acc & !(1 << i) } else { acc })
    }

    /// 位元: 0=A, 1=B, 2=Select, 3=Start
    pub fn action_bits(&self) -> u8 {
        Self::active_low([self.a, self.b, self.select, self.start])
    }

    /// 位元: 0=右, 1=左, 2=上, 3=下
    pub fn direction_bits(&self) -> u8 {
        Self::active_low([self.right, self.left, self.up, self.down])
    }
}

#[derive(Debug, Clone)]
pub struct Joypad {
    buttons: ButtonState,
    // 選取位元 (Bit 4: 方向鍵, Bit 5: 功能鍵)，0 表示選取
    select: u8,
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}

impl Joypad {
    pub fn new() -> Self {
        Joypad {
            buttons: ButtonState::default(),
            select: 0x30, // 預設為不選取 (11)
        }
    }

    pub fn buttons(&self) -> ButtonState {
        self.buttons
    }

    pub fn read_register(&self) -> u8 {
        // 高位元(6-7)讀取時為 1
        let upper = 0xC0 | self.select;
        let mut keys = 0x0F;

        if self.select & 0x10 == 0 {
            keys &= self.buttons.direction_bits();
        }
        if self.select & 0x20 == 0 {
            keys &= self.buttons.action_bits();
        }

        upper | keys
    }

    pub fn write_register(&mut self, value: u8) {
        // 只允許寫入位元 4 和 5
        self.select = value & 0x30;
    }

    /// 更新按鍵快照，返回是否應觸發 Joypad 中斷
    ///
    /// 只有在目前選取下可見的位元從 1 變為 0 才算。
    pub fn set_buttons(&mut self, buttons: ButtonState) -> bool {
        let old = self.read_register();
        self.buttons = buttons;
        let new = self.read_register();
        old & !new & 0x0F != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_selected_reads_released() {
        let mut joypad = Joypad::new();
        joypad.set_buttons(ButtonState { a: true, down: true, ..Default::default() });
        assert_eq!(joypad.read_register(), 0xFF);
    }

    #[test]
    fn test_select_directions_and_actions() {
        let mut joypad = Joypad::new();
        joypad.set_buttons(ButtonState { a: true, down: true, ..Default::default() });
        joypad.write_register(0x20); // 選取方向鍵
        assert_eq!(joypad.read_register(), 0xE0 | 0x07);
        joypad.write_register(0x10); // 選取功能鍵
        assert_eq!(joypad.read_register(), 0xD0 | 0x0E);
    }

    #[test]
    fn test_press_requests_interrupt_only_when_visible() {
        let mut joypad = Joypad::new();
        joypad.write_register(0x10); // 只看功能鍵
        assert!(!joypad.set_buttons(ButtonState { up: true, ..Default::default() }));
        assert!(joypad.set_buttons(ButtonState { up: true, start: true, ..Default::default() }));
        // 持續按住不會再次觸發
        assert!(!joypad.set_buttons(ButtonState { up: true, start: true, ..Default::default() }));
        // 放開不觸發
        assert!(!joypad.set_buttons(ButtonState::default()));
    }
}
