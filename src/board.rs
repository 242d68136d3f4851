//! Board abstraction for CamDeck hardware variants
//!
//! Each board fixes its button wiring, the gesture-to-command bindings and
//! whether a status display is fitted. Binaries select one at compile time.

use crate::config::*;
use crate::types::{ButtonId, Command, Direction, Gesture};

/// Wiring and timing of one physical button
#[derive(Debug, Clone, Copy)]
pub struct ButtonSpec {
    pub name: &'static str,
    /// GPIO number
    pub pin: u8,
    /// True if the button pulls the pin low when pressed
    pub active_low: bool,
    pub debounce_ms: u32,
    pub long_press_ms: u32,
}

impl ButtonSpec {
    /// Translate a raw pin level into "pressed"
    pub const fn is_active(&self, level_high: bool) -> bool {
        level_high != self.active_low
    }
}

/// One gesture on one button mapped to a command
#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub button: ButtonId,
    pub gesture: Gesture,
    pub command: Command,
}

impl Binding {
    const fn new(button: u8, gesture: Gesture, command: Command) -> Self {
        Self {
            button: ButtonId(button),
            gesture,
            command,
        }
    }
}

/// Board configuration trait
pub trait BoardConfig {
    /// Get board name for identification
    fn board_name(&self) -> &'static str;

    /// Buttons in registry order; `ButtonId(i)` refers to entry `i`
    fn buttons(&self) -> &'static [ButtonSpec];

    /// Gesture bindings
    fn bindings(&self) -> &'static [Binding];

    /// Pins driven low to act as button grounds
    fn ground_pins(&self) -> &'static [u8] {
        &[]
    }

    /// Whether the status LCD is fitted
    fn has_display(&self) -> bool;

    /// Commands bound to `gesture` on `button`
    fn commands_for(
        &self,
        button: ButtonId,
        gesture: Gesture,
    ) -> impl Iterator<Item = Command> + '_ {
        self.bindings()
            .iter()
            .filter(move |b| b.button == button && b.gesture == gesture)
            .map(|b| b.command)
    }
}

/// Supported boards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Board {
    /// Two keys plus 240x135 LCD; keys adjust the selected parameter
    TwoButton,
    /// RECORD / FOCUS / AUX keys, no display
    ThreeButton,
}

const TWO_BUTTON_BUTTONS: [ButtonSpec; 2] = [
    ButtonSpec {
        name: "A",
        pin: TWO_BUTTON_KEY_A_PIN,
        active_low: true,
        debounce_ms: TWO_BUTTON_DEBOUNCE_MS,
        long_press_ms: TWO_BUTTON_LONG_PRESS_MS,
    },
    ButtonSpec {
        name: "B",
        pin: TWO_BUTTON_KEY_B_PIN,
        active_low: true,
        debounce_ms: TWO_BUTTON_DEBOUNCE_MS,
        long_press_ms: TWO_BUTTON_LONG_PRESS_MS,
    },
];

const TWO_BUTTON_BINDINGS: [Binding; 4] = [
    Binding::new(0, Gesture::ShortRelease, Command::AdjustSelected(Direction::Down)),
    Binding::new(1, Gesture::ShortRelease, Command::AdjustSelected(Direction::Up)),
    Binding::new(0, Gesture::LongPress, Command::MoveCursor(Direction::Up)),
    Binding::new(1, Gesture::LongPress, Command::MoveCursor(Direction::Down)),
];

const THREE_BUTTON_BUTTONS: [ButtonSpec; 3] = [
    ButtonSpec {
        name: "RECORD",
        pin: THREE_BUTTON_RECORD_PIN,
        active_low: true,
        debounce_ms: THREE_BUTTON_DEBOUNCE_MS,
        long_press_ms: THREE_BUTTON_LONG_PRESS_MS,
    },
    ButtonSpec {
        name: "FOCUS",
        pin: THREE_BUTTON_FOCUS_PIN,
        active_low: true,
        debounce_ms: THREE_BUTTON_DEBOUNCE_MS,
        long_press_ms: THREE_BUTTON_LONG_PRESS_MS,
    },
    ButtonSpec {
        name: "AUX",
        pin: THREE_BUTTON_AUX_PIN,
        active_low: true,
        debounce_ms: THREE_BUTTON_DEBOUNCE_MS,
        long_press_ms: THREE_BUTTON_LONG_PRESS_MS,
    },
];

const THREE_BUTTON_BINDINGS: [Binding; 5] = [
    Binding::new(0, Gesture::ShortRelease, Command::ToggleRecord),
    Binding::new(1, Gesture::ShortRelease, Command::AutoFocus),
    Binding::new(1, Gesture::LongPress, Command::ToggleNativeGain),
    Binding::new(2, Gesture::ShortRelease, Command::CycleWhiteBalancePreset),
    Binding::new(2, Gesture::LongPress, Command::AutoWhiteBalance),
];

impl BoardConfig for Board {
    fn board_name(&self) -> &'static str {
        match self {
            Board::TwoButton => "CamDeck Two-Button (LCD)",
            Board::ThreeButton => "CamDeck Three-Button",
        }
    }

    fn buttons(&self) -> &'static [ButtonSpec] {
        match self {
            Board::TwoButton => &TWO_BUTTON_BUTTONS,
            Board::ThreeButton => &THREE_BUTTON_BUTTONS,
        }
    }

    fn bindings(&self) -> &'static [Binding] {
        match self {
            Board::TwoButton => &TWO_BUTTON_BINDINGS,
            Board::ThreeButton => &THREE_BUTTON_BINDINGS,
        }
    }

    fn ground_pins(&self) -> &'static [u8] {
        match self {
            Board::TwoButton => &[],
            Board::ThreeButton => &THREE_BUTTON_GROUND_PINS,
        }
    }

    fn has_display(&self) -> bool {
        matches!(self, Board::TwoButton)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOARDS: [Board; 2] = [Board::TwoButton, Board::ThreeButton];

    #[test]
    fn bindings_reference_existing_buttons() {
        for board in BOARDS {
            let count = board.buttons().len();
            assert!(count <= MAX_BUTTONS);
            for binding in board.bindings() {
                assert!(binding.button.index() < count, "{:?}", board);
            }
        }
    }

    #[test]
    fn button_pins_do_not_collide() {
        for board in BOARDS {
            let buttons = board.buttons();
            for (i, a) in buttons.iter().enumerate() {
                for b in &buttons[i + 1..] {
                    assert_ne!(a.pin, b.pin);
                }
                assert!(!board.ground_pins().contains(&a.pin));
            }
        }
    }

    #[test]
    fn active_low_inverts_level() {
        let spec = TWO_BUTTON_BUTTONS[0];
        assert!(spec.is_active(false));
        assert!(!spec.is_active(true));
    }

    #[test]
    fn focus_long_press_toggles_native_gain() {
        let commands: heapless::Vec<Command, 4> = Board::ThreeButton
            .commands_for(ButtonId(1), Gesture::LongPress)
            .collect();
        assert_eq!(commands.as_slice(), &[Command::ToggleNativeGain]);
        assert_eq!(
            Board::ThreeButton
                .commands_for(ButtonId(0), Gesture::LongPress)
                .count(),
            0
        );
    }
}
