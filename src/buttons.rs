//! Button debouncing and gesture classification
//!
//! Edge interrupts call [`ButtonRegistry::on_edge`]; the control loop polls
//! each button for gestures. The two sides only share atomics: the edge path
//! writes timestamps and sets pending flags, the poll path drains the flags.

use heapless::Vec;
use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::board::ButtonSpec;
use crate::config::MAX_BUTTONS;
use crate::types::{ButtonId, Gesture, PressKind};

// ===================================================================
// Per-button State
// ===================================================================

const HOLD_IDLE: u8 = 0;
const HOLD_DEBOUNCED_DOWN: u8 = 1;
/// Long press already reported, the release is swallowed
const HOLD_AWAIT_RELEASE: u8 = 2;

const FLAG_PRESSED: u8 = 1 << 0;
const FLAG_RELEASED: u8 = 1 << 1;

/// Classified release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Release {
    pub kind: PressKind,
    pub duration_ms: u32,
}

/// What the edge path did with one raw edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum EdgeOutcome {
    /// Inside the debounce window, discarded
    Bounce,
    /// Level equal to the stable level
    Unchanged,
    Pressed,
    Released(Release),
    /// Release of a hold whose long press was already reported
    ReleaseSuppressed,
}

pub struct ButtonState {
    debounce_ms: u32,
    long_press_ms: u32,
    stable_pressed: AtomicBool,
    hold: AtomicU8,
    last_change_ms: AtomicU32,
    press_start_ms: AtomicU32,
    flags: AtomicU8,
    release_duration_ms: AtomicU32,
    release_long: AtomicBool,
}

impl ButtonState {
    /// A button already held at startup reports nothing until it is released.
    pub fn new(spec: &ButtonSpec, initially_pressed: bool, now_ms: u32) -> Self {
        Self {
            debounce_ms: spec.debounce_ms,
            long_press_ms: spec.long_press_ms,
            stable_pressed: AtomicBool::new(initially_pressed),
            hold: AtomicU8::new(if initially_pressed {
                HOLD_AWAIT_RELEASE
            } else {
                HOLD_IDLE
            }),
            last_change_ms: AtomicU32::new(now_ms),
            press_start_ms: AtomicU32::new(now_ms),
            flags: AtomicU8::new(0),
            release_duration_ms: AtomicU32::new(0),
            release_long: AtomicBool::new(false),
        }
    }

    /// Edge path. `active` is the logical level (true = pressed).
    pub fn on_edge(&self, active: bool, now_ms: u32) -> EdgeOutcome {
        let last = self.last_change_ms.load(Ordering::Acquire);
        if now_ms.wrapping_sub(last) < self.debounce_ms {
            return EdgeOutcome::Bounce;
        }
        if active == self.stable_pressed.load(Ordering::Acquire) {
            return EdgeOutcome::Unchanged;
        }

        self.stable_pressed.store(active, Ordering::Release);
        self.last_change_ms.store(now_ms, Ordering::Release);

        if active {
            self.press_start_ms.store(now_ms, Ordering::Release);
            self.hold.store(HOLD_DEBOUNCED_DOWN, Ordering::Release);
            self.flags.fetch_or(FLAG_PRESSED, Ordering::AcqRel);
            return EdgeOutcome::Pressed;
        }

        // Races with `long_pressed`; exactly one side wins the hold
        let previous = self.hold.swap(HOLD_IDLE, Ordering::AcqRel);
        if previous == HOLD_AWAIT_RELEASE {
            return EdgeOutcome::ReleaseSuppressed;
        }

        let duration_ms = now_ms.wrapping_sub(self.press_start_ms.load(Ordering::Acquire));
        let kind = if duration_ms < self.long_press_ms {
            PressKind::Short
        } else {
            PressKind::Long
        };
        self.release_duration_ms.store(duration_ms, Ordering::Release);
        self.release_long
            .store(kind == PressKind::Long, Ordering::Release);
        self.flags.fetch_or(FLAG_RELEASED, Ordering::AcqRel);

        EdgeOutcome::Released(Release { kind, duration_ms })
    }

    pub fn is_pressed(&self) -> bool {
        self.stable_pressed.load(Ordering::Acquire)
    }

    /// True once per accepted press edge
    pub fn take_pressed(&self) -> bool {
        self.flags.fetch_and(!FLAG_PRESSED, Ordering::AcqRel) & FLAG_PRESSED != 0
    }

    /// Pending release, drained exactly once
    pub fn take_released(&self) -> Option<Release> {
        if self.flags.fetch_and(!FLAG_RELEASED, Ordering::AcqRel) & FLAG_RELEASED == 0 {
            return None;
        }
        let kind = if self.release_long.load(Ordering::Acquire) {
            PressKind::Long
        } else {
            PressKind::Short
        };
        Some(Release {
            kind,
            duration_ms: self.release_duration_ms.load(Ordering::Acquire),
        })
    }

    /// True exactly once per hold, on the first poll past the long-press threshold
    pub fn long_pressed(&self, now_ms: u32) -> bool {
        if self.hold.load(Ordering::Acquire) != HOLD_DEBOUNCED_DOWN {
            return false;
        }
        let held = now_ms.wrapping_sub(self.press_start_ms.load(Ordering::Acquire));
        if held < self.long_press_ms {
            return false;
        }
        self.hold
            .compare_exchange(
                HOLD_DEBOUNCED_DOWN,
                HOLD_AWAIT_RELEASE,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Drain everything pending into gestures, in the order they happened.
    ///
    /// A long release that was never seen by `long_pressed` (the hold ended
    /// between two polls) is turned into a `LongPress`, so every hold past
    /// the threshold yields exactly one long gesture.
    pub fn poll_gestures(&self, now_ms: u32) -> Vec<Gesture, 3> {
        let mut gestures = Vec::new();
        if self.take_pressed() {
            let _ = gestures.push(Gesture::Press);
        }
        if self.long_pressed(now_ms) {
            let _ = gestures.push(Gesture::LongPress);
        }
        if let Some(release) = self.take_released() {
            let gesture = match release.kind {
                PressKind::Short => Gesture::ShortRelease,
                PressKind::Long => Gesture::LongPress,
            };
            let _ = gestures.push(gesture);
        }
        gestures
    }
}

// ===================================================================
// Registry
// ===================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum RegistryError {
    Full,
    DuplicatePin(u8),
}

pub struct RegisteredButton {
    pub spec: ButtonSpec,
    pub state: ButtonState,
}

/// Pin-to-button table owned by the running session.
///
/// Registration happens once at startup through `&mut self`; afterwards the
/// registry is shared by reference between the edge tasks and the control loop.
#[derive(Default)]
pub struct ButtonRegistry {
    buttons: Vec<RegisteredButton, MAX_BUTTONS>,
}

impl ButtonRegistry {
    pub const fn new() -> Self {
        Self {
            buttons: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        spec: ButtonSpec,
        initially_pressed: bool,
        now_ms: u32,
    ) -> Result<ButtonId, RegistryError> {
        if self.buttons.iter().any(|b| b.spec.pin == spec.pin) {
            return Err(RegistryError::DuplicatePin(spec.pin));
        }
        let id = ButtonId(self.buttons.len() as u8);
        let state = ButtonState::new(&spec, initially_pressed, now_ms);
        self.buttons
            .push(RegisteredButton { spec, state })
            .map_err(|_| RegistryError::Full)?;
        debug!("Registered button {} on GPIO{}", spec.name, spec.pin);
        Ok(id)
    }

    /// Route a raw pin level to its button. Unknown pins are ignored.
    pub fn on_edge(&self, pin: u8, level_high: bool, now_ms: u32) -> Option<(ButtonId, EdgeOutcome)> {
        let index = self.buttons.iter().position(|b| b.spec.pin == pin)?;
        let button = &self.buttons[index];
        let outcome = button.state.on_edge(button.spec.is_active(level_high), now_ms);
        Some((ButtonId(index as u8), outcome))
    }

    pub fn get(&self, id: ButtonId) -> Option<&RegisteredButton> {
        self.buttons.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ButtonId, &RegisteredButton)> {
        self.buttons
            .iter()
            .enumerate()
            .map(|(i, b)| (ButtonId(i as u8), b))
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}
