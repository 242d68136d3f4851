//! Common types and data structures used across the CamDeck application
//!
//! This module contains the identifiers, input gestures, user commands and
//! request action tags shared by the button, request and sequencer layers.

/// Index of a button inside the registry (and the board's button table)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct ButtonId(pub u8);

impl ButtonId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of one outbound HTTP exchange. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct RequestId(pub u32);

/// How a release was classified against the long-press threshold
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum PressKind {
    Short,
    Long,
}

/// A button gesture a binding can react to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Gesture {
    /// Debounced press edge
    Press,
    /// Release of a hold shorter than the long-press threshold
    ShortRelease,
    /// Hold reaching the long-press threshold (reported once per hold)
    LongPress,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub const fn sign(self) -> i32 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }
}

/// User-level commands produced by button bindings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Command {
    GainStep(Direction),
    ToggleNativeGain,
    WhiteBalanceStep(Direction),
    CycleWhiteBalancePreset,
    AutoWhiteBalance,
    ToggleRecord,
    AutoFocus,
    /// Step whichever parameter the cursor points at
    AdjustSelected(Direction),
    MoveCursor(Direction),
}

/// Action tag carried by every outbound request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Action {
    SetGain,
    GetGain,
    SetWhiteBalance,
    GetWhiteBalance,
    AutoWhiteBalance,
    SetRecord,
    GetRecord,
    DoFocus,
}

impl Action {
    /// True for the write half of a confirm-read chain
    pub const fn is_write(self) -> bool {
        matches!(
            self,
            Action::SetGain | Action::SetWhiteBalance | Action::AutoWhiteBalance | Action::SetRecord
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            Action::SetGain => "SET_GAIN",
            Action::GetGain => "GET_GAIN",
            Action::SetWhiteBalance => "SET_WB",
            Action::GetWhiteBalance => "GET_WB",
            Action::AutoWhiteBalance => "AUTO_WB",
            Action::SetRecord => "SET_RECORD",
            Action::GetRecord => "GET_RECORD",
            Action::DoFocus => "DO_FOCUS",
        }
    }
}

/// Application version information
pub struct AppVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl AppVersion {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self { major, minor, patch }
    }
}

/// Current application version
pub const APP_VERSION: AppVersion = AppVersion::new(0, 1, 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_version_matches_manifest() {
        let mut parts = env!("CARGO_PKG_VERSION")
            .split('.')
            .map(|p| p.parse::<u8>().unwrap());
        assert_eq!(parts.next(), Some(APP_VERSION.major));
        assert_eq!(parts.next(), Some(APP_VERSION.minor));
        assert_eq!(parts.next(), Some(APP_VERSION.patch));
    }

    #[test]
    fn direction_sign() {
        assert_eq!(Direction::Up.sign(), 1);
        assert_eq!(Direction::Down.sign(), -1);
    }
}
