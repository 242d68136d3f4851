//! CamDeck - RP2040 button panel for network-controlled cameras
//!
//! Physical buttons drive the camera's JSON-over-HTTP control API (gain,
//! white balance, record, focus) over a USB CDC-NCM network link, and the
//! panel mirrors the state the camera confirms.
//!
//! ## Supported Boards
//! - Two-Button (two keys, 240x135 ST7789 status LCD)
//! - Three-Button (RECORD / FOCUS / AUX keys, no display)
//!
//! ## Architecture
//! - **Debounce**: edge interrupts classified into press / short release / long press
//! - **Request engine**: non-blocking HTTP exchanges over an abstract socket transport
//! - **Sequencer**: write-then-confirm chains keeping a mirrored device state
//! - **Embassy tasks**: USB networking, socket workers, display and status LED
//!
//! Everything outside the `target_os = "none"` modules is hardware independent
//! and tested on the host.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod board;
pub mod buttons;
pub mod config;
pub mod controller;
pub mod http;
pub mod sequencer;
pub mod types;
pub mod view;

#[cfg(target_os = "none")]
pub mod channels;
#[cfg(target_os = "none")]
pub mod display;
#[cfg(target_os = "none")]
pub mod hardware;
#[cfg(target_os = "none")]
pub mod net;
#[cfg(target_os = "none")]
pub mod supervisor;
#[cfg(target_os = "none")]
pub mod usb;

#[cfg(target_os = "none")]
use embassy_rp::usb::InterruptHandler;
#[cfg(target_os = "none")]
use embassy_rp::{bind_interrupts, peripherals};

// USB interrupt binding - shared by all binaries
#[cfg(target_os = "none")]
bind_interrupts!(pub struct Irqs {
    USBCTRL_IRQ => InterruptHandler<peripherals::USB>;
});
