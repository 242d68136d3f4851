//! Inter-task communication channels
//!
//! Socket workers and the control loop talk through these statics; the
//! display task is woken with the latest mirrored state.

use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use crate::config::SOCKET_WORKERS;
use crate::http::SocketEvent;
use crate::net::SocketCommand;
use crate::sequencer::DeviceState;

/// Events from all socket workers to the control loop
/// Buffer size: 16 (several fragments per request before the next drain)
pub static SOCKET_EVENTS: Channel<ThreadModeRawMutex, SocketEvent, 16> = Channel::new();

/// One command queue per socket worker, indexed by slot
/// Buffer size: 2 (a send and a close can be queued back to back)
pub static SOCKET_COMMANDS: [Channel<ThreadModeRawMutex, SocketCommand, 2>; SOCKET_WORKERS] =
    [const { Channel::new() }; SOCKET_WORKERS];

/// Latest state to render; only the newest value matters
pub static DISPLAY_SIGNAL: Signal<ThreadModeRawMutex, DeviceState> = Signal::new();
