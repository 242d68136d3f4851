//! Socket seam between the request engine and the network stack
//!
//! The engine only asks for a connection per request id, a single write, and
//! a close. Everything the stack has to report comes back as [`SocketEvent`]s
//! drained once per control-loop iteration.

use heapless::Vec;

use crate::config::{SOCKET_CHUNK_SIZE, SOCKET_WORKERS};
use crate::types::RequestId;

pub type SocketChunk = Vec<u8, SOCKET_CHUNK_SIZE>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum TransportError {
    /// No free socket
    Exhausted,
    /// Request id is not bound to a socket
    UnknownRequest,
    /// Outgoing data does not fit
    TooLarge,
    /// The socket worker could not take the command
    Unavailable,
}

/// Callback-style notifications from the stack
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum SocketEvent {
    Connected(RequestId),
    Data(RequestId, SocketChunk),
    /// Orderly close by the peer
    Closed(RequestId),
    /// Connect, write or read error; the socket is gone
    Failed(RequestId),
}

impl SocketEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            SocketEvent::Connected(id)
            | SocketEvent::Data(id, _)
            | SocketEvent::Closed(id)
            | SocketEvent::Failed(id) => *id,
        }
    }
}

/// Reliable, fragmenting byte-stream sockets to the camera
pub trait Transport {
    /// Open a connection for `id`. Non-blocking; `Connected` or `Failed` follows.
    fn connect(&mut self, id: RequestId) -> Result<(), TransportError>;

    /// Queue the whole request for sending
    fn send(&mut self, id: RequestId, data: &[u8]) -> Result<(), TransportError>;

    /// Close the connection. Events already queued for `id` may still arrive.
    fn close(&mut self, id: RequestId);

    fn poll_event(&mut self) -> Option<SocketEvent>;
}

/// Which request each socket worker is serving.
///
/// A slot is taken on connect and only given back when the stack reports the
/// socket gone (`Closed` or `Failed`), not when the engine calls `close`.
#[derive(Debug, Default)]
pub struct SocketSlots {
    slots: [Option<RequestId>; SOCKET_WORKERS],
}

impl SocketSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// First free worker
    pub fn vacant(&self) -> Result<usize, TransportError> {
        self.slots
            .iter()
            .position(Option::is_none)
            .ok_or(TransportError::Exhausted)
    }

    pub fn assign(&mut self, slot: usize, id: RequestId) {
        self.slots[slot] = Some(id);
    }

    pub fn slot_of(&self, id: RequestId) -> Option<usize> {
        self.slots.iter().position(|s| *s == Some(id))
    }

    /// Give back the slot of a socket that just went away
    pub fn release(&mut self, event: &SocketEvent) {
        if let SocketEvent::Closed(_) | SocketEvent::Failed(_) = event {
            if let Some(slot) = self.slot_of(event.request_id()) {
                self.slots[slot] = None;
            }
        }
    }

    pub fn busy(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_IN_FLIGHT;

    fn fill(slots: &mut SocketSlots, count: u32) {
        for n in 0..count {
            let slot = slots.vacant().unwrap();
            slots.assign(slot, RequestId(n));
        }
    }

    #[test]
    fn slot_is_held_until_socket_reports_gone() {
        let mut slots = SocketSlots::new();
        fill(&mut slots, 2);

        slots.release(&SocketEvent::Connected(RequestId(0)));
        slots.release(&SocketEvent::Data(RequestId(0), SocketChunk::new()));
        assert_eq!(slots.busy(), 2);

        slots.release(&SocketEvent::Closed(RequestId(0)));
        assert_eq!(slots.slot_of(RequestId(0)), None);
        slots.release(&SocketEvent::Failed(RequestId(1)));
        assert_eq!(slots.busy(), 0);
    }

    #[test]
    fn confirm_read_finds_a_worker_while_every_request_socket_closes() {
        let mut slots = SocketSlots::new();
        // every admitted request still owns a closing socket
        fill(&mut slots, MAX_IN_FLIGHT as u32);

        // the engine can admit up to MAX_IN_FLIGHT - 1 follow-up reads
        for n in 0..(MAX_IN_FLIGHT - 1) as u32 {
            let slot = slots.vacant().unwrap();
            slots.assign(slot, RequestId(100 + n));
        }
        assert_eq!(slots.busy(), 2 * MAX_IN_FLIGHT - 1);
        assert!(slots.vacant().is_ok());
    }

    #[test]
    fn exhausted_when_all_workers_taken() {
        let mut slots = SocketSlots::new();
        fill(&mut slots, SOCKET_WORKERS as u32);
        assert_eq!(slots.vacant(), Err(TransportError::Exhausted));
        assert_eq!(slots.slot_of(RequestId(3)), Some(3));
    }
}
