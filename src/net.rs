//! TCP transport over embassy-net
//!
//! A fixed pool of socket workers, twice the engine's request slots. The
//! control loop owns a [`NetTransport`] that hands requests to free workers;
//! each worker connects to the camera, streams the response back as
//! [`SocketEvent`]s and always finishes with exactly one `Closed` or `Failed`
//! event, which frees its slot again.

use embassy_futures::select::{select, Either};
use embassy_net::tcp::TcpSocket;
use embassy_net::{Config, Ipv4Address, Ipv4Cidr, Stack, StaticConfigV4};
use embassy_time::{Duration, Timer};
use heapless::Vec;

use crate::channels::{SOCKET_COMMANDS, SOCKET_EVENTS};
use crate::config::*;
use crate::http::{RequestBytes, SocketChunk, SocketEvent, SocketSlots, Transport, TransportError};
use crate::types::RequestId;
use crate::usb::NcmDevice;

/// Control loop to socket worker
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum SocketCommand {
    Open(RequestId),
    Send(RequestId, RequestBytes),
    Close(RequestId),
}

/// Static addressing on the point-to-point USB link
pub fn net_config() -> Config {
    let [a, b, c, d] = OWN_IP;
    Config::ipv4_static(StaticConfigV4 {
        address: Ipv4Cidr::new(Ipv4Address::new(a, b, c, d), OWN_PREFIX_LEN),
        gateway: None,
        dns_servers: Vec::new(),
    })
}

fn camera_address() -> Ipv4Address {
    let [a, b, c, d] = CAMERA_IP;
    Ipv4Address::new(a, b, c, d)
}

// ===================================================================
// Transport handle (control loop side)
// ===================================================================

/// Control loop handle on the worker pool
#[derive(Default)]
pub struct NetTransport {
    slots: SocketSlots,
}

impl NetTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for NetTransport {
    fn connect(&mut self, id: RequestId) -> Result<(), TransportError> {
        let slot = self.slots.vacant().map_err(|e| {
            warn!("#{} no free socket worker ({} busy)", id.0, self.slots.busy());
            e
        })?;
        SOCKET_COMMANDS[slot]
            .try_send(SocketCommand::Open(id))
            .map_err(|_| TransportError::Unavailable)?;
        self.slots.assign(slot, id);
        Ok(())
    }

    fn send(&mut self, id: RequestId, data: &[u8]) -> Result<(), TransportError> {
        let slot = self.slots.slot_of(id).ok_or(TransportError::UnknownRequest)?;
        let bytes = RequestBytes::from_slice(data).map_err(|_| TransportError::TooLarge)?;
        SOCKET_COMMANDS[slot]
            .try_send(SocketCommand::Send(id, bytes))
            .map_err(|_| TransportError::Unavailable)
    }

    fn close(&mut self, id: RequestId) {
        // The slot stays taken until the worker reports the socket gone
        if let Some(slot) = self.slots.slot_of(id) {
            if SOCKET_COMMANDS[slot]
                .try_send(SocketCommand::Close(id))
                .is_err()
            {
                warn!("#{} close not queued on slot {}", id.0, slot);
            }
        }
    }

    fn poll_event(&mut self) -> Option<SocketEvent> {
        let event = SOCKET_EVENTS.try_receive().ok()?;
        self.slots.release(&event);
        Some(event)
    }
}

// ===================================================================
// Tasks
// ===================================================================

#[embassy_executor::task]
pub async fn net_task(mut runner: embassy_net::Runner<'static, NcmDevice>) -> ! {
    runner.run().await
}

#[embassy_executor::task(pool_size = SOCKET_WORKERS)]
pub async fn socket_worker(stack: Stack<'static>, slot: usize) {
    let mut rx_buf = [0u8; SOCKET_RX_BUFFER];
    let mut tx_buf = [0u8; SOCKET_TX_BUFFER];
    let commands = &SOCKET_COMMANDS[slot];

    info!("Socket worker {} started", slot);

    loop {
        let id = match commands.receive().await {
            SocketCommand::Open(id) => id,
            // leftovers for a request that already ended
            other => {
                trace!("Worker {} idle, dropping {}", slot, other);
                continue;
            }
        };

        let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
        socket.set_timeout(Some(Duration::from_millis(REQUEST_TIMEOUT_MS)));

        debug!("#{} connecting on slot {}", id.0, slot);
        if let Err(e) = socket.connect((camera_address(), CAMERA_PORT)).await {
            warn!("#{} connect error: {:?}", id.0, e);
            socket.abort();
            SOCKET_EVENTS.send(SocketEvent::Failed(id)).await;
            continue;
        }
        SOCKET_EVENTS.send(SocketEvent::Connected(id)).await;

        let last = exchange(&mut socket, slot, id).await;
        close_socket(&mut socket).await;
        SOCKET_EVENTS.send(last).await;
    }
}

/// Pump data both ways until the peer closes, the engine asks to close, or
/// the socket errors. Returns the final event for this request.
async fn exchange(socket: &mut TcpSocket<'_>, slot: usize, id: RequestId) -> SocketEvent {
    let commands = &SOCKET_COMMANDS[slot];
    let mut chunk = [0u8; SOCKET_CHUNK_SIZE];

    loop {
        let next = select(socket.read(&mut chunk), commands.receive()).await;
        match next {
            Either::First(Ok(0)) => return SocketEvent::Closed(id),
            Either::First(Ok(n)) => {
                if let Ok(data) = SocketChunk::from_slice(&chunk[..n]) {
                    SOCKET_EVENTS.send(SocketEvent::Data(id, data)).await;
                }
            }
            Either::First(Err(e)) => {
                warn!("#{} read error: {:?}", id.0, e);
                return SocketEvent::Failed(id);
            }
            Either::Second(SocketCommand::Send(target, bytes)) if target == id => {
                if let Err(e) = write_request(socket, &bytes).await {
                    warn!("#{} write error: {:?}", id.0, e);
                    return SocketEvent::Failed(id);
                }
            }
            Either::Second(SocketCommand::Close(target)) if target == id => {
                return SocketEvent::Closed(id);
            }
            Either::Second(other) => {
                trace!("#{} ignoring {}", id.0, other);
            }
        }
    }
}

async fn write_request(
    socket: &mut TcpSocket<'_>,
    bytes: &[u8],
) -> Result<(), embassy_net::tcp::Error> {
    let mut written = 0;
    while written < bytes.len() {
        match socket.write(&bytes[written..]).await? {
            0 => return Err(embassy_net::tcp::Error::ConnectionReset),
            n => written += n,
        }
    }
    socket.flush().await
}

async fn close_socket(socket: &mut TcpSocket<'_>) {
    socket.close();
    Timer::after(Duration::from_millis(20)).await;
    socket.abort();
}
