//! Non-blocking HTTP request engine
//!
//! Each request is bound to one socket. Socket events move it through
//! `Connecting -> Sending -> Receiving -> Complete`; completed requests are
//! handed out in the order they completed.

use heapless::{Deque, Vec};

use super::request::{CompletionReason, FormatError, HttpRequest, RequestBytes, Stage};
use super::transport::{SocketEvent, Transport};
use crate::config::{MAX_IN_FLIGHT, REQUEST_TIMEOUT_MS};
use crate::types::{Action, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum EngineError {
    /// Every request slot is active or waiting to be consumed
    Busy,
    /// Request did not fit the request buffer
    Format,
}

impl From<FormatError> for EngineError {
    fn from(_: FormatError) -> Self {
        EngineError::Format
    }
}

/// Anything that can accept a formatted request
pub trait RequestSink {
    fn submit(
        &mut self,
        action: Action,
        request: RequestBytes,
        now_ms: u64,
    ) -> Result<RequestId, EngineError>;
}

pub struct RequestEngine<T: Transport> {
    transport: T,
    active: Vec<HttpRequest, MAX_IN_FLIGHT>,
    /// Ids in the order their requests completed, not yet moved
    finished: Deque<RequestId, MAX_IN_FLIGHT>,
    completed: Deque<HttpRequest, MAX_IN_FLIGHT>,
    next_id: u32,
    timeout_ms: u64,
}

impl<T: Transport> RequestEngine<T> {
    pub fn new(transport: T) -> Self {
        Self::with_timeout(transport, REQUEST_TIMEOUT_MS)
    }

    pub fn with_timeout(transport: T, timeout_ms: u64) -> Self {
        Self {
            transport,
            active: Vec::new(),
            finished: Deque::new(),
            completed: Deque::new(),
            next_id: 0,
            timeout_ms,
        }
    }

    /// Start a request and return immediately.
    ///
    /// A synchronous connect failure still yields an id; the request shows
    /// up as completed on the next `poll_completed`.
    pub fn start_request(
        &mut self,
        action: Action,
        request: RequestBytes,
        now_ms: u64,
    ) -> Result<RequestId, EngineError> {
        if self.active.len() + self.completed.len() >= MAX_IN_FLIGHT {
            warn!("Request engine busy, dropping {}", action.name());
            return Err(EngineError::Busy);
        }

        let id = RequestId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        let req = HttpRequest::new(id, action, request, now_ms);
        if self.active.push(req).is_err() {
            return Err(EngineError::Busy);
        }
        info!("#{} {} started", id.0, action.name());

        if let Err(e) = self.transport.connect(id) {
            warn!("#{} connect failed: {}", id.0, e);
            self.complete(id, CompletionReason::TransportFailed);
        }
        Ok(id)
    }

    /// Drain all ready socket events, then expire overdue requests
    pub fn service(&mut self, now_ms: u64) {
        while let Some(event) = self.transport.poll_event() {
            self.handle_event(event);
        }
        self.expire(now_ms);
    }

    pub fn handle_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Connected(id) => self.on_connected(id),
            SocketEvent::Data(id, chunk) => self.on_data(id, &chunk),
            SocketEvent::Closed(id) => self.on_closed(id),
            SocketEvent::Failed(id) => self.on_failed(id),
        }
    }

    pub fn on_connected(&mut self, id: RequestId) {
        let Some(req) = self.active.iter_mut().find(|r| r.id == id && !r.is_done()) else {
            trace!("#{} connected after completion", id.0);
            return;
        };
        req.set_stage(Stage::Sending);
        debug!("#{} connected, sending {} bytes", id.0, req.request_bytes().len());

        match self.transport.send(id, req.request_bytes()) {
            Ok(()) => req.set_stage(Stage::Receiving),
            Err(e) => {
                warn!("#{} send failed: {}", id.0, e);
                self.transport.close(id);
                self.complete(id, CompletionReason::TransportFailed);
            }
        }
    }

    pub fn on_data(&mut self, id: RequestId, data: &[u8]) {
        let Some(req) = self.active.iter_mut().find(|r| r.id == id && !r.is_done()) else {
            trace!("#{} dropping {} stale bytes", id.0, data.len());
            return;
        };
        req.append(data);
        trace!("#{} received {} bytes", id.0, data.len());

        if req.is_satisfied() {
            debug!(
                "#{} response complete, status {}",
                id.0,
                req.status_code().unwrap_or(0)
            );
            self.transport.close(id);
            self.complete(id, CompletionReason::Finished);
        }
    }

    pub fn on_closed(&mut self, id: RequestId) {
        if self.is_pending(id) {
            debug!("#{} closed by peer", id.0);
            self.complete(id, CompletionReason::PeerClosed);
        }
    }

    pub fn on_failed(&mut self, id: RequestId) {
        if self.is_pending(id) {
            warn!("#{} socket failed", id.0);
            self.complete(id, CompletionReason::TransportFailed);
        }
    }

    /// Close and complete requests older than the timeout
    pub fn expire(&mut self, now_ms: u64) {
        let mut overdue: Vec<(RequestId, Stage), MAX_IN_FLIGHT> = Vec::new();
        for req in self.active.iter().filter(|r| !r.is_done()) {
            if now_ms.saturating_sub(req.created_at_ms) >= self.timeout_ms {
                let _ = overdue.push((req.id, req.stage()));
            }
        }
        for (id, stage) in overdue {
            warn!("#{} timed out while {}", id.0, stage);
            self.transport.close(id);
            self.complete(id, CompletionReason::TimedOut);
        }
    }

    /// Move finished requests to the completed set and return their ids,
    /// in completion order
    pub fn poll_completed(&mut self) -> Vec<RequestId, MAX_IN_FLIGHT> {
        let mut ids = Vec::new();
        while let Some(id) = self.finished.pop_front() {
            let Some(index) = self.active.iter().position(|r| r.id == id) else {
                continue;
            };
            let req = self.active.swap_remove(index);
            // active + completed never exceeds MAX_IN_FLIGHT
            if self.completed.push_back(req).is_ok() {
                let _ = ids.push(id);
            }
        }
        ids
    }

    /// Hand the oldest completed request to the consumer
    pub fn take_completed(&mut self) -> Option<HttpRequest> {
        self.completed.pop_front()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn is_pending(&self, id: RequestId) -> bool {
        self.active.iter().any(|r| r.id == id && !r.is_done())
    }

    fn complete(&mut self, id: RequestId, reason: CompletionReason) {
        if let Some(req) = self.active.iter_mut().find(|r| r.id == id && !r.is_done()) {
            req.complete(reason);
            let _ = self.finished.push_back(id);
            info!("#{} {} done: {}", id.0, req.action.name(), reason);
            if req.is_truncated() {
                warn!(
                    "#{} response truncated to {} bytes",
                    id.0,
                    req.response().len()
                );
            }
        }
    }
}

impl<T: Transport> RequestSink for RequestEngine<T> {
    fn submit(
        &mut self,
        action: Action,
        request: RequestBytes,
        now_ms: u64,
    ) -> Result<RequestId, EngineError> {
        self.start_request(action, request, now_ms)
    }
}
