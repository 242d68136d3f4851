//! Request formatting and the per-request response accumulator

use core::fmt::Write;

use heapless::{String, Vec};

use super::parse;
use crate::config::{API_PREFIX, CAMERA_HOST, REQUEST_CAPACITY, RESPONSE_CAPACITY};
use crate::types::{Action, RequestId};

pub type RequestBytes = Vec<u8, REQUEST_CAPACITY>;

/// Request does not fit the fixed request buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct FormatError;

/// Value of a single-field JSON body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum JsonValue {
    Int(i32),
    Bool(bool),
}

/// `{"<key>": <value>}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct JsonField {
    pub key: &'static str,
    pub value: JsonValue,
}

impl JsonField {
    pub const fn int(key: &'static str, value: i32) -> Self {
        Self {
            key,
            value: JsonValue::Int(value),
        }
    }

    pub const fn bool(key: &'static str, value: bool) -> Self {
        Self {
            key,
            value: JsonValue::Bool(value),
        }
    }

    fn write_to(&self, out: &mut impl Write) -> core::fmt::Result {
        match self.value {
            JsonValue::Int(v) => write!(out, "{{\"{}\": {}}}", self.key, v),
            JsonValue::Bool(v) => write!(out, "{{\"{}\": {}}}", self.key, v),
        }
    }
}

/// `PUT` with an optional single-field body. Without a body the request
/// still carries `Content-Length: 0`.
pub fn format_put(path: &str, body: Option<JsonField>) -> Result<RequestBytes, FormatError> {
    let mut json: String<64> = String::new();
    if let Some(field) = body {
        field.write_to(&mut json).map_err(|_| FormatError)?;
    }

    let mut out: String<REQUEST_CAPACITY> = String::new();
    write!(
        out,
        "PUT {API_PREFIX}{path} HTTP/1.1\r\n\
         Host: {CAMERA_HOST}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        json.len(),
        json.as_str()
    )
    .map_err(|_| FormatError)?;
    Ok(out.into_bytes())
}

pub fn format_get(path: &str) -> Result<RequestBytes, FormatError> {
    let mut out: String<REQUEST_CAPACITY> = String::new();
    write!(
        out,
        "GET {API_PREFIX}{path} HTTP/1.1\r\n\
         Host: {CAMERA_HOST}\r\n\
         Accept: application/json\r\n\
         Connection: close\r\n\
         \r\n"
    )
    .map_err(|_| FormatError)?;
    Ok(out.into_bytes())
}

// ===================================================================
// In-flight Request
// ===================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Stage {
    Connecting,
    Sending,
    Receiving,
    Complete,
}

/// Why a request reached `Complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum CompletionReason {
    /// Headers and the declared body arrived
    Finished,
    /// Peer closed first, response accepted as-is
    PeerClosed,
    /// Connect or write failed
    TransportFailed,
    TimedOut,
}

/// One outbound exchange. Owns its request bytes and response buffer.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub id: RequestId,
    pub action: Action,
    request: RequestBytes,
    response: Vec<u8, RESPONSE_CAPACITY>,
    header_end: Option<usize>,
    content_length: Option<usize>,
    stage: Stage,
    reason: Option<CompletionReason>,
    truncated: bool,
    pub created_at_ms: u64,
}

impl HttpRequest {
    pub fn new(id: RequestId, action: Action, request: RequestBytes, now_ms: u64) -> Self {
        Self {
            id,
            action,
            request,
            response: Vec::new(),
            header_end: None,
            content_length: None,
            stage: Stage::Connecting,
            reason: None,
            truncated: false,
            created_at_ms: now_ms,
        }
    }

    pub fn request_bytes(&self) -> &[u8] {
        &self.request
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn set_stage(&mut self, stage: Stage) {
        if !self.is_done() {
            self.stage = stage;
        }
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Complete
    }

    pub fn reason(&self) -> Option<CompletionReason> {
        self.reason
    }

    /// Mark complete. The first reason sticks; the response is frozen from here on.
    pub(crate) fn complete(&mut self, reason: CompletionReason) {
        if !self.is_done() {
            self.stage = Stage::Complete;
            self.reason = Some(reason);
        }
    }

    /// Append one fragment. Ignored once done; bytes past the buffer are
    /// dropped and the request is flagged truncated.
    pub(crate) fn append(&mut self, data: &[u8]) {
        if self.is_done() {
            return;
        }
        let previous_len = self.response.len();
        let room = self.response.capacity() - previous_len;
        let take = data.len().min(room);
        // cannot fail, `take` fits
        let _ = self.response.extend_from_slice(&data[..take]);
        if take < data.len() {
            self.truncated = true;
        }

        if self.header_end.is_none() {
            if let Some(end) = parse::find_header_end(&self.response, previous_len) {
                self.header_end = Some(end);
                self.content_length = parse::parse_content_length(&self.response[..end]);
            }
        }
    }

    /// Headers seen and the declared body fully buffered
    pub fn is_satisfied(&self) -> bool {
        match (self.header_end, self.content_length) {
            (Some(end), Some(length)) => self.response.len() - end >= length,
            _ => false,
        }
    }

    pub fn has_response_headers(&self) -> bool {
        self.header_end.is_some()
    }

    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    pub fn response(&self) -> &[u8] {
        &self.response
    }

    /// Bytes after the header block, empty if headers never arrived
    pub fn body(&self) -> &[u8] {
        match self.header_end {
            Some(end) => &self.response[end..],
            None => &[],
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        parse::parse_status_code(&self.response)
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PATH_GAIN;

    #[test]
    fn put_request_wire_format() {
        let bytes = format_put(PATH_GAIN, Some(JsonField::int("gain", 18))).unwrap();
        let text = core::str::from_utf8(&bytes).unwrap();
        assert_eq!(
            text,
            "PUT /control/api/v1/video/gain HTTP/1.1\r\n\
             Host: Micro-Studio-Camera-4K-G2.local\r\n\
             Content-Type: application/json\r\n\
             Content-Length: 12\r\n\
             Connection: close\r\n\
             \r\n\
             {\"gain\": 18}"
        );
    }

    #[test]
    fn put_without_body_declares_zero_length() {
        let bytes = format_put("lens/focus/doAutoFocus", None).unwrap();
        let text = core::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("PUT /control/api/v1/lens/focus/doAutoFocus HTTP/1.1\r\n"));
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn bool_body() {
        let bytes = format_put("transports/0/record", Some(JsonField::bool("recording", true)))
            .unwrap();
        assert!(bytes.ends_with(b"Content-Length: 19\r\nConnection: close\r\n\r\n{\"recording\": true}"));
    }

    #[test]
    fn get_request_wire_format() {
        let bytes = format_get(PATH_GAIN).unwrap();
        assert_eq!(
            core::str::from_utf8(&bytes).unwrap(),
            "GET /control/api/v1/video/gain HTTP/1.1\r\n\
             Host: Micro-Studio-Camera-4K-G2.local\r\n\
             Accept: application/json\r\n\
             Connection: close\r\n\
             \r\n"
        );
    }

    #[test]
    fn oversized_path_is_rejected() {
        let path = [b'a'; REQUEST_CAPACITY];
        let path = core::str::from_utf8(&path).unwrap();
        assert_eq!(format_get(path), Err(FormatError));
    }

    fn request() -> HttpRequest {
        HttpRequest::new(RequestId(1), Action::GetGain, format_get(PATH_GAIN).unwrap(), 0)
    }

    #[test]
    fn response_is_frozen_after_completion() {
        let mut req = request();
        req.append(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
        assert!(req.is_satisfied());
        req.complete(CompletionReason::Finished);
        req.append(b"more");
        req.complete(CompletionReason::PeerClosed);
        assert_eq!(req.body(), b"ok");
        assert_eq!(req.reason(), Some(CompletionReason::Finished));
        assert_eq!(req.status_code(), Some(200));
    }

    #[test]
    fn overflow_is_dropped_and_flagged() {
        let mut req = request();
        req.append(b"HTTP/1.1 200 OK\r\n\r\n");
        let filler = [b'x'; 300];
        for _ in 0..10 {
            req.append(&filler);
        }
        assert_eq!(req.response().len(), RESPONSE_CAPACITY);
        assert!(req.is_truncated());
        assert!(!req.is_satisfied());
    }
}
