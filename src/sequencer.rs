//! Command sequencer
//!
//! Owns the mirrored [`DeviceState`] and turns commands into requests. Gain,
//! white balance and record changes run a write-then-confirm chain: the `PUT`
//! is followed by a `GET` whose value is the only one adopted as confirmed.
//! A field with a chain in flight ignores new changes until the chain ends.

use crate::config::*;
use crate::http::parse::{json_bool, json_int};
use crate::http::{format_get, format_put, EngineError, HttpRequest, JsonField, RequestSink};
use crate::types::{Action, Command, Direction, RequestId};

/// Mirrored camera state. Reset to defaults on every boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct DeviceState {
    pub gain_db: i32,
    pub white_balance_k: i32,
    /// Index into `WB_PRESETS_K` used by preset cycling
    pub wb_preset: usize,
    pub recording: bool,
    /// Selected row on the status display
    pub cursor: u8,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            gain_db: GAIN_DEFAULT_DB,
            white_balance_k: WB_DEFAULT_K,
            wb_preset: 0,
            recording: false,
            cursor: 0,
        }
    }
}

/// Fields guarded by a confirm chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Field {
    Gain = 0,
    WhiteBalance = 1,
    Record = 2,
}

impl Field {
    fn of(action: Action) -> Option<Field> {
        match action {
            Action::SetGain | Action::GetGain => Some(Field::Gain),
            Action::SetWhiteBalance | Action::GetWhiteBalance | Action::AutoWhiteBalance => {
                Some(Field::WhiteBalance)
            }
            Action::SetRecord | Action::GetRecord => Some(Field::Record),
            Action::DoFocus => None,
        }
    }

    /// Confirm-read endpoint and action
    fn read_back(self) -> (&'static str, Action) {
        match self {
            Field::Gain => (PATH_GAIN, Action::GetGain),
            Field::WhiteBalance => (PATH_WHITE_BALANCE, Action::GetWhiteBalance),
            Field::Record => (PATH_RECORD, Action::GetRecord),
        }
    }
}

/// One gain step, `None` when it would leave the range
pub fn step_gain(current: i32, direction: Direction) -> Option<i32> {
    let next = current + direction.sign() * GAIN_STEP_DB;
    (GAIN_MIN_DB..=GAIN_MAX_DB).contains(&next).then_some(next)
}

/// One white balance step, `None` when it would leave the range
pub fn step_white_balance(current: i32, direction: Direction) -> Option<i32> {
    let next = current + direction.sign() * WB_STEP_K;
    (WB_MIN_K..=WB_MAX_K).contains(&next).then_some(next)
}

/// Next preset index and its Kelvin value, wrapping around
pub fn next_preset(index: usize) -> (usize, i32) {
    let next = (index + 1) % WB_PRESETS_K.len();
    (next, WB_PRESETS_K[next])
}

#[derive(Debug, Default)]
pub struct Sequencer {
    state: DeviceState,
    chains: [Option<RequestId>; 3],
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Request currently carrying the chain for `field`
    pub fn in_flight(&self, field: Field) -> Option<RequestId> {
        self.chains[field as usize]
    }

    /// Run one command. Returns true if the mirrored state changed.
    pub fn execute(&mut self, command: Command, sink: &mut impl RequestSink, now_ms: u64) -> bool {
        debug!("Command {}", command);
        match command {
            Command::GainStep(direction) => {
                let Some(gain) = step_gain(self.state.gain_db, direction) else {
                    debug!("Gain already at limit");
                    return false;
                };
                self.set_gain(gain, sink, now_ms)
            }
            Command::ToggleNativeGain => {
                let gain = if self.state.gain_db == 0 { NATIVE_GAIN_DB } else { 0 };
                self.set_gain(gain, sink, now_ms)
            }
            Command::WhiteBalanceStep(direction) => {
                let Some(kelvin) = step_white_balance(self.state.white_balance_k, direction)
                else {
                    debug!("White balance already at limit");
                    return false;
                };
                self.set_white_balance(kelvin, None, sink, now_ms)
            }
            Command::CycleWhiteBalancePreset => {
                let (index, kelvin) = next_preset(self.state.wb_preset);
                self.set_white_balance(kelvin, Some(index), sink, now_ms)
            }
            Command::AutoWhiteBalance => {
                let _ = self.write(
                    Field::WhiteBalance,
                    Action::AutoWhiteBalance,
                    PATH_WHITE_BALANCE_AUTO,
                    None,
                    sink,
                    now_ms,
                );
                false
            }
            Command::ToggleRecord => {
                let recording = !self.state.recording;
                let (path, body) = if recording {
                    (PATH_RECORD, Some(JsonField::bool(KEY_RECORDING, true)))
                } else {
                    (PATH_STOP, None)
                };
                if self
                    .write(Field::Record, Action::SetRecord, path, body, sink, now_ms)
                    .is_some()
                {
                    self.state.recording = recording;
                    return true;
                }
                false
            }
            Command::AutoFocus => {
                match format_put(PATH_AUTO_FOCUS, None)
                    .map_err(EngineError::from)
                    .and_then(|bytes| sink.submit(Action::DoFocus, bytes, now_ms))
                {
                    Ok(id) => info!("Autofocus requested (#{})", id.0),
                    Err(e) => warn!("Autofocus dropped: {}", e),
                }
                false
            }
            Command::AdjustSelected(direction) => match self.state.cursor {
                0 => self.execute(Command::GainStep(direction), sink, now_ms),
                _ => self.execute(Command::WhiteBalanceStep(direction), sink, now_ms),
            },
            Command::MoveCursor(direction) => {
                let cursor = (i32::from(self.state.cursor) + direction.sign())
                    .clamp(0, i32::from(CURSOR_MAX)) as u8;
                let changed = cursor != self.state.cursor;
                self.state.cursor = cursor;
                changed
            }
        }
    }

    /// Consume a completed request. Returns true if the mirrored state changed.
    pub fn on_completed(
        &mut self,
        request: &HttpRequest,
        sink: &mut impl RequestSink,
        now_ms: u64,
    ) -> bool {
        let Some(field) = Field::of(request.action) else {
            debug!(
                "#{} {} finished, status {}",
                request.id.0,
                request.action.name(),
                request.status_code().unwrap_or(0)
            );
            return false;
        };

        let slot = field as usize;
        if self.chains[slot] != Some(request.id) {
            debug!("#{} no longer current, ignored", request.id.0);
            return false;
        }

        if request.action.is_write() {
            self.chains[slot] = None;
            if !request.has_response_headers() {
                warn!(
                    "#{} {} got no response, chain abandoned",
                    request.id.0,
                    request.action.name()
                );
                return false;
            }
            let (path, action) = field.read_back();
            match format_get(path)
                .map_err(EngineError::from)
                .and_then(|bytes| sink.submit(action, bytes, now_ms))
            {
                Ok(id) => self.chains[slot] = Some(id),
                Err(e) => warn!("{} dropped: {}", action.name(), e),
            }
            return false;
        }

        self.chains[slot] = None;
        self.adopt(field, request)
    }

    fn adopt(&mut self, field: Field, request: &HttpRequest) -> bool {
        let body = request.body();
        match field {
            Field::Gain => match json_int(body, KEY_GAIN) {
                Some(gain) => {
                    info!("Gain confirmed: {} dB", gain);
                    self.state.gain_db = gain;
                    true
                }
                None => {
                    warn!("#{} no gain in response", request.id.0);
                    false
                }
            },
            Field::WhiteBalance => match json_int(body, KEY_WHITE_BALANCE) {
                Some(kelvin) => {
                    info!("White balance confirmed: {} K", kelvin);
                    self.state.white_balance_k = kelvin;
                    if let Some(index) = WB_PRESETS_K.iter().position(|&k| k == kelvin) {
                        self.state.wb_preset = index;
                    }
                    true
                }
                None => {
                    warn!("#{} no white balance in response", request.id.0);
                    false
                }
            },
            Field::Record => match json_bool(body, KEY_RECORDING) {
                Some(recording) => {
                    info!("Recording confirmed: {}", recording);
                    self.state.recording = recording;
                    true
                }
                None => {
                    warn!("#{} no recording flag in response", request.id.0);
                    false
                }
            },
        }
    }

    fn set_gain(&mut self, gain: i32, sink: &mut impl RequestSink, now_ms: u64) -> bool {
        let body = Some(JsonField::int(KEY_GAIN, gain));
        if self
            .write(Field::Gain, Action::SetGain, PATH_GAIN, body, sink, now_ms)
            .is_some()
        {
            self.state.gain_db = gain;
            return true;
        }
        false
    }

    fn set_white_balance(
        &mut self,
        kelvin: i32,
        preset: Option<usize>,
        sink: &mut impl RequestSink,
        now_ms: u64,
    ) -> bool {
        let body = Some(JsonField::int(KEY_WHITE_BALANCE, kelvin));
        if self
            .write(
                Field::WhiteBalance,
                Action::SetWhiteBalance,
                PATH_WHITE_BALANCE,
                body,
                sink,
                now_ms,
            )
            .is_some()
        {
            self.state.white_balance_k = kelvin;
            if let Some(index) = preset {
                self.state.wb_preset = index;
            }
            return true;
        }
        false
    }

    /// Start the write half of a chain, unless one is already running
    fn write(
        &mut self,
        field: Field,
        action: Action,
        path: &str,
        body: Option<JsonField>,
        sink: &mut impl RequestSink,
        now_ms: u64,
    ) -> Option<RequestId> {
        let slot = field as usize;
        if let Some(pending) = self.chains[slot] {
            warn!(
                "{} ignored, #{} still in flight for {}",
                action.name(),
                pending.0,
                field
            );
            return None;
        }

        match format_put(path, body)
            .map_err(EngineError::from)
            .and_then(|bytes| sink.submit(action, bytes, now_ms))
        {
            Ok(id) => {
                self.chains[slot] = Some(id);
                Some(id)
            }
            Err(e) => {
                warn!("{} dropped: {}", action.name(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{CompletionReason, RequestBytes};

    #[derive(Default)]
    struct RecordingSink {
        next: u32,
        busy: bool,
        submitted: std::vec::Vec<(RequestId, Action, std::string::String)>,
    }

    impl RequestSink for RecordingSink {
        fn submit(
            &mut self,
            action: Action,
            request: RequestBytes,
            _now_ms: u64,
        ) -> Result<RequestId, EngineError> {
            if self.busy {
                return Err(EngineError::Busy);
            }
            let id = RequestId(self.next);
            self.next += 1;
            let text = std::string::String::from_utf8(request.to_vec()).unwrap();
            self.submitted.push((id, action, text));
            Ok(id)
        }
    }

    impl RecordingSink {
        fn last(&self) -> &(RequestId, Action, std::string::String) {
            self.submitted.last().unwrap()
        }
    }

    fn completed(id: RequestId, action: Action, response: &[u8]) -> HttpRequest {
        let mut req = HttpRequest::new(id, action, RequestBytes::new(), 0);
        req.append(response);
        req.complete(CompletionReason::PeerClosed);
        req
    }

    fn ok_with(body: &str) -> std::vec::Vec<u8> {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    #[test]
    fn gain_chain_adopts_confirmed_value() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink::default();

        assert!(seq.execute(Command::GainStep(Direction::Up), &mut sink, 0));
        let (put_id, action, text) = sink.last().clone();
        assert_eq!(action, Action::SetGain);
        assert!(text.starts_with("PUT /control/api/v1/video/gain HTTP/1.1"));
        assert!(text.ends_with("{\"gain\": 6}"));
        assert_eq!(seq.state().gain_db, 6);

        let put = completed(put_id, Action::SetGain, b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
        assert!(!seq.on_completed(&put, &mut sink, 1));
        let (get_id, action, text) = sink.last().clone();
        assert_eq!(action, Action::GetGain);
        assert!(text.starts_with("GET /control/api/v1/video/gain HTTP/1.1"));
        assert_eq!(seq.in_flight(Field::Gain), Some(get_id));

        // the camera has the final say
        let get = completed(get_id, Action::GetGain, &ok_with(r#"{"gain": 12}"#));
        assert!(seq.on_completed(&get, &mut sink, 2));
        assert_eq!(seq.state().gain_db, 12);
        assert_eq!(seq.in_flight(Field::Gain), None);
    }

    #[test]
    fn new_input_is_dropped_while_chain_in_flight() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink::default();
        assert!(seq.execute(Command::GainStep(Direction::Up), &mut sink, 0));
        assert!(!seq.execute(Command::GainStep(Direction::Up), &mut sink, 1));
        assert!(!seq.execute(Command::ToggleNativeGain, &mut sink, 1));
        assert_eq!(sink.submitted.len(), 1);
        assert_eq!(seq.state().gain_db, 6);

        // other fields are independent, focus is unguarded
        assert!(seq.execute(Command::ToggleRecord, &mut sink, 2));
        seq.execute(Command::AutoFocus, &mut sink, 3);
        seq.execute(Command::AutoFocus, &mut sink, 4);
        assert_eq!(sink.submitted.len(), 4);
    }

    #[test]
    fn limits_send_nothing() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink::default();
        seq.state.gain_db = GAIN_MAX_DB;
        seq.state.white_balance_k = WB_MIN_K;
        assert!(!seq.execute(Command::GainStep(Direction::Up), &mut sink, 0));
        assert!(!seq.execute(Command::WhiteBalanceStep(Direction::Down), &mut sink, 0));
        assert!(sink.submitted.is_empty());
    }

    #[test]
    fn rejected_write_leaves_state_untouched() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink {
            busy: true,
            ..Default::default()
        };
        assert!(!seq.execute(Command::ToggleRecord, &mut sink, 0));
        assert!(!seq.state().recording);
        assert_eq!(seq.in_flight(Field::Record), None);
    }

    #[test]
    fn write_without_headers_abandons_chain() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink::default();
        seq.execute(Command::WhiteBalanceStep(Direction::Up), &mut sink, 0);
        let (id, _, _) = sink.last().clone();

        let mut failed = HttpRequest::new(id, Action::SetWhiteBalance, RequestBytes::new(), 0);
        failed.complete(CompletionReason::TransportFailed);
        assert!(!seq.on_completed(&failed, &mut sink, 1));
        assert_eq!(sink.submitted.len(), 1);
        assert_eq!(seq.in_flight(Field::WhiteBalance), None);

        // field is free again
        assert!(seq.execute(Command::WhiteBalanceStep(Direction::Up), &mut sink, 2));
    }

    #[test]
    fn error_status_still_confirms() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink::default();
        seq.execute(Command::GainStep(Direction::Down), &mut sink, 0);
        let (id, _, _) = sink.last().clone();
        let put = completed(id, Action::SetGain, b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n");
        seq.on_completed(&put, &mut sink, 1);
        assert_eq!(sink.last().1, Action::GetGain);
    }

    #[test]
    fn malformed_confirm_keeps_state() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink::default();
        seq.execute(Command::ToggleRecord, &mut sink, 0);
        let (put_id, _, text) = sink.last().clone();
        assert!(text.starts_with("PUT /control/api/v1/transports/0/record HTTP/1.1"));
        assert!(text.ends_with("{\"recording\": true}"));
        assert!(seq.state().recording);

        let put = completed(put_id, Action::SetRecord, &ok_with(""));
        seq.on_completed(&put, &mut sink, 1);
        let (get_id, action, _) = sink.last().clone();
        assert_eq!(action, Action::GetRecord);

        let get = completed(get_id, Action::GetRecord, &ok_with("{}"));
        assert!(!seq.on_completed(&get, &mut sink, 2));
        assert!(seq.state().recording);
        assert_eq!(seq.in_flight(Field::Record), None);
    }

    #[test]
    fn record_confirm_parses_booleans() {
        for (body, expected) in [(r#"{"recording": true}"#, true), (r#"{"recording": false}"#, false)] {
            let mut seq = Sequencer::new();
            let mut sink = RecordingSink::default();
            seq.execute(Command::ToggleRecord, &mut sink, 0);
            let put_id = sink.last().0;
            seq.on_completed(&completed(put_id, Action::SetRecord, &ok_with("")), &mut sink, 1);
            let get_id = sink.last().0;
            assert!(seq.on_completed(&completed(get_id, Action::GetRecord, &ok_with(body)), &mut sink, 2));
            assert_eq!(seq.state().recording, expected);
        }
    }

    #[test]
    fn stop_uses_stop_endpoint_without_body() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink::default();
        seq.state.recording = true;
        seq.execute(Command::ToggleRecord, &mut sink, 0);
        let text = &sink.last().2;
        assert!(text.starts_with("PUT /control/api/v1/transports/0/stop HTTP/1.1"));
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(!seq.state().recording);
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink::default();
        let stale = completed(RequestId(99), Action::GetGain, &ok_with(r#"{"gain": 30}"#));
        assert!(!seq.on_completed(&stale, &mut sink, 0));
        assert_eq!(seq.state().gain_db, GAIN_DEFAULT_DB);
        assert!(sink.submitted.is_empty());
    }

    #[test]
    fn native_gain_toggles() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink::default();
        seq.execute(Command::ToggleNativeGain, &mut sink, 0);
        assert_eq!(seq.state().gain_db, NATIVE_GAIN_DB);
        assert!(sink.last().2.ends_with("{\"gain\": 18}"));

        seq.chains = [None; 3];
        seq.execute(Command::ToggleNativeGain, &mut sink, 1);
        assert_eq!(seq.state().gain_db, 0);
    }

    #[test]
    fn preset_cycle_wraps_and_realigns() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink::default();
        let mut seen = std::vec::Vec::new();
        for _ in 0..WB_PRESETS_K.len() {
            seq.chains = [None; 3];
            seq.execute(Command::CycleWhiteBalancePreset, &mut sink, 0);
            seen.push(seq.state().white_balance_k);
        }
        assert_eq!(seen, [4000, 5200, 6000, 7000, 2800]);

        // auto white balance confirms 6000, cycling continues from there
        seq.chains = [None; 3];
        assert!(!seq.execute(Command::AutoWhiteBalance, &mut sink, 0));
        let (put_id, action, text) = sink.last().clone();
        assert_eq!(action, Action::AutoWhiteBalance);
        assert!(text.starts_with("PUT /control/api/v1/video/whiteBalance/doAuto HTTP/1.1"));
        seq.on_completed(&completed(put_id, action, &ok_with("")), &mut sink, 1);
        let (get_id, action, _) = sink.last().clone();
        assert_eq!(action, Action::GetWhiteBalance);
        seq.on_completed(
            &completed(get_id, action, &ok_with(r#"{"whiteBalance": 6000, "tint": 0}"#)),
            &mut sink,
            2,
        );
        assert_eq!(seq.state().wb_preset, 3);
        seq.execute(Command::CycleWhiteBalancePreset, &mut sink, 3);
        assert_eq!(seq.state().white_balance_k, 7000);
    }

    #[test]
    fn cursor_selects_adjusted_parameter() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink::default();
        assert!(!seq.execute(Command::MoveCursor(Direction::Down), &mut sink, 0));
        assert!(seq.execute(Command::MoveCursor(Direction::Up), &mut sink, 0));
        assert!(!seq.execute(Command::MoveCursor(Direction::Up), &mut sink, 0));
        assert_eq!(seq.state().cursor, CURSOR_MAX);

        seq.execute(Command::AdjustSelected(Direction::Down), &mut sink, 0);
        assert_eq!(sink.last().1, Action::SetWhiteBalance);
        assert_eq!(seq.state().white_balance_k, WB_DEFAULT_K - WB_STEP_K);
    }

    #[test]
    fn focus_is_fire_and_forget() {
        let mut seq = Sequencer::new();
        let mut sink = RecordingSink::default();
        assert!(!seq.execute(Command::AutoFocus, &mut sink, 0));
        let (id, action, text) = sink.last().clone();
        assert_eq!(action, Action::DoFocus);
        assert!(text.starts_with("PUT /control/api/v1/lens/focus/doAutoFocus HTTP/1.1"));
        assert!(!seq.on_completed(&completed(id, action, &ok_with("")), &mut sink, 1));
        assert_eq!(sink.submitted.len(), 1);
    }

    /// Small deterministic generator for the range properties
    fn directions(seed: u32, count: usize) -> impl Iterator<Item = Direction> {
        let mut state = seed;
        (0..count).map(move |_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            if (state >> 16) & 1 == 0 {
                Direction::Up
            } else {
                Direction::Down
            }
        })
    }

    #[test]
    fn gain_stays_in_range_and_on_grid() {
        for seed in 0..64 {
            let mut gain = GAIN_DEFAULT_DB;
            for direction in directions(seed, 200) {
                gain = step_gain(gain, direction).unwrap_or(gain);
                assert!((GAIN_MIN_DB..=GAIN_MAX_DB).contains(&gain));
                assert_eq!((gain - GAIN_DEFAULT_DB) % GAIN_STEP_DB, 0);
            }
        }
    }

    #[test]
    fn white_balance_stays_in_range_and_on_grid() {
        for seed in 0..64 {
            let mut kelvin = WB_DEFAULT_K;
            for direction in directions(seed, 500) {
                kelvin = step_white_balance(kelvin, direction).unwrap_or(kelvin);
                assert!((WB_MIN_K..=WB_MAX_K).contains(&kelvin));
                assert_eq!(kelvin % WB_STEP_K, 0);
            }
        }
    }
}
