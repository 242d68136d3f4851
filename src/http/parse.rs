//! Minimal response scanners
//!
//! Only what the camera API needs: the header terminator, `Content-Length`,
//! the status code, and flat `"key": value` lookups in a JSON body.

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const CONTENT_LENGTH: &[u8] = b"content-length:";

/// Offset just past the first `\r\n\r\n`, searching from `from`.
///
/// `from` lets the caller resume where the previous fragment ended; the
/// search backs up three bytes so a terminator split across fragments is found.
pub fn find_header_end(buf: &[u8], from: usize) -> Option<usize> {
    let start = from.saturating_sub(HEADER_TERMINATOR.len() - 1);
    buf.get(start..)?
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|pos| start + pos + HEADER_TERMINATOR.len())
}

/// Declared `Content-Length`, matched case-insensitively at the start of a
/// header line. A value without digits, or one that overflows, is absent.
pub fn parse_content_length(headers: &[u8]) -> Option<usize> {
    headers
        .split(|&b| b == b'\n')
        .skip(1) // status line
        .find_map(|line| {
            let name = line.get(..CONTENT_LENGTH.len())?;
            if !name.eq_ignore_ascii_case(CONTENT_LENGTH) {
                return None;
            }
            parse_unsigned(skip_blanks(&line[CONTENT_LENGTH.len()..]))
        })
}

/// Status code from `HTTP/1.x NNN ...`
pub fn parse_status_code(response: &[u8]) -> Option<u16> {
    let rest = response.strip_prefix(b"HTTP/")?;
    let space = rest.iter().position(|&b| b == b' ')?;
    let code = rest.get(space + 1..space + 4)?;
    if !code.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(code.iter().fold(0u16, |acc, &d| acc * 10 + u16::from(d - b'0')))
}

/// Integer following `"key":`. Whitespace before the number is skipped,
/// trailing characters after the digits are ignored.
pub fn json_int(body: &[u8], key: &str) -> Option<i32> {
    let value = skip_whitespace(value_after_key(body, key)?);
    let (negative, digits) = match value.first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let magnitude = parse_unsigned(digits)?;
    let magnitude = i64::try_from(magnitude).ok()?;
    let signed = if negative { -magnitude } else { magnitude };
    i32::try_from(signed).ok()
}

/// Literal `true` / `false` following `"key":`
pub fn json_bool(body: &[u8], key: &str) -> Option<bool> {
    let value = skip_whitespace(value_after_key(body, key)?);
    if value.starts_with(b"true") {
        Some(true)
    } else if value.starts_with(b"false") {
        Some(false)
    } else {
        None
    }
}

/// Bytes after the first `"key":` occurrence
fn value_after_key<'a>(body: &'a [u8], key: &str) -> Option<&'a [u8]> {
    let key = key.as_bytes();
    let pattern_len = key.len() + 3;
    if body.len() < pattern_len {
        return None;
    }
    (0..=body.len() - pattern_len)
        .find(|&i| {
            body[i] == b'"'
                && &body[i + 1..i + 1 + key.len()] == key
                && &body[i + 1 + key.len()..i + pattern_len] == b"\":"
        })
        .map(|i| &body[i + pattern_len..])
}

fn skip_blanks(s: &[u8]) -> &[u8] {
    let n = s.iter().take_while(|&&b| b == b' ' || b == b'\t').count();
    &s[n..]
}

fn skip_whitespace(s: &[u8]) -> &[u8] {
    let n = s.iter().take_while(|b| b.is_ascii_whitespace()).count();
    &s[n..]
}

/// Leading decimal digits; `None` if there are none or they overflow
fn parse_unsigned(s: &[u8]) -> Option<usize> {
    let digits = s.iter().take_while(|b| b.is_ascii_digit());
    let mut seen = false;
    let mut value: usize = 0;
    for &d in digits {
        seen = true;
        value = value.checked_mul(10)?.checked_add(usize::from(d - b'0'))?;
    }
    seen.then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_end_is_found_across_resumed_searches() {
        let msg = b"HTTP/1.1 200 OK\r\nA: b\r\n\r\nbody";
        assert_eq!(find_header_end(msg, 0), Some(25));
        // resuming right after "\r\n\r" still sees the terminator
        assert_eq!(find_header_end(msg, 24), Some(25));
        assert_eq!(find_header_end(&msg[..24], 0), None);
        assert_eq!(find_header_end(b"", 10), None);
    }

    #[test]
    fn content_length_is_case_insensitive() {
        let headers = b"HTTP/1.1 200 OK\r\ncontent-LENGTH:\t 42\r\n\r\n";
        assert_eq!(parse_content_length(headers), Some(42));
        assert_eq!(
            parse_content_length(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"),
            Some(0)
        );
    }

    #[test]
    fn content_length_absent_or_malformed() {
        assert_eq!(parse_content_length(b"HTTP/1.1 200 OK\r\n\r\n"), None);
        assert_eq!(
            parse_content_length(b"HTTP/1.1 200 OK\r\nContent-Length: abc\r\n\r\n"),
            None
        );
        // must begin a header line
        assert_eq!(
            parse_content_length(b"HTTP/1.1 200 OK\r\nX-Content-Length: 5\r\n\r\n"),
            None
        );
        assert_eq!(
            parse_content_length(b"HTTP/1.1 200 OK\r\nContent-Length: 99999999999999999999999\r\n\r\n"),
            None
        );
    }

    #[test]
    fn status_code() {
        assert_eq!(parse_status_code(b"HTTP/1.1 204 No Content\r\n"), Some(204));
        assert_eq!(parse_status_code(b"HTTP/1.1 2"), None);
        assert_eq!(parse_status_code(b"garbage"), None);
    }

    #[test]
    fn json_integers() {
        assert_eq!(json_int(br#"{"gain": 18}"#, "gain"), Some(18));
        assert_eq!(json_int(br#"{"gain":-12}"#, "gain"), Some(-12));
        assert_eq!(json_int(b"{\"gain\":\n 6}", "gain"), Some(6));
        assert_eq!(
            json_int(br#"{"whiteBalance": 5600, "tint": 0}"#, "whiteBalance"),
            Some(5600)
        );
        assert_eq!(json_int(br#"{"gain": "x"}"#, "gain"), None);
        assert_eq!(json_int(br#"{"again": 6}"#, "gain"), None);
        assert_eq!(json_int(b"{}", "gain"), None);
        assert_eq!(json_int(br#"{"gain": 99999999999}"#, "gain"), None);
    }

    #[test]
    fn json_booleans() {
        assert_eq!(json_bool(br#"{"recording": true}"#, "recording"), Some(true));
        assert_eq!(json_bool(br#"{"recording":false}"#, "recording"), Some(false));
        assert_eq!(json_bool(b"{}", "recording"), None);
        assert_eq!(json_bool(br#"{"recording": 1}"#, "recording"), None);
    }
}
