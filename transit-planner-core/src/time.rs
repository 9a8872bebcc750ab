//! Conversions between `HH:MM:SS` time-of-day strings and second offsets.
//!
//! Hours are not limited to 23: trips running past midnight keep counting
//! from the start of their service day (`25:10:00` is 01:10 the next morning).

use crate::{Error, Time};

/// Parse a `H+:MM:SS` string into seconds since midnight.
///
/// # Errors
///
/// Returns [`Error::MalformedTime`] when the text is not three colon-separated
/// numeric fields, when minutes or seconds are not two digits below 60, or
/// when the value does not fit into [`Time`].
pub fn parse_time(text: &str) -> Result<Time, Error> {
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    let malformed = || Error::MalformedTime(text.to_string());

    // Fast path for the usual HH:MM:SS layout
    if bytes.len() == 8 && bytes[2] == b':' && bytes[5] == b':' {
        let digits = [bytes[0], bytes[1], bytes[3], bytes[4], bytes[6], bytes[7]];
        if digits.iter().all(u8::is_ascii_digit) {
            let value = |hi: u8, lo: u8| u32::from(hi - b'0') * 10 + u32::from(lo - b'0');
            let hours = value(digits[0], digits[1]);
            let minutes = value(digits[2], digits[3]);
            let seconds = value(digits[4], digits[5]);
            if minutes < 60 && seconds < 60 {
                return Ok(hours * 3600 + minutes * 60 + seconds);
            }
        }
        return Err(malformed());
    }

    let mut parts = trimmed.split(':');
    let (Some(hours), Some(minutes), Some(seconds), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    let hours = parse_field(hours, None).ok_or_else(malformed)?;
    let minutes = parse_field(minutes, Some(2)).ok_or_else(malformed)?;
    let seconds = parse_field(seconds, Some(2)).ok_or_else(malformed)?;
    if minutes >= 60 || seconds >= 60 {
        return Err(malformed());
    }

    hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + seconds))
        .ok_or_else(malformed)
}

fn parse_field(field: &str, width: Option<usize>) -> Option<u32> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if width.is_some_and(|w| field.len() != w) {
        return None;
    }
    field.parse().ok()
}

/// Format seconds since midnight as `HH:MM:SS`; hours grow past two digits
/// when needed.
pub fn format_time(seconds: Time) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}
