//! Parses the text trace format: `<type> <hex_addr> <size> [<file>:<line>] [T<thread>]`, one
//! event per line. Lines starting with `#` and blank lines are comments.

use crate::common::constants::DEFAULT_THREAD_ID;
use crate::common::error::TraceParseError;

use super::event::{EventKind, TraceEvent};

/// Parses one trace line. Returns `Ok(None)` for a blank line or a `#` comment, `Ok(Some(_))`
/// for a well-formed event, and `Err` for a malformed one — the caller decides whether to
/// skip (per the input-parse contract, a parse failure is never fatal to the run).
pub fn parse_line(raw: &str, line_number: usize) -> Result<Option<TraceEvent>, TraceParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let mut fields = trimmed.split_whitespace();
    let too_few = || TraceParseError::TooFewFields {
        line_number,
        raw: raw.to_owned(),
    };

    let ty = fields.next().ok_or_else(too_few)?;
    let addr_field = fields.next().ok_or_else(too_few)?;
    let size_field = fields.next().ok_or_else(too_few)?;

    let op = match ty {
        "L" | "l" => EventKind::Load,
        "S" | "s" => EventKind::Store,
        "I" => EventKind::InstFetch,
        other => {
            return Err(TraceParseError::UnknownEventType {
                line_number,
                ty: other.to_owned(),
            })
        }
    };

    let addr_digits = addr_field
        .strip_prefix("0x")
        .or_else(|| addr_field.strip_prefix("0X"))
        .unwrap_or(addr_field);
    let address = u64::from_str_radix(addr_digits, 16).map_err(|_| TraceParseError::InvalidAddress {
        line_number,
        raw: addr_field.to_owned(),
    })?;

    let size: u32 = size_field.parse().map_err(|_| TraceParseError::InvalidSize {
        line_number,
        raw: size_field.to_owned(),
    })?;

    let mut source = None;
    let mut thread_id = DEFAULT_THREAD_ID;
    for field in fields {
        if let Some(rest) = field.strip_prefix('T') {
            if let Ok(parsed) = rest.parse::<u32>() {
                thread_id = parsed;
                continue;
            }
        }
        if let Some((file, line)) = field.rsplit_once(':') {
            if let Ok(line_no) = line.parse::<u32>() {
                source = Some((file.to_owned(), line_no));
            }
        }
    }

    Ok(Some(TraceEvent {
        op,
        address,
        size,
        source,
        thread_id,
        pc: None,
    }))
}
