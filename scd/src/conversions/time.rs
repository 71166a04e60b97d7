use chrono::{NaiveDate, NaiveDateTime};

use crate::bail;
use crate::error::{ErrorKind, ScdResult};

/// Timestamp layouts accepted in change rows, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses a timestamp without time zone.
///
/// A bare date is accepted and interpreted as midnight of that day.
pub fn parse_timestamp(s: &str) -> ScdResult<NaiveDateTime> {
    let s = s.trim();

    for format in TIMESTAMP_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(timestamp);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        && let Some(timestamp) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(timestamp);
    }

    bail!(
        ErrorKind::MalformedRecord,
        "Invalid timestamp value",
        format!("`{s}` is not a timestamp")
    );
}
