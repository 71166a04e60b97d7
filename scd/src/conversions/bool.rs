use crate::bail;
use crate::error::{ErrorKind, ScdResult};

/// Parses a boolean in either the short Postgres form (`t`/`f`) or the long form
/// (`true`/`false`), case-insensitively.
pub fn parse_bool(s: &str) -> ScdResult<bool> {
    if s.eq_ignore_ascii_case("t") || s.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if s.eq_ignore_ascii_case("f") || s.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        bail!(
            ErrorKind::MalformedRecord,
            "Invalid boolean value",
            format!("Boolean value must be 't', 'f', 'true' or 'false' (received: {s})")
        );
    }
}
