//! Conversions from the textual form produced by change sources into typed values.

mod bool;
mod time;

pub use bool::parse_bool;
pub use time::parse_timestamp;

use chrono::NaiveDate;

use crate::error::{ErrorKind, ScdResult};
use crate::scd_error;
use crate::types::{AttributeType, Cell};

/// Parses the textual representation of a value into a [`Cell`] of the given type.
pub fn parse_cell(value: &str, data_type: AttributeType) -> ScdResult<Cell> {
    let trimmed = value.trim();

    let cell = match data_type {
        AttributeType::Text => Cell::String(value.to_string()),
        AttributeType::Integer => Cell::I64(trimmed.parse().map_err(|err| {
            scd_error!(
                ErrorKind::MalformedRecord,
                "Invalid integer value",
                format!("`{value}` is not an integer"),
                source: err
            )
        })?),
        AttributeType::Float => Cell::F64(trimmed.parse().map_err(|err| {
            scd_error!(
                ErrorKind::MalformedRecord,
                "Invalid float value",
                format!("`{value}` is not a float"),
                source: err
            )
        })?),
        AttributeType::Boolean => Cell::Bool(parse_bool(trimmed)?),
        AttributeType::Date => {
            Cell::Date(NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|err| {
                scd_error!(
                    ErrorKind::MalformedRecord,
                    "Invalid date value",
                    format!("`{value}` is not a date"),
                    source: err
                )
            })?)
        }
        AttributeType::Timestamp => Cell::Timestamp(parse_timestamp(trimmed)?),
    };

    Ok(cell)
}
