use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

use crate::types::AttributeType;

/// A single attribute value.
///
/// [`Cell`] is the value model used for attribute payloads. Every variant corresponds to one
/// [`AttributeType`], except [`Cell::Null`] which is valid for every type.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Cell {
    /// Returns `true` if the cell holds no value.
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns `true` if the cell can be stored in a column of the given type.
    pub fn matches_type(&self, data_type: AttributeType) -> bool {
        matches!(
            (self, data_type),
            (Cell::Null, _)
                | (Cell::Bool(_), AttributeType::Boolean)
                | (Cell::I64(_), AttributeType::Integer)
                | (Cell::F64(_), AttributeType::Float)
                | (Cell::String(_), AttributeType::Text)
                | (Cell::Date(_), AttributeType::Date)
                | (Cell::Timestamp(_), AttributeType::Timestamp)
        )
    }

    /// Null-safe distinctness with the semantics of SQL `IS DISTINCT FROM`.
    ///
    /// Two nulls are not distinct, a null and a value are. Floats compare numerically, except
    /// that `NaN` is not distinct from `NaN`, so a re-delivered `NaN` never counts as a change.
    pub fn is_distinct_from(&self, other: &Cell) -> bool {
        match (self, other) {
            (Cell::F64(a), Cell::F64(b)) => !(a == b || (a.is_nan() && b.is_nan())),
            _ => self != other,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            Cell::Bool(value) => write!(f, "{value}"),
            Cell::I64(value) => write!(f, "{value}"),
            Cell::F64(value) => write!(f, "{value}"),
            Cell::String(value) => write!(f, "{value}"),
            Cell::Date(value) => write!(f, "{value}"),
            Cell::Timestamp(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl<T> From<Option<T>> for Cell
where
    T: Into<Cell>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}
