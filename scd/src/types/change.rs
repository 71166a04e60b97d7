use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::conversions::{parse_cell, parse_timestamp};
use crate::error::{ErrorKind, ScdError, ScdResult};
use crate::types::{
    AttributeType, Attributes, CHANGE_TS_COLUMN_NAME, CREATED_AT_COLUMN_NAME, Cell, EntitySchema,
    OPERATION_COLUMN_NAME, UPDATED_AT_COLUMN_NAME,
};
use crate::{bail, scd_error};

/// Identity of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityId(pub i64);

impl EntityId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = ScdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(EntityId).map_err(|err| {
            scd_error!(
                ErrorKind::MalformedRecord,
                "Invalid entity id",
                format!("`{s}` is not an integer entity id"),
                source: err
            )
        })
    }
}

/// CDC operation types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    /// Returns the single-letter code used in staged change rows.
    pub fn code(&self) -> &'static str {
        match self {
            Operation::Insert => "I",
            Operation::Update => "U",
            Operation::Delete => "D",
        }
    }
}

impl FromStr for Operation {
    type Err = ScdError;

    /// Accepts both the single-letter codes (`I`, `U`, `D`) and the full names
    /// (`INSERT`, `UPDATE`, `DELETE`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "I" | "INSERT" => Ok(Self::Insert),
            "U" | "UPDATE" => Ok(Self::Update),
            "D" | "DELETE" => Ok(Self::Delete),
            _ => Err(scd_error!(
                ErrorKind::MalformedRecord,
                "Invalid CDC operation",
                format!("`{s}` is not one of I, U, D, INSERT, UPDATE, DELETE")
            )),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A change row as produced by a change source, before validation.
///
/// Values are kept in their textual form and keyed by column name. A column that is absent and a
/// column holding SQL `NULL` are treated the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawChangeRow {
    fields: HashMap<String, Option<String>>,
}

impl RawChangeRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column value and returns the row, for building rows inline.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(column.into(), Some(value.into()));
        self
    }

    /// Sets a column value, `None` meaning SQL `NULL`.
    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        self.fields.insert(column.into(), value);
    }

    /// Returns the value of a column, or `None` if it is absent, null or blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.raw(column).filter(|value| !value.trim().is_empty())
    }

    /// Returns the value of an attribute column of the given type.
    ///
    /// Text is returned verbatim, so an empty string stays distinct from `NULL`. Blank values of
    /// any other type are `None`.
    pub fn attribute(&self, column: &str, data_type: AttributeType) -> Option<&str> {
        match data_type {
            AttributeType::Text => self.raw(column),
            _ => self.get(column),
        }
    }

    fn raw(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(|value| value.as_deref())
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for RawChangeRow
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, Option<V>)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(column, value)| (column.into(), value.map(Into::into)))
                .collect(),
        }
    }
}

/// A validated change to one entity.
///
/// Immutable once produced. The attribute payload is aligned with the [`EntitySchema`] it was
/// parsed against.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub entity_id: EntityId,
    pub attributes: Attributes,
    pub operation: Operation,
    /// Logical ordering key of the change.
    pub change_ts: NaiveDateTime,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl ChangeRecord {
    /// Validates a raw change row against the schema.
    ///
    /// The entity id, the operation and the change timestamp are required. Attributes and audit
    /// timestamps may be missing, in which case they are null, but must parse if present.
    pub fn from_raw(schema: &EntitySchema, row: &RawChangeRow) -> ScdResult<Self> {
        let entity_column = schema.entity_column();
        let Some(entity_id) = row.get(entity_column) else {
            bail!(
                ErrorKind::MalformedRecord,
                "Missing entity id",
                format!("column `{entity_column}` is missing or null")
            );
        };
        let entity_id: EntityId = entity_id.parse()?;

        let Some(operation) = row.get(OPERATION_COLUMN_NAME) else {
            bail!(
                ErrorKind::MalformedRecord,
                "Missing CDC operation",
                format!("entity {entity_id}: column `{OPERATION_COLUMN_NAME}` is missing or null")
            );
        };
        let operation: Operation = operation.parse()?;

        let Some(change_ts) = row.get(CHANGE_TS_COLUMN_NAME) else {
            bail!(
                ErrorKind::MalformedRecord,
                "Missing change timestamp",
                format!("entity {entity_id}: column `{CHANGE_TS_COLUMN_NAME}` is missing or null")
            );
        };
        let change_ts = parse_timestamp(change_ts)?;

        let mut values = Vec::with_capacity(schema.attribute_count());
        for column in schema.attribute_columns() {
            let cell = match row.attribute(&column.name, column.data_type) {
                Some(value) => parse_cell(value, column.data_type)?,
                None => Cell::Null,
            };
            values.push(cell);
        }

        let created_at = row
            .get(CREATED_AT_COLUMN_NAME)
            .map(parse_timestamp)
            .transpose()?;
        let updated_at = row
            .get(UPDATED_AT_COLUMN_NAME)
            .map(parse_timestamp)
            .transpose()?;

        Ok(Self {
            entity_id,
            attributes: Attributes::new(values),
            operation,
            change_ts,
            created_at,
            updated_at,
        })
    }
}
