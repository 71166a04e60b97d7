use std::collections::HashSet;
use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, ScdResult};
use crate::types::Cell;

/// Operation column name in change rows.
pub const OPERATION_COLUMN_NAME: &str = "op";
/// Change timestamp column name in change rows.
pub const CHANGE_TS_COLUMN_NAME: &str = "change_ts";
/// Audit column holding the creation timestamp.
pub const CREATED_AT_COLUMN_NAME: &str = "created_at";
/// Audit column holding the last update timestamp.
pub const UPDATED_AT_COLUMN_NAME: &str = "updated_at";
/// Surrogate key column name of versioned tables.
pub const SURROGATE_KEY_COLUMN_NAME: &str = "surrogate_id";
/// Inclusive start of a version's validity interval.
pub const EFFECTIVE_FROM_COLUMN_NAME: &str = "effective_from";
/// Exclusive end of a version's validity interval.
pub const EFFECTIVE_TO_COLUMN_NAME: &str = "effective_to";
/// Flag marking the current version of an entity.
pub const IS_CURRENT_COLUMN_NAME: &str = "is_current";

/// Column names with a fixed meaning that attributes may not reuse.
pub const RESERVED_COLUMN_NAMES: &[&str] = &[
    OPERATION_COLUMN_NAME,
    CHANGE_TS_COLUMN_NAME,
    CREATED_AT_COLUMN_NAME,
    UPDATED_AT_COLUMN_NAME,
    SURROGATE_KEY_COLUMN_NAME,
    EFFECTIVE_FROM_COLUMN_NAME,
    EFFECTIVE_TO_COLUMN_NAME,
    IS_CURRENT_COLUMN_NAME,
];

/// Declared type of an attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeType::Text => "text",
            AttributeType::Integer => "integer",
            AttributeType::Float => "float",
            AttributeType::Boolean => "boolean",
            AttributeType::Date => "date",
            AttributeType::Timestamp => "timestamp",
        };

        f.write_str(name)
    }
}

/// A named, typed attribute column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeColumn {
    pub name: String,
    pub data_type: AttributeType,
}

impl AttributeColumn {
    pub fn new(name: impl Into<String>, data_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// The attribute payload of an entity, positionally aligned with an [`EntitySchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    values: Vec<Cell>,
}

impl Attributes {
    /// Creates a payload without checking it against a schema.
    ///
    /// Use [`EntitySchema::attributes`] when the values come from outside the crate.
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Returns a payload of `len` nulls.
    pub fn nulls(len: usize) -> Self {
        Self {
            values: vec![Cell::Null; len],
        }
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The fixed shape of the entity being tracked: its identity column and its attribute list.
///
/// The schema is declared once per deployment and drives both parsing of change rows and change
/// detection. Change detection compares exactly the declared attributes, by name and in order,
/// never an ad-hoc set of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    entity_column: String,
    attributes: Vec<AttributeColumn>,
}

impl EntitySchema {
    /// Creates a schema after checking that all column names are non-empty and unique and do not
    /// collide with the reserved change and versioning columns.
    pub fn new(
        entity_column: impl Into<String>,
        attributes: Vec<AttributeColumn>,
    ) -> ScdResult<Self> {
        let entity_column = entity_column.into();

        let mut seen = HashSet::with_capacity(attributes.len() + 1);
        for name in std::iter::once(entity_column.as_str())
            .chain(attributes.iter().map(|column| column.name.as_str()))
        {
            if name.trim().is_empty() {
                bail!(ErrorKind::ConfigError, "Empty column name in entity schema");
            }

            if RESERVED_COLUMN_NAMES.contains(&name) {
                bail!(
                    ErrorKind::ConfigError,
                    "Reserved column name in entity schema",
                    format!("column `{name}` is reserved")
                );
            }

            if !seen.insert(name) {
                bail!(
                    ErrorKind::ConfigError,
                    "Duplicate column name in entity schema",
                    format!("column `{name}` is declared more than once")
                );
            }
        }

        Ok(Self {
            entity_column,
            attributes,
        })
    }

    /// Returns the name of the identity column.
    pub fn entity_column(&self) -> &str {
        &self.entity_column
    }

    /// Returns the declared attribute columns in payload order.
    pub fn attribute_columns(&self) -> &[AttributeColumn] {
        &self.attributes
    }

    /// Returns the number of declared attributes.
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Builds a payload from values, checking arity and value types against the schema.
    pub fn attributes(&self, values: Vec<Cell>) -> ScdResult<Attributes> {
        if values.len() != self.attributes.len() {
            bail!(
                ErrorKind::MalformedRecord,
                "Attribute count does not match the schema",
                format!(
                    "expected {} attributes, received {}",
                    self.attributes.len(),
                    values.len()
                )
            );
        }

        for (column, value) in self.attributes.iter().zip(&values) {
            if !value.matches_type(column.data_type) {
                bail!(
                    ErrorKind::MalformedRecord,
                    "Attribute value does not match its declared type",
                    format!(
                        "attribute `{}` is declared as {} but received {value:?}",
                        column.name, column.data_type
                    )
                );
            }
        }

        Ok(Attributes::new(values))
    }

    /// Returns the names of the attributes whose values are distinct between two payloads.
    ///
    /// Comparison is null-safe (see [`Cell::is_distinct_from`]). A value missing on one side is
    /// compared as null.
    pub fn changed_attributes<'a>(
        &'a self,
        current: &Attributes,
        incoming: &Attributes,
    ) -> Vec<&'a str> {
        self.attributes
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                let current = current.get(*index).unwrap_or(&Cell::Null);
                let incoming = incoming.get(*index).unwrap_or(&Cell::Null);
                current.is_distinct_from(incoming)
            })
            .map(|(_, column)| column.name.as_str())
            .collect()
    }

    /// Returns `true` if any declared attribute differs between the two payloads.
    pub fn has_changes(&self, current: &Attributes, incoming: &Attributes) -> bool {
        (0..self.attributes.len()).any(|index| {
            let current = current.get(index).unwrap_or(&Cell::Null);
            let incoming = incoming.get(index).unwrap_or(&Cell::Null);
            current.is_distinct_from(incoming)
        })
    }
}
