use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::shared::ValidationError;

fn default_schema() -> String {
    "public".to_string()
}

/// Declared type of an attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
}

/// An attribute column of the tracked entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

/// Names of the stage and target tables and the shape of the tracked entity.
///
/// All three tables live in the same schema. The entity column and the attribute list are shared
/// by the stage table and both targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablesConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Table the change rows are staged in.
    pub stage_table: String,
    /// Overwrite target.
    pub scd1_table: String,
    /// Versioned target.
    pub scd2_table: String,
    /// Source table holding the state of every entity before change capture started. Only read
    /// when a snapshot load is requested.
    #[serde(default)]
    pub snapshot_table: Option<String>,
    pub entity_column: String,
    pub attributes: Vec<ColumnConfig>,
}

impl TablesConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let names = [
            ("tables.schema", &self.schema),
            ("tables.stage_table", &self.stage_table),
            ("tables.scd1_table", &self.scd1_table),
            ("tables.scd2_table", &self.scd2_table),
            ("tables.entity_column", &self.entity_column),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyName(key));
            }
        }

        if let Some(snapshot_table) = &self.snapshot_table
            && snapshot_table.trim().is_empty()
        {
            return Err(ValidationError::EmptyName("tables.snapshot_table"));
        }

        let mut tables = HashSet::new();
        for table in [&self.stage_table, &self.scd1_table, &self.scd2_table]
            .into_iter()
            .chain(&self.snapshot_table)
        {
            if !tables.insert(table) {
                return Err(ValidationError::DuplicateTableName(table.clone()));
            }
        }

        if self.attributes.is_empty() {
            return Err(ValidationError::NoAttributes);
        }

        let mut columns = HashSet::from([self.entity_column.as_str()]);
        for column in &self.attributes {
            if column.name.trim().is_empty() {
                return Err(ValidationError::EmptyName("tables.attributes.name"));
            }
            if !columns.insert(column.name.as_str()) {
                return Err(ValidationError::DuplicateColumn(column.name.clone()));
            }
        }

        Ok(())
    }
}
