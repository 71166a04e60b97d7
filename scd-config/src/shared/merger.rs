use serde::Deserialize;

use crate::Config;
use crate::shared::{MergeConfig, PgConnectionConfig, TablesConfig, ValidationError};

/// Top-level configuration of the merger binary.
#[derive(Debug, Clone, Deserialize)]
pub struct MergerConfig {
    pub database: PgConnectionConfig,
    pub tables: TablesConfig,
    #[serde(default)]
    pub merge: MergeConfig,
}

impl MergerConfig {
    /// Validates every section, stopping at the first invalid one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.tables.validate()?;
        self.merge.validate()
    }
}

impl Config for MergerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["merge.targets"];
}
