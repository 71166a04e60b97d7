use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// A target table representation the merger can write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeTargetConfig {
    Scd1,
    Scd2,
}

fn default_targets() -> Vec<MergeTargetConfig> {
    vec![MergeTargetConfig::Scd1, MergeTargetConfig::Scd2]
}

fn default_max_connections() -> u32 {
    4
}

/// Behavior of one merger run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Targets written by default. Both when omitted.
    #[serde(default = "default_targets")]
    pub targets: Vec<MergeTargetConfig>,
    /// Creates the schema and tables if they are missing before merging.
    #[serde(default)]
    pub create_tables: bool,
    /// Empties the stage table once every selected target merged successfully.
    #[serde(default)]
    pub clear_stage_after_merge: bool,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            create_tables: false,
            clear_stage_after_merge: false,
            max_connections: default_max_connections(),
        }
    }
}

impl MergeConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.targets.is_empty() {
            return Err(ValidationError::NoTargets);
        }

        if self.max_connections == 0 {
            return Err(ValidationError::MaxConnectionsZero);
        }

        Ok(())
    }
}
