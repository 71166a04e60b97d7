use scd_config::load_config;
use scd_config::shared::MergerConfig;

use crate::error::{MergerError, MergerResult};

/// Loads and validates the merger configuration.
pub fn load_merger_config() -> MergerResult<MergerConfig> {
    let config = load_config::<MergerConfig>().map_err(MergerError::config)?;
    config.validate().map_err(MergerError::config)?;

    Ok(config)
}
