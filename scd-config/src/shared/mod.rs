//! Configuration types of the merger.

mod base;
mod connection;
mod merge;
mod merger;
mod tables;

pub use base::ValidationError;
pub use connection::{
    IntoConnectOptions, MERGER_CONNECTION_OPTIONS, PgConnectionConfig, PgConnectionOptions,
    TlsConfig,
};
pub use merge::{MergeConfig, MergeTargetConfig};
pub use merger::MergerConfig;
pub use tables::{ColumnConfig, ColumnType, TablesConfig};
