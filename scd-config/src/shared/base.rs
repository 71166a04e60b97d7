use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    #[error("`{0}` cannot be empty")]
    EmptyName(&'static str),
    #[error("table names must be distinct, `{0}` is used more than once")]
    DuplicateTableName(String),
    #[error("column `{0}` is declared more than once")]
    DuplicateColumn(String),
    #[error("at least one attribute column must be declared")]
    NoAttributes,
    #[error("at least one merge target must be selected")]
    NoTargets,
    #[error("`max_connections` cannot be zero")]
    MaxConnectionsZero,
}
