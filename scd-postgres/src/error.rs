use scd::error::{ErrorKind, ScdError};
use scd::scd_error;

/// Converts a [`sqlx::Error`] into an [`ScdError`].
///
/// Connection and pool failures map to [`ErrorKind::StoreUnavailable`] since retrying them may
/// succeed. Everything else, database errors included, maps to [`ErrorKind::StoreQueryFailed`].
pub fn store_error(err: sqlx::Error) -> ScdError {
    let kind = match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => ErrorKind::StoreUnavailable,
        _ => ErrorKind::StoreQueryFailed,
    };

    let detail = err.to_string();
    scd_error!(kind, "Database operation failed", detail = detail, source: err)
}
