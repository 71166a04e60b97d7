use scd_config::shared::{IntoConnectOptions, MERGER_CONNECTION_OPTIONS, PgConnectionConfig};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

/// Connects a pool to the configured database with the merger's session settings.
pub async fn connect_to_database(
    config: &PgConnectionConfig,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    let options: PgConnectOptions = config.with_db(Some(&MERGER_CONNECTION_OPTIONS));

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}
