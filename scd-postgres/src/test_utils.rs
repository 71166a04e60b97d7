use scd::test_utils::fixtures::customer_schema;
use scd_config::shared::{IntoConnectOptions, PgConnectionConfig, TlsConfig};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

use crate::tables::{ScdTables, create_tables};

/// Schema holding the tables of every test database.
pub const TEST_DATABASE_SCHEMA: &str = "scd_test";

/// Builds the connection config of a fresh, uniquely named test database.
///
/// Reads `TESTS_DATABASE_HOST`, `TESTS_DATABASE_PORT`, `TESTS_DATABASE_USERNAME` and optionally
/// `TESTS_DATABASE_PASSWORD`.
///
/// # Panics
///
/// Panics if a required variable is missing.
pub fn local_pg_connection_config() -> PgConnectionConfig {
    PgConnectionConfig {
        host: std::env::var("TESTS_DATABASE_HOST").expect("TESTS_DATABASE_HOST must be set"),
        port: std::env::var("TESTS_DATABASE_PORT")
            .expect("TESTS_DATABASE_PORT must be set")
            .parse()
            .expect("TESTS_DATABASE_PORT must be a valid port number"),
        name: format!("scd_test_{}", Uuid::new_v4().simple()),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .expect("TESTS_DATABASE_USERNAME must be set"),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(Into::into),
        tls: TlsConfig::disabled(),
    }
}

/// A throwaway database with the customer tables created.
pub struct TestDatabase {
    pub config: PgConnectionConfig,
    pub pool: PgPool,
    pub tables: ScdTables,
}

impl TestDatabase {
    /// Creates the database and the customer stage and target tables.
    ///
    /// # Panics
    ///
    /// Panics if the database or the tables cannot be created.
    pub async fn spawn() -> Self {
        let config = local_pg_connection_config();

        let mut connection = PgConnection::connect_with(&config.without_db(None))
            .await
            .expect("Failed to connect to Postgres");
        connection
            .execute(&*format!(r#"create database "{}";"#, config.name))
            .await
            .expect("Failed to create database");

        let pool = crate::db::connect_to_database(&config, 2)
            .await
            .expect("Failed to connect to test database");

        let tables = ScdTables::new(
            TEST_DATABASE_SCHEMA,
            "cdc_stage",
            "scd1_target",
            "scd2_target",
            customer_schema(),
        )
        .expect("Failed to build customer tables");
        create_tables(&pool, &tables)
            .await
            .expect("Failed to create customer tables");

        Self {
            config,
            pool,
            tables,
        }
    }

    /// Closes the pool and drops the database.
    ///
    /// Cleanup failures are printed rather than raised.
    pub async fn cleanup(self) {
        self.pool.close().await;

        let mut connection = match PgConnection::connect_with(&self.config.without_db(None)).await
        {
            Ok(connection) => connection,
            Err(err) => {
                eprintln!("warning: failed to connect to Postgres for cleanup: {err}");
                return;
            }
        };

        if let Err(err) = connection
            .execute(&*format!(
                r#"drop database if exists "{}" with (force);"#,
                self.config.name
            ))
            .await
        {
            eprintln!(
                "warning: failed to drop database {}: {err}",
                self.config.name
            );
        }
    }
}
