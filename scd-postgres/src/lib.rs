//! Postgres adapter for the SCD merge engines.
//!
//! Provides the table DDL, a [`store::PostgresScdStore`] implementing both target store traits
//! with one transaction per mutation list, and a [`source::PostgresChangeSource`] reading the
//! stage table.

pub mod cells;
pub mod db;
pub mod error;
pub mod source;
pub mod store;
pub mod tables;
#[cfg(feature = "test-utils")]
pub mod test_utils;
