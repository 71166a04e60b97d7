//! Testing utilities for merge engines and stores.
//!
//! - [`fixtures`] builds a customer schema and change rows in the shape of a staging table.
//! - [`faulty_store`] wraps a store and fails its apply calls on demand.
//! - [`history`] checks the versioned history left behind by a merge.

pub mod faulty_store;
pub mod fixtures;
pub mod history;
