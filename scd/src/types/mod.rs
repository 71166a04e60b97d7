//! Core data types shared by the deduplicator, the merge engines and the stores.
//!
//! Includes the attribute value model, the per-deployment entity schema, change records as
//! produced by a change source, and the rows held by the SCD1 and SCD2 targets.

mod cell;
mod change;
mod record;
mod schema;

pub use cell::*;
pub use change::*;
pub use record::*;
pub use schema::*;
