//! Merges batches of CDC events into slowly changing dimension tables.
//!
//! A change batch can be applied to two representations of the same entity:
//!
//! - an overwrite table (SCD1) holding only the latest state of every entity;
//! - a versioned table (SCD2) holding every distinct state with `[effective_from, effective_to)`
//!   validity intervals.
//!
//! # Architecture
//!
//! A [`source::ChangeSource`] produces raw rows which [`batch::ChangeBatch::parse`] validates
//! against the deployment's [`types::EntitySchema`]. The batch is then projected per entity, as
//! the latest change for [`merge::Scd1MergeEngine`] and as the full time-ordered sequence for
//! [`merge::Scd2MergeEngine`]. Engines plan all mutations in memory and hand them to their store
//! in a single atomic call.
//!
//! # Usage
//!
//! ```rust,no_run
//! use scd::batch::ChangeBatch;
//! use scd::merge::{Scd1MergeEngine, Scd2MergeEngine};
//! use scd::source::{ChangeSource, MemoryChangeSource};
//! use scd::store::memory::MemoryStore;
//! use scd::types::{AttributeColumn, AttributeType, EntitySchema, RawChangeRow};
//!
//! # async fn run() -> scd::error::ScdResult<()> {
//! let schema = EntitySchema::new(
//!     "customer_id",
//!     vec![
//!         AttributeColumn::new("name", AttributeType::Text),
//!         AttributeColumn::new("city", AttributeType::Text),
//!     ],
//! )?;
//!
//! let source = MemoryChangeSource::new(vec![
//!     RawChangeRow::new()
//!         .with("customer_id", "1")
//!         .with("name", "Asha")
//!         .with("city", "Pune")
//!         .with("op", "I")
//!         .with("change_ts", "2023-07-02 10:00:00"),
//! ]);
//! let batch: ChangeBatch = source.read_batch(&schema).await?;
//!
//! let store = MemoryStore::new();
//! Scd1MergeEngine::new(schema.clone(), store.clone()).merge(&batch).await?;
//! Scd2MergeEngine::new(schema, store).merge(&batch).await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod conversions;
pub mod error;
mod macros;
pub mod merge;
pub mod metrics;
pub mod snapshot;
pub mod source;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
