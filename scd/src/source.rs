//! Change sources produce the raw rows of one CDC batch.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::batch::ChangeBatch;
use crate::error::ScdResult;
use crate::types::{EntitySchema, RawChangeRow};

/// Trait for reading the raw change rows of one batch.
///
/// Rows come back unvalidated and in source order, which decides between changes of one entity
/// that share a timestamp. Validation happens in [`ChangeBatch::parse`], so that one bad row
/// rejects the whole batch regardless of where it was read from.
pub trait ChangeSource {
    /// Reads all pending change rows.
    fn read_changes(&self) -> impl Future<Output = ScdResult<Vec<RawChangeRow>>> + Send;

    /// Reads all pending change rows and validates them into a batch.
    fn read_batch(
        &self,
        schema: &EntitySchema,
    ) -> impl Future<Output = ScdResult<ChangeBatch>> + Send
    where
        Self: Sync,
    {
        async move {
            let rows = self.read_changes().await?;
            ChangeBatch::parse(schema, &rows)
        }
    }
}

/// In-memory change source.
///
/// Useful for tests and for callers that already hold their change rows in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryChangeSource {
    rows: Arc<Mutex<Vec<RawChangeRow>>>,
}

impl MemoryChangeSource {
    pub fn new(rows: Vec<RawChangeRow>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
        }
    }

    /// Appends rows to the source.
    pub async fn push(&self, rows: impl IntoIterator<Item = RawChangeRow>) {
        self.rows.lock().await.extend(rows);
    }

    /// Removes all rows from the source.
    pub async fn clear(&self) {
        self.rows.lock().await.clear();
    }
}

impl ChangeSource for MemoryChangeSource {
    async fn read_changes(&self) -> ScdResult<Vec<RawChangeRow>> {
        Ok(self.rows.lock().await.clone())
    }
}
