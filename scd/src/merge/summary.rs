use serde::Serialize;
use std::fmt;

/// The table representation a merge writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeTarget {
    /// Overwrite table keeping only the latest state.
    Scd1,
    /// Versioned table keeping every distinct state.
    Scd2,
}

impl MergeTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeTarget::Scd1 => "scd1",
            MergeTarget::Scd2 => "scd2",
        }
    }
}

impl fmt::Display for MergeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of merging one batch into one target.
///
/// Every record received is counted once as applied, unchanged or skipped, and every applied
/// record once as inserted, updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub target: MergeTarget,
    /// Change records in the batch.
    pub records_received: usize,
    /// Change records that produced at least one mutation.
    pub records_applied: usize,
    /// Rows created for entities with no live state.
    pub inserted: usize,
    /// Overwrites (SCD1) or close-and-reopen pairs (SCD2).
    pub updated: usize,
    /// Hard deletes (SCD1) or closes without successor (SCD2).
    pub deleted: usize,
    /// Changes whose payload matched the live state.
    pub unchanged: usize,
    /// Changes that were superseded, stale, or deletes of absent entities.
    pub skipped: usize,
}

impl MergeSummary {
    /// Returns `true` if the counters account for every record received.
    pub fn is_balanced(&self) -> bool {
        self.records_applied == self.inserted + self.updated + self.deleted
            && self.records_received == self.records_applied + self.unchanged + self.skipped
    }

    pub fn new(target: MergeTarget, records_received: usize) -> Self {
        Self {
            target,
            records_received,
            records_applied: 0,
            inserted: 0,
            updated: 0,
            deleted: 0,
            unchanged: 0,
            skipped: 0,
        }
    }
}

impl fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: received={} applied={} inserted={} updated={} deleted={} unchanged={} skipped={}",
            self.target,
            self.records_received,
            self.records_applied,
            self.inserted,
            self.updated,
            self.deleted,
            self.unchanged,
            self.skipped
        )
    }
}
