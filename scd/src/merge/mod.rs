//! Merge engines projecting a change batch onto the SCD1 and SCD2 targets.
//!
//! Both engines follow the same shape: read the stored state of the entities in the batch, plan
//! every mutation in memory, then submit the whole plan to the store in one atomic call. A batch
//! therefore either lands completely or not at all.

mod scd1;
mod scd2;
mod summary;

pub use scd1::Scd1MergeEngine;
pub use scd2::{Scd2MergeEngine, check_version_chain};
pub use summary::{MergeSummary, MergeTarget};

use metrics::{counter, histogram};
use std::time::Instant;

use crate::error::ScdResult;
use crate::metrics::{
    ERROR_KIND_LABEL, SCD_BATCHES_FAILED_TOTAL, SCD_MERGE_DURATION_SECONDS,
    SCD_MUTATIONS_APPLIED_TOTAL, SCD_RECORDS_RECEIVED_TOTAL, SCD_RECORDS_SKIPPED_TOTAL,
    TARGET_LABEL,
};

/// Records the metrics of one finished merge or snapshot load.
pub(crate) fn record_merge_metrics(
    target: MergeTarget,
    started: Instant,
    result: &ScdResult<(MergeSummary, u64)>,
) {
    histogram!(SCD_MERGE_DURATION_SECONDS, TARGET_LABEL => target.as_str())
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok((summary, mutations)) => {
            counter!(SCD_RECORDS_RECEIVED_TOTAL, TARGET_LABEL => target.as_str())
                .increment(summary.records_received as u64);
            counter!(SCD_RECORDS_SKIPPED_TOTAL, TARGET_LABEL => target.as_str())
                .increment(summary.skipped as u64);
            counter!(SCD_MUTATIONS_APPLIED_TOTAL, TARGET_LABEL => target.as_str())
                .increment(*mutations);
        }
        Err(err) => {
            counter!(
                SCD_BATCHES_FAILED_TOTAL,
                TARGET_LABEL => target.as_str(),
                ERROR_KIND_LABEL => format!("{:?}", err.kind())
            )
            .increment(1);
        }
    }
}
