//! Metrics definitions for merge monitoring.

/// Label for the merge target (`scd1` or `scd2`) in metrics.
pub const TARGET_LABEL: &str = "target";

/// Label for the kind of mutation in metrics.
pub const MUTATION_LABEL: &str = "mutation";

/// Label for error kind in metrics.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Counter for change records received by a merge engine.
pub const SCD_RECORDS_RECEIVED_TOTAL: &str = "scd_records_received_total";

/// Counter for change records skipped as stale or no-op.
pub const SCD_RECORDS_SKIPPED_TOTAL: &str = "scd_records_skipped_total";

/// Counter for mutations applied to a target store.
pub const SCD_MUTATIONS_APPLIED_TOTAL: &str = "scd_mutations_applied_total";

/// Counter for batches that failed to merge.
pub const SCD_BATCHES_FAILED_TOTAL: &str = "scd_batches_failed_total";

/// Histogram for the time spent merging one batch.
pub const SCD_MERGE_DURATION_SECONDS: &str = "scd_merge_duration_seconds";
