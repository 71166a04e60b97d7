use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::batch::ChangeBatch;
use crate::error::ScdResult;
use crate::merge::{MergeSummary, MergeTarget, record_merge_metrics};
use crate::store::{Scd1Mutation, Scd1Store};
use crate::types::{ChangeRecord, EntityId, EntitySchema, Operation, Scd1Record};

/// Applies change batches to the overwrite (SCD1) table.
///
/// Only the latest change of every entity in a batch is kept. Inserts and updates are upserts
/// that overwrite every attribute and `updated_at` while preserving `created_at`; deletes remove
/// the row. A change older than the `change_ts` stored on the row is stale and skipped.
#[derive(Debug, Clone)]
pub struct Scd1MergeEngine<S> {
    schema: EntitySchema,
    store: S,
}

impl<S> Scd1MergeEngine<S>
where
    S: Scd1Store,
{
    pub fn new(schema: EntitySchema, store: S) -> Self {
        Self { schema, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Merges a batch and returns what it changed.
    ///
    /// Nothing is written if reading the current state or applying the mutations fails.
    pub async fn merge(&self, batch: &ChangeBatch) -> ScdResult<MergeSummary> {
        info!(records = batch.len(), "starting scd1 merge");

        let started = Instant::now();
        let result = self.try_merge(batch).await;
        record_merge_metrics(MergeTarget::Scd1, started, &result);

        let (summary, _) = result?;
        info!(
            received = summary.records_received,
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            "scd1 merge completed"
        );

        Ok(summary)
    }

    async fn try_merge(&self, batch: &ChangeBatch) -> ScdResult<(MergeSummary, u64)> {
        let mut summary = MergeSummary::new(MergeTarget::Scd1, batch.len());
        if batch.is_empty() {
            return Ok((summary, 0));
        }

        let latest = batch.latest_per_entity();
        summary.skipped = batch.len() - latest.len();

        let entity_ids: Vec<_> = latest.iter().map(|record| record.entity_id).collect();
        let existing: HashMap<EntityId, Scd1Record> = self
            .store
            .get_scd1_records(&entity_ids)
            .await?
            .into_iter()
            .map(|record| (record.entity_id, record))
            .collect();

        let mutations = self.plan(&latest, &existing, &mut summary);
        if mutations.is_empty() {
            debug!("scd1 batch produced no mutations");
            return Ok((summary, 0));
        }

        let applied = self.store.apply_scd1_mutations(mutations).await?;

        Ok((summary, applied))
    }

    /// Plans the mutations for the latest change of every entity.
    ///
    /// Deletes are emitted ahead of upserts. After collapsing there is a single change per entity,
    /// so this ordering only matters to stores that apply mutations statement by statement.
    fn plan(
        &self,
        latest: &[&ChangeRecord],
        existing: &HashMap<EntityId, Scd1Record>,
        summary: &mut MergeSummary,
    ) -> Vec<Scd1Mutation> {
        let mut deletes = Vec::new();
        let mut upserts = Vec::new();

        for record in latest {
            let entity_id = record.entity_id;
            let current = existing.get(&entity_id);

            if let Some(current) = current
                && record.change_ts < current.change_ts
            {
                warn!(
                    %entity_id,
                    change_ts = %record.change_ts,
                    stored_change_ts = %current.change_ts,
                    "skipping stale scd1 change older than the stored row"
                );
                summary.skipped += 1;
                continue;
            }

            match (record.operation, current) {
                (Operation::Delete, Some(_)) => {
                    debug!(%entity_id, "deleting scd1 row");
                    deletes.push(Scd1Mutation::Delete(entity_id));
                    summary.deleted += 1;
                }
                (Operation::Delete, None) => {
                    debug!(%entity_id, "skipping delete of absent scd1 row");
                    summary.skipped += 1;
                }
                (Operation::Insert | Operation::Update, Some(current)) => {
                    if !self.schema.has_changes(&current.attributes, &record.attributes)
                        && current.updated_at == record.updated_at
                    {
                        summary.unchanged += 1;
                        continue;
                    }

                    let changed = self
                        .schema
                        .changed_attributes(&current.attributes, &record.attributes);
                    debug!(%entity_id, ?changed, "overwriting scd1 row");
                    upserts.push(Scd1Mutation::Update {
                        entity_id,
                        attributes: record.attributes.clone(),
                        change_ts: record.change_ts,
                        updated_at: record.updated_at,
                    });
                    summary.updated += 1;
                }
                (Operation::Insert | Operation::Update, None) => {
                    debug!(%entity_id, "inserting scd1 row");
                    upserts.push(Scd1Mutation::Insert(Scd1Record {
                        entity_id,
                        attributes: record.attributes.clone(),
                        change_ts: record.change_ts,
                        created_at: record.created_at,
                        updated_at: record.updated_at,
                    }));
                    summary.inserted += 1;
                }
            }
        }

        summary.records_applied = summary.inserted + summary.updated + summary.deleted;

        deletes.extend(upserts);
        deletes
    }
}
