//! Initial load of a source table into empty targets.
//!
//! A snapshot is the state of every entity at the time change capture started. Each entity gets
//! an SCD1 row and an open SCD2 version starting at its `created_at`, so that later change batches
//! continue its history.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use crate::batch::row_error;
use crate::{bail, scd_error};
use crate::conversions::{parse_cell, parse_timestamp};
use crate::error::{ErrorKind, ScdResult};
use crate::merge::{MergeSummary, MergeTarget, record_merge_metrics};
use crate::store::{Scd1Mutation, Scd1Store, Scd2Mutation, Scd2Store};
use crate::types::{
    Attributes, CREATED_AT_COLUMN_NAME, Cell, EntityId, EntitySchema, NewScd2Version,
    RawChangeRow, Scd1Record, UPDATED_AT_COLUMN_NAME,
};

/// The state of one entity in a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub entity_id: EntityId,
    pub attributes: Attributes,
    /// Start of the entity's first version.
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

impl SnapshotRecord {
    /// Validates a raw source row. The entity id and `created_at` are required.
    pub fn from_raw(schema: &EntitySchema, row: &RawChangeRow) -> ScdResult<Self> {
        let entity_column = schema.entity_column();
        let Some(entity_id) = row.get(entity_column) else {
            bail!(
                ErrorKind::MalformedRecord,
                "Missing entity id",
                format!("column `{entity_column}` is missing or null")
            );
        };
        let entity_id: EntityId = entity_id.parse()?;

        let Some(created_at) = row.get(CREATED_AT_COLUMN_NAME) else {
            bail!(
                ErrorKind::MalformedRecord,
                "Missing creation timestamp",
                format!("entity {entity_id}: column `{CREATED_AT_COLUMN_NAME}` is missing or null")
            );
        };
        let created_at = parse_timestamp(created_at)?;
        let updated_at = row
            .get(UPDATED_AT_COLUMN_NAME)
            .map(parse_timestamp)
            .transpose()?;

        let mut values = Vec::with_capacity(schema.attribute_count());
        for column in schema.attribute_columns() {
            values.push(match row.attribute(&column.name, column.data_type) {
                Some(value) => parse_cell(value, column.data_type)?,
                None => Cell::Null,
            });
        }

        Ok(Self {
            entity_id,
            attributes: Attributes::new(values),
            created_at,
            updated_at,
        })
    }
}

/// A validated snapshot holding at most one record per entity, ordered by entity id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: Vec<SnapshotRecord>,
}

impl Snapshot {
    /// Validates every source row.
    ///
    /// Like [`crate::batch::ChangeBatch::parse`], one invalid row rejects the whole snapshot. An
    /// entity appearing twice is invalid as well.
    pub fn parse(schema: &EntitySchema, rows: &[RawChangeRow]) -> ScdResult<Self> {
        let mut records = Vec::with_capacity(rows.len());
        let mut positions = HashMap::new();
        let mut errors = Vec::new();

        for (position, row) in rows.iter().enumerate() {
            let record = match SnapshotRecord::from_raw(schema, row) {
                Ok(record) => record,
                Err(err) => {
                    errors.push(row_error(position, err));
                    continue;
                }
            };

            if let Some(first) = positions.insert(record.entity_id, position) {
                errors.push(row_error(
                    position,
                    scd_error!(
                        ErrorKind::MalformedRecord,
                        "Duplicate entity in snapshot",
                        format!("entity {} already appears in row {first}", record.entity_id)
                    ),
                ));
                continue;
            }
            records.push(record);
        }

        if !errors.is_empty() {
            debug!(
                rows = rows.len(),
                rejected = errors.len(),
                "rejecting snapshot with malformed rows"
            );
            return Err(errors.into());
        }

        records.sort_by_key(|record| record.entity_id);

        Ok(Self { records })
    }

    pub fn records(&self) -> &[SnapshotRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn entity_ids(&self) -> Vec<EntityId> {
        self.records.iter().map(|record| record.entity_id).collect()
    }
}

/// Loads a snapshot into the targets.
///
/// Entities that already have rows in a target are skipped there, so loading the same snapshot
/// twice changes nothing. Each target is written in one atomic store call.
#[derive(Debug, Clone)]
pub struct SnapshotLoader<S> {
    store: S,
}

impl<S> SnapshotLoader<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> SnapshotLoader<S>
where
    S: Scd1Store,
{
    /// Inserts one SCD1 row per entity, stamped with the entity's `created_at` as `change_ts`.
    pub async fn load_scd1(&self, snapshot: &Snapshot) -> ScdResult<MergeSummary> {
        let started = Instant::now();
        let result = self.try_load_scd1(snapshot).await;
        record_merge_metrics(MergeTarget::Scd1, started, &result);

        let (summary, _) = result?;
        info!(
            received = summary.records_received,
            inserted = summary.inserted,
            skipped = summary.skipped,
            "scd1 snapshot loaded"
        );

        Ok(summary)
    }

    async fn try_load_scd1(&self, snapshot: &Snapshot) -> ScdResult<(MergeSummary, u64)> {
        let mut summary = MergeSummary::new(MergeTarget::Scd1, snapshot.len());
        if snapshot.is_empty() {
            return Ok((summary, 0));
        }

        let loaded: HashSet<EntityId> = self
            .store
            .get_scd1_records(&snapshot.entity_ids())
            .await?
            .into_iter()
            .map(|record| record.entity_id)
            .collect();

        let mutations: Vec<_> = snapshot
            .records()
            .iter()
            .filter(|record| !loaded.contains(&record.entity_id))
            .map(|record| {
                Scd1Mutation::Insert(Scd1Record {
                    entity_id: record.entity_id,
                    attributes: record.attributes.clone(),
                    change_ts: record.created_at,
                    created_at: Some(record.created_at),
                    updated_at: record.updated_at,
                })
            })
            .collect();

        summary.inserted = mutations.len();
        summary.records_applied = mutations.len();
        summary.skipped = loaded.len();
        if mutations.is_empty() {
            return Ok((summary, 0));
        }

        let applied = self.store.apply_scd1_mutations(mutations).await?;

        Ok((summary, applied))
    }
}

impl<S> SnapshotLoader<S>
where
    S: Scd2Store,
{
    /// Appends one open version per entity, effective from the entity's `created_at`.
    pub async fn load_scd2(&self, snapshot: &Snapshot) -> ScdResult<MergeSummary> {
        let started = Instant::now();
        let result = self.try_load_scd2(snapshot).await;
        record_merge_metrics(MergeTarget::Scd2, started, &result);

        let (summary, _) = result?;
        info!(
            received = summary.records_received,
            inserted = summary.inserted,
            skipped = summary.skipped,
            "scd2 snapshot loaded"
        );

        Ok(summary)
    }

    async fn try_load_scd2(&self, snapshot: &Snapshot) -> ScdResult<(MergeSummary, u64)> {
        let mut summary = MergeSummary::new(MergeTarget::Scd2, snapshot.len());
        if snapshot.is_empty() {
            return Ok((summary, 0));
        }

        let loaded: HashSet<EntityId> = self
            .store
            .get_scd2_versions(&snapshot.entity_ids())
            .await?
            .into_iter()
            .map(|version| version.entity_id)
            .collect();

        let mutations: Vec<_> = snapshot
            .records()
            .iter()
            .filter(|record| !loaded.contains(&record.entity_id))
            .map(|record| {
                Scd2Mutation::Append(NewScd2Version {
                    entity_id: record.entity_id,
                    attributes: record.attributes.clone(),
                    effective_from: record.created_at,
                    effective_to: None,
                    created_at: Some(record.created_at),
                    updated_at: record.updated_at,
                })
            })
            .collect();

        summary.inserted = mutations.len();
        summary.records_applied = mutations.len();
        summary.skipped = loaded.len();
        if mutations.is_empty() {
            return Ok((summary, 0));
        }

        let applied = self.store.apply_scd2_mutations(mutations).await?;

        Ok((summary, applied))
    }
}
