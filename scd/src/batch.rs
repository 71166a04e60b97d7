//! Validated batches of CDC events and their per-entity projections.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::debug;

use crate::error::{ErrorKind, ScdError, ScdResult};
use crate::scd_error;
use crate::types::{ChangeRecord, EntityId, EntitySchema, RawChangeRow};

/// A batch of validated change records, kept in source order.
///
/// Source order matters only for records of one entity that share a change timestamp: the record
/// that appears later in the batch is treated as the later change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeBatch {
    records: Vec<ChangeRecord>,
}

impl ChangeBatch {
    /// Creates a batch from records that were already validated.
    pub fn new(records: Vec<ChangeRecord>) -> Self {
        Self { records }
    }

    /// Validates every raw row of a source against the schema.
    ///
    /// Either all rows are valid or the batch is rejected. The returned error aggregates one
    /// [`ErrorKind::MalformedRecord`] error per invalid row, each naming the row position.
    pub fn parse(schema: &EntitySchema, rows: &[RawChangeRow]) -> ScdResult<Self> {
        let mut records = Vec::with_capacity(rows.len());
        let mut errors = Vec::new();

        for (position, row) in rows.iter().enumerate() {
            match ChangeRecord::from_raw(schema, row) {
                Ok(record) => records.push(record),
                Err(err) => errors.push(row_error(position, err)),
            }
        }

        if !errors.is_empty() {
            debug!(
                rows = rows.len(),
                rejected = errors.len(),
                "rejecting change batch with malformed rows"
            );
            return Err(errors.into());
        }

        Ok(Self { records })
    }

    /// Concatenates batches read from several sources, in the given order.
    pub fn concat(batches: impl IntoIterator<Item = ChangeBatch>) -> Self {
        Self {
            records: batches
                .into_iter()
                .flat_map(|batch| batch.records)
                .collect(),
        }
    }

    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the distinct entity ids in the batch, ascending.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.records.iter().map(|record| record.entity_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Collapses the batch to the latest change of every entity, ordered by entity id.
    ///
    /// The latest change is the one with the greatest `change_ts`. On equal timestamps the record
    /// appearing later in the batch wins.
    pub fn latest_per_entity(&self) -> Vec<&ChangeRecord> {
        let mut latest: BTreeMap<EntityId, &ChangeRecord> = BTreeMap::new();

        for record in &self.records {
            match latest.entry(record.entity_id) {
                Entry::Vacant(entry) => {
                    entry.insert(record);
                }
                Entry::Occupied(mut entry) => {
                    if record.change_ts >= entry.get().change_ts {
                        entry.insert(record);
                    }
                }
            }
        }

        latest.into_values().collect()
    }

    /// Groups the batch by entity, each sequence ascending by `change_ts`.
    ///
    /// Nothing is collapsed. The sort is stable, so records with equal timestamps keep their batch
    /// order and agree with [`ChangeBatch::latest_per_entity`] on which one is final.
    pub fn ordered_per_entity(&self) -> BTreeMap<EntityId, Vec<&ChangeRecord>> {
        let mut grouped: BTreeMap<EntityId, Vec<&ChangeRecord>> = BTreeMap::new();
        for record in &self.records {
            grouped.entry(record.entity_id).or_default().push(record);
        }

        for sequence in grouped.values_mut() {
            sequence.sort_by_key(|record| record.change_ts);
        }

        grouped
    }
}

impl From<Vec<ChangeRecord>> for ChangeBatch {
    fn from(records: Vec<ChangeRecord>) -> Self {
        Self::new(records)
    }
}

pub(crate) fn row_error(position: usize, err: ScdError) -> ScdError {
    let description = err.description().unwrap_or("Malformed change row").to_string();
    let detail = match err.detail() {
        Some(detail) => format!("row {position}: {description}: {detail}"),
        None => format!("row {position}: {description}"),
    };

    scd_error!(
        ErrorKind::MalformedRecord,
        "Malformed change row",
        detail = detail,
        source: err
    )
}
