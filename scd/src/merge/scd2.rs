use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::batch::ChangeBatch;
use crate::bail;
use crate::error::{ErrorKind, ScdResult};
use crate::merge::{MergeSummary, MergeTarget, record_merge_metrics};
use crate::store::{Scd2Mutation, Scd2Store};
use crate::types::{
    Attributes, ChangeRecord, EntityId, EntitySchema, NewScd2Version, Operation, Scd2Record,
    SurrogateKey,
};

/// Checks the stored history of one entity before it is extended.
///
/// The history must have at most one current version, a version must be current exactly when it
/// is open, no interval may end before it starts and no two intervals may overlap. Any failure is
/// an [`ErrorKind::InvariantViolation`]: the history was corrupted earlier and is not repaired.
pub fn check_version_chain(entity_id: EntityId, versions: &[Scd2Record]) -> ScdResult<()> {
    let mut chain: Vec<&Scd2Record> = versions
        .iter()
        .filter(|version| version.entity_id == entity_id)
        .collect();
    chain.sort_by_key(|version| (version.effective_from, version.surrogate_key));

    let current = chain.iter().filter(|version| version.is_current).count();
    if current > 1 {
        bail!(
            ErrorKind::InvariantViolation,
            "Entity has more than one current version",
            format!("entity {entity_id} has {current} current versions")
        );
    }

    for version in &chain {
        if version.is_current != version.is_open() {
            bail!(
                ErrorKind::InvariantViolation,
                "Version current flag disagrees with its interval",
                format!(
                    "version {} of entity {entity_id} has is_current = {} and effective_to = {:?}",
                    version.surrogate_key, version.is_current, version.effective_to
                )
            );
        }

        if let Some(effective_to) = version.effective_to
            && effective_to < version.effective_from
        {
            bail!(
                ErrorKind::InvariantViolation,
                "Version interval ends before it starts",
                format!(
                    "version {} of entity {entity_id} spans [{}, {effective_to})",
                    version.surrogate_key, version.effective_from
                )
            );
        }
    }

    for pair in chain.windows(2) {
        let (previous, next) = (pair[0], pair[1]);
        let overlaps = match previous.effective_to {
            Some(effective_to) => effective_to > next.effective_from,
            None => true,
        };

        if overlaps {
            bail!(
                ErrorKind::InvariantViolation,
                "Version intervals overlap",
                format!(
                    "versions {} and {} of entity {entity_id} overlap at {}",
                    previous.surrogate_key, next.surrogate_key, next.effective_from
                )
            );
        }
    }

    Ok(())
}

/// The open version of an entity while a batch is being planned.
#[derive(Debug, Clone)]
enum OpenVersion {
    /// A version already in the store.
    Persisted {
        surrogate_key: SurrogateKey,
        attributes: Attributes,
    },
    /// A version appended earlier in the same batch, by index into the planned appends.
    Pending { index: usize },
}

/// Planning state of one entity.
#[derive(Debug, Default)]
struct EntityState {
    open: Option<OpenVersion>,
    /// Greatest interval bound seen so far. Changes before it are stale.
    watermark: Option<NaiveDateTime>,
}

impl EntityState {
    fn from_history(versions: &[Scd2Record]) -> Self {
        let open = versions
            .iter()
            .find(|version| version.is_current)
            .map(|version| OpenVersion::Persisted {
                surrogate_key: version.surrogate_key,
                attributes: version.attributes.clone(),
            });

        let watermark = versions
            .iter()
            .map(|version| version.effective_to.unwrap_or(version.effective_from))
            .max();

        Self { open, watermark }
    }

    fn is_stale(&self, change_ts: NaiveDateTime) -> bool {
        self.watermark.is_some_and(|watermark| change_ts < watermark)
    }

    fn advance(&mut self, change_ts: NaiveDateTime) {
        self.watermark = Some(self.watermark.map_or(change_ts, |w| w.max(change_ts)));
    }
}

/// Mutations planned for one batch.
#[derive(Debug, Default)]
struct Plan {
    closes: Vec<Scd2Mutation>,
    appends: Vec<NewScd2Version>,
}

impl Plan {
    fn open_attributes<'a>(&'a self, open: &'a OpenVersion) -> &'a Attributes {
        match open {
            OpenVersion::Persisted { attributes, .. } => attributes,
            OpenVersion::Pending { index } => &self.appends[*index].attributes,
        }
    }

    /// Closes the open version at the change timestamp.
    fn close(&mut self, open: OpenVersion, record: &ChangeRecord) {
        match open {
            OpenVersion::Persisted { surrogate_key, .. } => {
                self.closes.push(Scd2Mutation::Close {
                    surrogate_key,
                    effective_to: record.change_ts,
                    updated_at: record.updated_at,
                });
            }
            OpenVersion::Pending { index } => {
                let version = &mut self.appends[index];
                version.effective_to = Some(record.change_ts);
                if record.updated_at.is_some() {
                    version.updated_at = record.updated_at;
                }
            }
        }
    }

    /// Opens a new version starting at the change timestamp.
    fn open(&mut self, record: &ChangeRecord) -> OpenVersion {
        self.appends.push(NewScd2Version {
            entity_id: record.entity_id,
            attributes: record.attributes.clone(),
            effective_from: record.change_ts,
            effective_to: None,
            created_at: record.created_at,
            updated_at: record.updated_at,
        });

        OpenVersion::Pending {
            index: self.appends.len() - 1,
        }
    }

    fn into_mutations(self) -> Vec<Scd2Mutation> {
        let mut mutations = self.closes;
        mutations.extend(self.appends.into_iter().map(Scd2Mutation::Append));
        mutations
    }
}

/// Applies change batches to the versioned (SCD2) table.
///
/// Every change of an entity is replayed in `change_ts` order against the entity's open version:
///
/// - an insert or update with no open version opens one;
/// - an insert or update with an open version closes it and opens a successor if any attribute
///   differs, and is a no-op otherwise;
/// - a delete closes the open version without successor, and is a no-op when there is none.
///
/// A deleted entity can be re-created by a later insert or update, leaving a gap in its history.
/// Changes older than the entity's recorded history are skipped as stale.
#[derive(Debug, Clone)]
pub struct Scd2MergeEngine<S> {
    schema: EntitySchema,
    store: S,
}

impl<S> Scd2MergeEngine<S>
where
    S: Scd2Store,
{
    pub fn new(schema: EntitySchema, store: S) -> Self {
        Self { schema, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Merges a batch and returns what it changed.
    ///
    /// The stored history of every entity in the batch is checked first with
    /// [`check_version_chain`]. Nothing is written if the check, a store read or the final apply
    /// fails.
    pub async fn merge(&self, batch: &ChangeBatch) -> ScdResult<MergeSummary> {
        info!(records = batch.len(), "starting scd2 merge");

        let started = Instant::now();
        let result = self.try_merge(batch).await;
        record_merge_metrics(MergeTarget::Scd2, started, &result);

        let (summary, _) = result?;
        info!(
            received = summary.records_received,
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            skipped = summary.skipped,
            "scd2 merge completed"
        );

        Ok(summary)
    }

    async fn try_merge(&self, batch: &ChangeBatch) -> ScdResult<(MergeSummary, u64)> {
        let mut summary = MergeSummary::new(MergeTarget::Scd2, batch.len());
        if batch.is_empty() {
            return Ok((summary, 0));
        }

        let sequences = batch.ordered_per_entity();
        let entity_ids: Vec<_> = sequences.keys().copied().collect();

        let mut histories: BTreeMap<EntityId, Vec<Scd2Record>> = BTreeMap::new();
        for version in self.store.get_scd2_versions(&entity_ids).await? {
            histories.entry(version.entity_id).or_default().push(version);
        }
        for (entity_id, history) in &histories {
            check_version_chain(*entity_id, history)?;
        }

        let mut plan = Plan::default();
        for (entity_id, sequence) in &sequences {
            let history = histories.get(entity_id).map(Vec::as_slice).unwrap_or_default();
            let mut state = EntityState::from_history(history);

            for record in sequence {
                self.apply_change(&mut plan, &mut state, record, &mut summary);
            }
        }

        summary.records_applied = summary.inserted + summary.updated + summary.deleted;

        let mutations = plan.into_mutations();
        if mutations.is_empty() {
            debug!("scd2 batch produced no mutations");
            return Ok((summary, 0));
        }

        let applied = self.store.apply_scd2_mutations(mutations).await?;

        Ok((summary, applied))
    }

    /// Advances the state machine of one entity by one change.
    fn apply_change(
        &self,
        plan: &mut Plan,
        state: &mut EntityState,
        record: &ChangeRecord,
        summary: &mut MergeSummary,
    ) {
        let entity_id = record.entity_id;
        let change_ts = record.change_ts;

        if state.is_stale(change_ts) {
            warn!(
                %entity_id,
                %change_ts,
                watermark = ?state.watermark,
                "skipping stale scd2 change older than the entity history"
            );
            summary.skipped += 1;
            return;
        }

        match (record.operation, state.open.take()) {
            (Operation::Insert | Operation::Update, None) => {
                debug!(%entity_id, %change_ts, "opening scd2 version");
                state.open = Some(plan.open(record));
                state.advance(change_ts);
                summary.inserted += 1;
            }
            (Operation::Insert | Operation::Update, Some(open)) => {
                let current = plan.open_attributes(&open);
                if !self.schema.has_changes(current, &record.attributes) {
                    debug!(%entity_id, %change_ts, "scd2 change has no effect");
                    state.open = Some(open);
                    summary.unchanged += 1;
                    return;
                }

                debug!(
                    %entity_id,
                    %change_ts,
                    changed = ?self.schema.changed_attributes(current, &record.attributes),
                    "replacing scd2 version"
                );
                plan.close(open, record);
                state.open = Some(plan.open(record));
                state.advance(change_ts);
                summary.updated += 1;
            }
            (Operation::Delete, Some(open)) => {
                debug!(%entity_id, %change_ts, "closing scd2 version");
                plan.close(open, record);
                state.advance(change_ts);
                summary.deleted += 1;
            }
            (Operation::Delete, None) => {
                debug!(%entity_id, %change_ts, "skipping delete of entity without open version");
                summary.skipped += 1;
            }
        }
    }
}
