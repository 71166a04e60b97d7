use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, ScdResult};
use crate::store::{Scd1Mutation, Scd1Store, Scd2Mutation, Scd2Store};
use crate::types::{EntityId, Scd1Record, Scd2Record, SurrogateKey};

/// Inner state of [`MemoryStore`].
#[derive(Debug, Clone, Default)]
struct Inner {
    /// Overwrite table, one row per live entity.
    scd1: BTreeMap<EntityId, Scd1Record>,
    /// Versioned table keyed by surrogate key. Keys grow monotonically, so iteration follows
    /// insertion order.
    scd2: BTreeMap<SurrogateKey, Scd2Record>,
    /// Next surrogate key to hand out.
    next_surrogate_key: i64,
}

impl Inner {
    fn apply_scd1(&mut self, mutations: Vec<Scd1Mutation>) -> ScdResult<()> {
        for mutation in mutations {
            match mutation {
                Scd1Mutation::Insert(record) => {
                    if self.scd1.contains_key(&record.entity_id) {
                        bail!(
                            ErrorKind::StoreQueryFailed,
                            "Duplicate key in overwrite table",
                            format!("entity {} already has a row", record.entity_id)
                        );
                    }
                    self.scd1.insert(record.entity_id, record);
                }
                Scd1Mutation::Update {
                    entity_id,
                    attributes,
                    change_ts,
                    updated_at,
                } => {
                    let Some(record) = self.scd1.get_mut(&entity_id) else {
                        bail!(
                            ErrorKind::StoreQueryFailed,
                            "Row to update not found in overwrite table",
                            format!("entity {entity_id} has no row")
                        );
                    };
                    record.attributes = attributes;
                    record.change_ts = change_ts;
                    record.updated_at = updated_at;
                }
                Scd1Mutation::Delete(entity_id) => {
                    self.scd1.remove(&entity_id);
                }
            }
        }

        Ok(())
    }

    fn apply_scd2(&mut self, mutations: Vec<Scd2Mutation>) -> ScdResult<()> {
        let mut touched = HashSet::new();

        for mutation in mutations {
            match mutation {
                Scd2Mutation::Close {
                    surrogate_key,
                    effective_to,
                    updated_at,
                } => {
                    let Some(version) = self.scd2.get_mut(&surrogate_key) else {
                        bail!(
                            ErrorKind::StoreQueryFailed,
                            "Version to close not found in versioned table",
                            format!("no version with surrogate key {surrogate_key}")
                        );
                    };
                    if !version.is_open() {
                        bail!(
                            ErrorKind::StoreQueryFailed,
                            "Version to close is already closed",
                            format!("version {surrogate_key} of entity {}", version.entity_id)
                        );
                    }

                    version.effective_to = Some(effective_to);
                    version.is_current = false;
                    if updated_at.is_some() {
                        version.updated_at = updated_at;
                    }
                    touched.insert(version.entity_id);
                }
                Scd2Mutation::Append(new_version) => {
                    let surrogate_key = SurrogateKey(self.next_surrogate_key);
                    self.next_surrogate_key += 1;

                    touched.insert(new_version.entity_id);
                    self.scd2
                        .insert(surrogate_key, new_version.into_record(surrogate_key));
                }
            }
        }

        // Mirrors the partial unique index on the current flag of the Postgres table.
        for entity_id in touched {
            let open_versions = self
                .scd2
                .values()
                .filter(|version| version.entity_id == entity_id && version.is_current)
                .count();
            if open_versions > 1 {
                bail!(
                    ErrorKind::StoreQueryFailed,
                    "Multiple current versions in versioned table",
                    format!("entity {entity_id} would have {open_versions} current versions")
                );
            }
        }

        Ok(())
    }

    fn sorted_versions<'a>(versions: impl Iterator<Item = &'a Scd2Record>) -> Vec<Scd2Record> {
        let mut versions: Vec<_> = versions.cloned().collect();
        versions.sort_by_key(|version| {
            (
                version.entity_id,
                version.effective_from,
                version.surrogate_key,
            )
        });
        versions
    }
}

/// In-memory storage for both target tables.
///
/// [`MemoryStore`] implements both [`Scd1Store`] and [`Scd2Store`]. Mutation lists are applied to
/// a copy of the state, which replaces the live state only once every mutation succeeded, so a
/// failed list leaves the store untouched.
///
/// All data is lost when the store is dropped.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Creates a new empty memory store.
    pub fn new() -> Self {
        let inner = Inner {
            next_surrogate_key: 1,
            ..Inner::default()
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Scd1Store for MemoryStore {
    async fn get_scd1_records(&self, entity_ids: &[EntityId]) -> ScdResult<Vec<Scd1Record>> {
        let inner = self.inner.lock().await;

        let entity_ids: HashSet<_> = entity_ids.iter().collect();
        Ok(inner
            .scd1
            .values()
            .filter(|record| entity_ids.contains(&record.entity_id))
            .cloned()
            .collect())
    }

    async fn get_all_scd1_records(&self) -> ScdResult<Vec<Scd1Record>> {
        let inner = self.inner.lock().await;

        Ok(inner.scd1.values().cloned().collect())
    }

    async fn apply_scd1_mutations(&self, mutations: Vec<Scd1Mutation>) -> ScdResult<u64> {
        let mut inner = self.inner.lock().await;

        let applied = mutations.len() as u64;
        let mut staged = inner.clone();
        staged.apply_scd1(mutations)?;
        *inner = staged;

        Ok(applied)
    }
}

impl Scd2Store for MemoryStore {
    async fn get_scd2_versions(&self, entity_ids: &[EntityId]) -> ScdResult<Vec<Scd2Record>> {
        let inner = self.inner.lock().await;

        let entity_ids: HashSet<_> = entity_ids.iter().collect();
        Ok(Inner::sorted_versions(
            inner
                .scd2
                .values()
                .filter(|version| entity_ids.contains(&version.entity_id)),
        ))
    }

    async fn get_current_scd2_versions(&self) -> ScdResult<Vec<Scd2Record>> {
        let inner = self.inner.lock().await;

        Ok(Inner::sorted_versions(
            inner.scd2.values().filter(|version| version.is_current),
        ))
    }

    async fn get_all_scd2_versions(&self) -> ScdResult<Vec<Scd2Record>> {
        let inner = self.inner.lock().await;

        Ok(Inner::sorted_versions(inner.scd2.values()))
    }

    async fn apply_scd2_mutations(&self, mutations: Vec<Scd2Mutation>) -> ScdResult<u64> {
        let mut inner = self.inner.lock().await;

        let applied = mutations.len() as u64;
        let mut staged = inner.clone();
        staged.apply_scd2(mutations)?;
        *inner = staged;

        Ok(applied)
    }
}
