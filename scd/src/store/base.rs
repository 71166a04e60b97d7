use chrono::NaiveDateTime;
use std::future::Future;

use crate::error::ScdResult;
use crate::types::{Attributes, EntityId, NewScd2Version, Scd1Record, Scd2Record, SurrogateKey};

/// A single change to the overwrite table.
#[derive(Debug, Clone, PartialEq)]
pub enum Scd1Mutation {
    /// Creates the row of an entity that has no row.
    Insert(Scd1Record),
    /// Overwrites every attribute, `change_ts` and `updated_at` of an existing row, keeping
    /// `created_at`.
    Update {
        entity_id: EntityId,
        attributes: Attributes,
        change_ts: NaiveDateTime,
        updated_at: Option<NaiveDateTime>,
    },
    /// Removes the row of an entity.
    Delete(EntityId),
}

impl Scd1Mutation {
    pub fn entity_id(&self) -> EntityId {
        match self {
            Scd1Mutation::Insert(record) => record.entity_id,
            Scd1Mutation::Update { entity_id, .. } => *entity_id,
            Scd1Mutation::Delete(entity_id) => *entity_id,
        }
    }
}

/// A single change to the versioned table.
///
/// History is append-only: existing versions can only be closed, never edited or removed.
#[derive(Debug, Clone, PartialEq)]
pub enum Scd2Mutation {
    /// Closes the open version with the given key at `effective_to`.
    Close {
        surrogate_key: SurrogateKey,
        effective_to: NaiveDateTime,
        updated_at: Option<NaiveDateTime>,
    },
    /// Appends a new version.
    Append(NewScd2Version),
}

/// Trait for reading and mutating the overwrite (SCD1) table.
///
/// [`Scd1Store`] implementations hold at most one row per entity and have no business logic of
/// their own. Mutations are submitted as a list and must be applied all-or-nothing: if any
/// mutation fails, none of them is visible afterwards.
///
/// Implementations should ensure thread-safety and handle concurrent access to the data.
pub trait Scd1Store {
    /// Returns the rows of the given entities. Entities without a row are absent from the result.
    fn get_scd1_records(
        &self,
        entity_ids: &[EntityId],
    ) -> impl Future<Output = ScdResult<Vec<Scd1Record>>> + Send;

    /// Returns every row, ordered by entity id.
    fn get_all_scd1_records(&self) -> impl Future<Output = ScdResult<Vec<Scd1Record>>> + Send;

    /// Applies the mutations as a single atomic unit, in the given order.
    ///
    /// Returns the number of mutations applied.
    fn apply_scd1_mutations(
        &self,
        mutations: Vec<Scd1Mutation>,
    ) -> impl Future<Output = ScdResult<u64>> + Send;
}

/// Trait for reading and mutating the versioned (SCD2) table.
///
/// [`Scd2Store`] implementations generate surrogate keys for appended versions and never delete
/// rows. Like [`Scd1Store`], every mutation list is applied all-or-nothing.
///
/// Implementations should ensure thread-safety and handle concurrent access to the data.
pub trait Scd2Store {
    /// Returns the full history of the given entities, ordered by entity id then `effective_from`.
    fn get_scd2_versions(
        &self,
        entity_ids: &[EntityId],
    ) -> impl Future<Output = ScdResult<Vec<Scd2Record>>> + Send;

    /// Returns the current version of every entity that has one.
    fn get_current_scd2_versions(&self)
    -> impl Future<Output = ScdResult<Vec<Scd2Record>>> + Send;

    /// Returns every version, ordered by entity id then `effective_from`.
    fn get_all_scd2_versions(&self) -> impl Future<Output = ScdResult<Vec<Scd2Record>>> + Send;

    /// Applies the mutations as a single atomic unit, in the given order.
    ///
    /// Returns the number of mutations applied.
    fn apply_scd2_mutations(
        &self,
        mutations: Vec<Scd2Mutation>,
    ) -> impl Future<Output = ScdResult<u64>> + Send;
}
