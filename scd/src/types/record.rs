use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use crate::types::{Attributes, EntityId};

/// Store-generated identity of one SCD2 version row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SurrogateKey(pub i64);

impl fmt::Display for SurrogateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Latest known state of one entity in the overwrite table.
#[derive(Debug, Clone, PartialEq)]
pub struct Scd1Record {
    pub entity_id: EntityId,
    pub attributes: Attributes,
    /// `change_ts` of the last change written to the row. Older changes are stale.
    pub change_ts: NaiveDateTime,
    /// Set on first insert and preserved by later overwrites.
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// One version of an entity in the versioned table.
///
/// The version is valid over `[effective_from, effective_to)`. An open version has no
/// `effective_to` and is the current one.
#[derive(Debug, Clone, PartialEq)]
pub struct Scd2Record {
    pub surrogate_key: SurrogateKey,
    pub entity_id: EntityId,
    pub attributes: Attributes,
    pub effective_from: NaiveDateTime,
    pub effective_to: Option<NaiveDateTime>,
    pub is_current: bool,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Scd2Record {
    pub fn is_open(&self) -> bool {
        self.effective_to.is_none()
    }

    /// Returns `true` if the version was valid at `ts`.
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.effective_from <= ts && self.effective_to.is_none_or(|to| ts < to)
    }
}

/// A version to be appended to the versioned table; the store assigns its surrogate key.
///
/// A version may already be closed when it is appended, when it was opened and superseded in the
/// same batch.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScd2Version {
    pub entity_id: EntityId,
    pub attributes: Attributes,
    pub effective_from: NaiveDateTime,
    pub effective_to: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl NewScd2Version {
    pub fn is_current(&self) -> bool {
        self.effective_to.is_none()
    }

    /// Materializes the version under the given surrogate key.
    pub fn into_record(self, surrogate_key: SurrogateKey) -> Scd2Record {
        Scd2Record {
            surrogate_key,
            is_current: self.is_current(),
            entity_id: self.entity_id,
            attributes: self.attributes,
            effective_from: self.effective_from,
            effective_to: self.effective_to,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
