use std::collections::BTreeMap;

use crate::merge::check_version_chain;
use crate::types::{EntityId, Scd2Record};

/// Groups versions by entity, each history ordered by `effective_from`.
pub fn histories(versions: &[Scd2Record]) -> BTreeMap<EntityId, Vec<Scd2Record>> {
    let mut grouped: BTreeMap<EntityId, Vec<Scd2Record>> = BTreeMap::new();
    for version in versions {
        grouped
            .entry(version.entity_id)
            .or_default()
            .push(version.clone());
    }

    for history in grouped.values_mut() {
        history.sort_by_key(|version| (version.effective_from, version.surrogate_key));
    }

    grouped
}

/// Returns the history of one entity ordered by `effective_from`.
pub fn history_of(versions: &[Scd2Record], entity_id: EntityId) -> Vec<Scd2Record> {
    histories(versions).remove(&entity_id).unwrap_or_default()
}

/// Asserts that every entity's history is a valid version chain.
pub fn assert_valid_histories(versions: &[Scd2Record]) {
    for (entity_id, history) in histories(versions) {
        if let Err(err) = check_version_chain(entity_id, &history) {
            panic!("invalid history for entity {entity_id}: {err}");
        }
    }
}

/// Asserts that the history of one entity has no gaps: every closed version ends exactly where
/// the next one starts.
pub fn assert_contiguous(versions: &[Scd2Record], entity_id: EntityId) {
    let history = history_of(versions, entity_id);
    for pair in history.windows(2) {
        assert_eq!(
            pair[0].effective_to,
            Some(pair[1].effective_from),
            "versions {} and {} of entity {entity_id} are not contiguous",
            pair[0].surrogate_key,
            pair[1].surrogate_key
        );
    }
}
