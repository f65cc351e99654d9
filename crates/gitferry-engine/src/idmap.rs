//! Run-scoped source-to-destination identifier mapping.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use gitferry_types::EntityKind;

/// Append-only table translating `(kind, source id)` to destination ids.
///
/// Owned by the engine and shared with strategies, which record mappings
/// for their own kind during a phase and resolve earlier kinds' entries.
/// The mutex is held only for the duration of a single insert or lookup;
/// by the time a later phase reads a kind's entries, that kind's phase has
/// completed and its slice of the map no longer changes.
pub struct IdMap {
    inner: Mutex<HashMap<(EntityKind, u64), u64>>,
}

impl IdMap {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Record a mapping. First write wins: re-recording an existing key is
    /// a no-op, so the map never holds two destination ids for one key.
    pub fn record(&self, kind: EntityKind, source_id: u64, destination_id: u64) -> bool {
        let mut inner = self.inner.lock();
        match inner.entry((kind, source_id)) {
            std::collections::hash_map::Entry::Occupied(existing) => {
                debug!(
                    %kind,
                    source_id,
                    existing = existing.get(),
                    ignored = destination_id,
                    "id mapping already recorded"
                );
                false
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(destination_id);
                true
            }
        }
    }

    /// Look up the destination id for a source entity.
    pub fn resolve(&self, kind: EntityKind, source_id: u64) -> Option<u64> {
        self.inner.lock().get(&(kind, source_id)).copied()
    }

    /// All recorded mappings for one kind, in source-id order.
    pub fn entries_for(&self, kind: EntityKind) -> Vec<(u64, u64)> {
        let inner = self.inner.lock();
        let mut entries: Vec<(u64, u64)> = inner
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, source), dest)| (*source, *dest))
            .collect();
        entries.sort_unstable();
        entries
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for IdMap {
    fn default() -> Self {
        Self::new()
    }
}
