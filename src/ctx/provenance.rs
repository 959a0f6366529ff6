//! The provenance registry.
//!
//! Maps object *identity* to the `(unit_name, attr_name)` pair that
//! produced it, as observed through tracking wrappers. A `None` entry is
//! the tombstone: multiple distinct origins were observed for the same
//! identity, so the origin is ambiguous. The tombstone is terminal.

use rustc_hash::FxHashMap;

use crate::base::{AttrName, ObjectId, UnitName};

/// Where a tracked value was observed to come from.
pub type Origin = (UnitName, AttrName);

/// Identity-keyed origin map for one unit inspection.
///
/// A fresh registry is used for every inspected unit, so that identical
/// constants reused across sibling units do not cross-contaminate.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceRegistry {
    entries: FxHashMap<ObjectId, Option<Origin>>,
}

impl ProvenanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` was observed coming from `origin`.
    ///
    /// First sighting records the origin. A repeat sighting from the same
    /// origin is a no-op. A sighting from a *different* origin overwrites
    /// the entry with the tombstone, and once tombstoned an entry never
    /// reverts to a definite origin.
    pub fn record(&mut self, id: ObjectId, origin: Origin) {
        match self.entries.get(&id) {
            None => {
                self.entries.insert(id, Some(origin));
            }
            Some(Some(existing)) if *existing != origin => {
                self.entries.insert(id, None);
            }
            // Same origin again, or already tombstoned: leave it be.
            Some(_) => {}
        }
    }

    /// The recorded entry for `id`: `None` if never seen,
    /// `Some(None)` if tombstoned, `Some(Some(origin))` if definite.
    pub fn get(&self, id: ObjectId) -> Option<&Option<Origin>> {
        self.entries.get(&id)
    }

    /// Definite origin for `id`, if one was recorded and never conflicted.
    pub fn definite(&self, id: ObjectId) -> Option<&Origin> {
        self.entries.get(&id).and_then(|entry| entry.as_ref())
    }

    /// True if `id` was seen from conflicting origins.
    pub fn is_ambiguous(&self, id: ObjectId) -> bool {
        matches!(self.entries.get(&id), Some(None))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &Option<Origin>)> {
        self.entries.iter()
    }
}
