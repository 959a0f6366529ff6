//! Object identity.
//!
//! Provenance tracking is keyed by *identity*, not structural equality:
//! two equal integers imported from two different units must still be
//! distinguishable. Every runtime value is assigned an [`ObjectId`] at
//! creation; cloning a value preserves its id (reference semantics).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a runtime value. Stable for the lifetime of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Allocator for [`ObjectId`]s. Cheap to clone; clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct ObjectIds {
    next: Arc<AtomicU64>,
}

impl ObjectIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh, never-before-issued id.
    pub fn alloc(&self) -> ObjectId {
        ObjectId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}
