//! Stubbed units and synthesized placeholders.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::warn;

use crate::base::{AttrName, ObjectIds, UnitName};
use crate::ctx::RunCtx;
use crate::error::ExtractError;
use crate::host::{Placeholder, PlaceholderKind, Unit, UnitFacade, Value};
use crate::source::MarkerKind;

/// Declared special forms for external symbols, keyed by originating unit
/// and attribute. Fed from `marker` statements found during discovery.
#[derive(Debug, Clone, Default)]
pub struct SpecialMarkers {
    entries: FxHashMap<(UnitName, AttrName), MarkerKind>,
}

impl SpecialMarkers {
    pub fn get(&self, unit: &UnitName, attr: &str) -> Option<MarkerKind> {
        // The key type owns both parts; cloning a unit name is an Arc
        // bump, so building the lookup pair is cheap.
        self.entries
            .get(&(unit.clone(), AttrName::new(attr)))
            .copied()
    }

    /// Record a marker. The first declaration for a symbol wins; later
    /// conflicting declarations are dropped with a warning.
    pub fn insert(&mut self, unit: UnitName, attr: AttrName, kind: MarkerKind) {
        use std::collections::hash_map::Entry;
        match self.entries.entry((unit, attr)) {
            Entry::Vacant(slot) => {
                slot.insert(kind);
            }
            Entry::Occupied(slot) => {
                if *slot.get() != kind {
                    let (unit, attr) = slot.key();
                    warn!(
                        unit = %unit,
                        attr = %attr,
                        kept = ?slot.get(),
                        dropped = ?kind,
                        "conflicting special-form markers for symbol",
                    );
                }
            }
        }
    }

    pub fn merge(&mut self, other: &SpecialMarkers) {
        for ((unit, attr), kind) in &other.entries {
            self.insert(unit.clone(), attr.clone(), *kind);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Synthesize a placeholder for one attribute of a stubbed unit,
/// consulting the marker table for its special form.
pub fn make_placeholder(
    ids: &ObjectIds,
    markers: &SpecialMarkers,
    unit: &UnitName,
    attr: &str,
) -> Arc<Placeholder> {
    let kind = match markers.get(unit, attr) {
        Some(MarkerKind::Metaclass) => PlaceholderKind::Metaclass,
        Some(MarkerKind::Decorator) => PlaceholderKind::Decorator,
        None => PlaceholderKind::Mock,
    };
    Placeholder::new(ids, unit.clone(), AttrName::new(attr), kind)
}

/// Facade body for a stubbed unit: every attribute read synthesizes a
/// placeholder. Placeholders are cached per attribute name, so repeated
/// reads of the same symbol within one run are identical objects.
#[derive(Debug)]
pub struct StubFacade {
    markers: Arc<RwLock<SpecialMarkers>>,
    cache: RwLock<FxHashMap<AttrName, Value>>,
}

impl StubFacade {
    pub fn new(markers: Arc<RwLock<SpecialMarkers>>) -> Self {
        Self {
            markers,
            cache: RwLock::new(FxHashMap::default()),
        }
    }
}

impl UnitFacade for StubFacade {
    fn attr(
        &self,
        unit: &Unit,
        _ctx: &mut RunCtx,
        name: &str,
    ) -> Result<Value, ExtractError> {
        if let Some(cached) = self.cache.read().get(name) {
            return Ok(cached.clone());
        }
        let placeholder = {
            let markers = self.markers.read();
            make_placeholder(unit.ids(), &markers, unit.name(), name)
        };
        let value = Value::placeholder(placeholder);
        self.cache
            .write()
            .insert(AttrName::new(name), value.clone());
        Ok(value)
    }

    /// A stub has no real export list. An injected one (copied from the
    /// raw unit during preparation) is served by the unit itself before
    /// the facade is consulted; reaching here means none was injected.
    fn export_list(
        &self,
        unit: &Unit,
        _ctx: &mut RunCtx,
    ) -> Result<Vec<AttrName>, ExtractError> {
        warn!(
            unit = %unit.name(),
            "export list requested on stubbed unit without an injected one; \
             returning empty",
        );
        Ok(Vec::new())
    }
}
