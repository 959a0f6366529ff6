//! The host's table of loaded units.

use indexmap::IndexMap;

use crate::base::UnitName;
use crate::host::unit::UnitHandle;

/// Loaded units keyed by dotted name, in load order. Resolution consults
/// this before anything else: a hit means the name is already loaded and
/// no hook or loader runs.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    entries: IndexMap<UnitName, UnitHandle>,
}

impl UnitRegistry {
    pub fn get(&self, name: &str) -> Option<UnitHandle> {
        self.entries.get(name).cloned()
    }

    /// Insert a unit, returning whatever was registered under the name
    /// before.
    pub fn insert(&mut self, name: UnitName, unit: UnitHandle) -> Option<UnitHandle> {
        self.entries.insert(name, unit)
    }

    pub fn remove(&mut self, name: &str) -> Option<UnitHandle> {
        self.entries.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<UnitName> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UnitName, &UnitHandle)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ObjectIds;
    use crate::host::unit::Unit;

    #[test]
    fn insert_returns_displaced_unit() {
        let ids = ObjectIds::default();
        let name = UnitName::new("pkg.mod").unwrap();
        let first = Unit::plain(&ids, name.clone());
        let second = Unit::plain(&ids, name.clone());

        let mut registry = UnitRegistry::default();
        assert!(registry.insert(name.clone(), first.clone()).is_none());
        let displaced = registry.insert(name.clone(), second).unwrap();
        assert_eq!(displaced.object_id(), first.object_id());
        assert!(registry.contains("pkg.mod"));
    }
}
