//! Insertion-ordered attribute namespaces.

use indexmap::IndexMap;

use crate::base::AttrName;
use crate::host::value::Value;

/// The attribute table of a unit or class body. Preserves declaration
/// order, which downstream consumers rely on for stable output.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: IndexMap<AttrName, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn insert(&mut self, name: AttrName, value: Value) -> Option<Value> {
        self.entries.insert(name, value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttrName, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &AttrName> {
        self.entries.keys()
    }

    /// Names not starting with an underscore, in declaration order.
    pub fn public_names(&self) -> Vec<AttrName> {
        self.entries
            .keys()
            .filter(|name| !name.starts_with('_'))
            .cloned()
            .collect()
    }
}

impl FromIterator<(AttrName, Value)> for Namespace {
    fn from_iter<T: IntoIterator<Item = (AttrName, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
