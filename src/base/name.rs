//! Fully-qualified unit names.
//!
//! A [`UnitName`] is a validated dotted path like `pkg.sub.leaf`. Cloning is
//! cheap (`Arc<str>` reference count increment), and two names compare equal
//! iff their full dotted text is equal.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use smol_str::SmolStr;
use thiserror::Error;

/// A unit name failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid unit name {name:?}: {reason}")]
pub struct InvalidUnitName {
    pub name: String,
    pub reason: &'static str,
}

/// Fully-qualified dotted name of a namespace unit.
///
/// Identity of a unit is its fully-qualified name; the registry and all
/// stashes are keyed by this type.
#[derive(Clone)]
pub struct UnitName(Arc<str>);

impl UnitName {
    /// Parse and validate a dotted unit name.
    ///
    /// Every dot-separated segment must be a valid identifier
    /// (XID_Start followed by XID_Continue characters, `_` allowed).
    pub fn new(name: &str) -> Result<Self, InvalidUnitName> {
        if name.is_empty() {
            return Err(InvalidUnitName {
                name: name.to_string(),
                reason: "empty name",
            });
        }
        for segment in name.split('.') {
            if !is_valid_segment(segment) {
                return Err(InvalidUnitName {
                    name: name.to_string(),
                    reason: "segment is not a valid identifier",
                });
            }
        }
        Ok(Self(Arc::from(name)))
    }

    /// The full dotted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The top-level package segment (`pkg` for `pkg.sub.leaf`).
    pub fn toplevel(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// The final segment (`leaf` for `pkg.sub.leaf`), i.e. the name a
    /// child unit is bound to on its parent.
    pub fn relname(&self) -> SmolStr {
        SmolStr::new(self.0.rsplit('.').next().unwrap_or(&self.0))
    }

    /// The parent unit name, if any.
    pub fn parent(&self) -> Option<UnitName> {
        let (parent, _) = self.0.rsplit_once('.')?;
        Some(Self(Arc::from(parent)))
    }

    /// Nesting depth: number of dots in the full name. Used to order
    /// preparation shallow-before-deep.
    pub fn depth(&self) -> usize {
        self.0.matches('.').count()
    }

    /// True if `self` is `ancestor` itself or nested anywhere below it.
    pub fn is_within(&self, ancestor: &str) -> bool {
        self.0.as_ref() == ancestor
            || (self.0.starts_with(ancestor)
                && self.0.as_bytes().get(ancestor.len()) == Some(&b'.'))
    }
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(unicode_ident::is_xid_start(first) || first == '_') {
        return false;
    }
    chars.all(|c| unicode_ident::is_xid_continue(c))
}

impl fmt::Debug for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UnitName({:?})", &*self.0)
    }
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq for UnitName {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for UnitName {}

impl PartialEq<str> for UnitName {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl Hash for UnitName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl PartialOrd for UnitName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for UnitName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Borrow<str> for UnitName {
    fn borrow(&self) -> &str {
        &self.0
    }
}
