//! Runtime values.
//!
//! Values have *identity* (an [`ObjectId`]) distinct from structural
//! equality. Cloning a `Value` preserves its id — reference semantics —
//! which is what makes identity-keyed provenance tracking meaningful.

use std::fmt;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::base::{AttrName, ObjectId, ObjectIds, UnitName};
use crate::host::namespace::Namespace;
use crate::host::unit::UnitHandle;

/// A runtime value living in some unit namespace.
#[derive(Debug, Clone)]
pub struct Value {
    id: ObjectId,
    pub kind: ValueKind,
}

#[derive(Debug, Clone)]
pub enum ValueKind {
    Int(i64),
    Str(SmolStr),
    Bool(bool),
    Class(Arc<ClassValue>),
    Function(Arc<FnValue>),
    /// The result of calling a class or function: an opaque constructed
    /// value remembering what built it.
    Instance(Arc<InstanceValue>),
    Unit(UnitHandle),
    Placeholder(Arc<Placeholder>),
    List(Arc<Vec<Value>>),
}

impl Value {
    /// Create a value with a freshly-allocated identity. For kinds that
    /// carry their own identity (classes, functions, placeholders,
    /// units), use the dedicated constructors instead.
    pub fn new(ids: &ObjectIds, kind: ValueKind) -> Self {
        Self {
            id: ids.alloc(),
            kind,
        }
    }

    pub fn int(ids: &ObjectIds, value: i64) -> Self {
        Self::new(ids, ValueKind::Int(value))
    }

    pub fn str(ids: &ObjectIds, value: impl Into<SmolStr>) -> Self {
        Self::new(ids, ValueKind::Str(value.into()))
    }

    pub fn bool(ids: &ObjectIds, value: bool) -> Self {
        Self::new(ids, ValueKind::Bool(value))
    }

    pub fn list(ids: &ObjectIds, values: Vec<Value>) -> Self {
        Self::new(ids, ValueKind::List(Arc::new(values)))
    }

    pub fn class(class: Arc<ClassValue>) -> Self {
        Self {
            id: class.id,
            kind: ValueKind::Class(class),
        }
    }

    pub fn function(function: Arc<FnValue>) -> Self {
        Self {
            id: function.id,
            kind: ValueKind::Function(function),
        }
    }

    pub fn instance(instance: Arc<InstanceValue>) -> Self {
        Self {
            id: instance.id,
            kind: ValueKind::Instance(instance),
        }
    }

    /// Wrap a unit object. Identity is the unit's own id, so every
    /// wrapping of the same unit compares identical.
    pub fn unit(unit: UnitHandle) -> Self {
        Self {
            id: unit.object_id(),
            kind: ValueKind::Unit(unit),
        }
    }

    pub fn placeholder(placeholder: Arc<Placeholder>) -> Self {
        Self {
            id: placeholder.id,
            kind: ValueKind::Placeholder(placeholder),
        }
    }

    /// This value's identity. Preserved across clones.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Short human-readable kind name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            ValueKind::Int(_) => "int",
            ValueKind::Str(_) => "str",
            ValueKind::Bool(_) => "bool",
            ValueKind::Class(_) => "class",
            ValueKind::Function(_) => "function",
            ValueKind::Instance(_) => "instance",
            ValueKind::Unit(_) => "unit",
            ValueKind::Placeholder(_) => "placeholder",
            ValueKind::List(_) => "list",
        }
    }

    pub fn as_placeholder(&self) -> Option<&Arc<Placeholder>> {
        match &self.kind {
            ValueKind::Placeholder(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Arc<ClassValue>> {
        match &self.kind {
            ValueKind::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_unit(&self) -> Option<&UnitHandle> {
        match &self.kind {
            ValueKind::Unit(u) => Some(u),
            _ => None,
        }
    }
}

// ============================================================================
// CLASSES AND FUNCTIONS
// ============================================================================

/// A class declared in a unit body.
#[derive(Debug)]
pub struct ClassValue {
    pub id: ObjectId,
    pub name: AttrName,
    pub doc: Option<SmolStr>,
    /// Base-class values. May include placeholders: a class is allowed to
    /// subclass a stubbed external symbol.
    pub bases: Vec<Value>,
    /// Metaclass value, if declared. Placeholders are only accepted here
    /// when synthesized with the metaclass special form.
    pub metaclass: Option<Value>,
    pub members: Namespace,
}

/// A function declared in a unit body. Carries signature and doc string
/// only; there is nothing to execute.
#[derive(Debug)]
pub struct FnValue {
    pub id: ObjectId,
    pub name: AttrName,
    pub doc: Option<SmolStr>,
    pub params: Vec<ParamValue>,
    /// Return annotation as source text, never evaluated.
    pub ret: Option<SmolStr>,
}

#[derive(Debug, Clone)]
pub struct ParamValue {
    pub name: AttrName,
    /// Annotation as source text, never evaluated.
    pub annotation: Option<SmolStr>,
    pub default: Option<Value>,
}

/// The opaque result of a call.
#[derive(Debug)]
pub struct InstanceValue {
    pub id: ObjectId,
    pub callee: Value,
    pub args: Vec<Value>,
}

// ============================================================================
// PLACEHOLDERS
// ============================================================================

/// Which special placeholder form a synthesized value takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// Default mock-like placeholder: supports attribute and call
    /// traversal, usable as a base class.
    Mock,
    /// Usable in metaclass position.
    Metaclass,
    /// Usable as a decorator; application passes the decorated
    /// definition through unchanged (doc strings survive).
    Decorator,
}

/// A synthesized stand-in for a value on a stubbed unit.
///
/// Carries enough identity to be recognized later as "this came from unit
/// X, attribute Y" without the real object: the originating unit and
/// attribute, plus any further traversal steps (attribute reads, calls)
/// taken from there.
#[derive(Debug)]
pub struct Placeholder {
    pub id: ObjectId,
    pub unit: UnitName,
    pub attr: AttrName,
    pub traversals: Vec<Traversal>,
    pub kind: PlaceholderKind,
}

/// One step taken from a placeholder's toplevel origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Traversal {
    /// An attribute read.
    Attr(AttrName),
    /// A call, remembering the argument count.
    Call(usize),
}

impl Placeholder {
    pub fn new(
        ids: &ObjectIds,
        unit: UnitName,
        attr: AttrName,
        kind: PlaceholderKind,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: ids.alloc(),
            unit,
            attr,
            traversals: Vec::new(),
            kind,
        })
    }

    /// Derive a new placeholder one attribute read further along.
    pub fn traverse_attr(&self, ids: &ObjectIds, name: &str) -> Arc<Self> {
        self.extended(ids, Traversal::Attr(AttrName::new(name)))
    }

    /// Derive a new placeholder one call further along.
    pub fn traverse_call(&self, ids: &ObjectIds, argc: usize) -> Arc<Self> {
        self.extended(ids, Traversal::Call(argc))
    }

    fn extended(&self, ids: &ObjectIds, step: Traversal) -> Arc<Self> {
        let mut traversals = self.traversals.clone();
        traversals.push(step);
        Arc::new(Self {
            id: ids.alloc(),
            unit: self.unit.clone(),
            attr: self.attr.clone(),
            traversals,
            // Traversal results are plain mock placeholders regardless of
            // what special form they started from.
            kind: PlaceholderKind::Mock,
        })
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}::{}", self.unit, self.attr)?;
        for step in &self.traversals {
            match step {
                Traversal::Attr(name) => write!(f, ".{name}")?,
                Traversal::Call(argc) => write!(f, "({argc} args)")?,
            }
        }
        write!(f, ">")
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> UnitName {
        UnitName::new(s).unwrap()
    }

    #[test]
    fn clone_preserves_identity() {
        let ids = ObjectIds::default();
        let value = Value::int(&ids, 7);
        let copy = value.clone();
        assert_eq!(value.id(), copy.id());
    }

    #[test]
    fn fresh_values_have_distinct_identity() {
        let ids = ObjectIds::default();
        let a = Value::int(&ids, 7);
        let b = Value::int(&ids, 7);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn placeholder_traversal_derives_fresh_mock() {
        let ids = ObjectIds::default();
        let base = Placeholder::new(
            &ids,
            name("ext.pkg"),
            AttrName::new("Widget"),
            PlaceholderKind::Metaclass,
        );
        let derived = base.traverse_attr(&ids, "field").traverse_call(&ids, 2);
        assert_ne!(base.id, derived.id);
        assert_eq!(derived.kind, PlaceholderKind::Mock);
        assert_eq!(
            derived.traversals,
            vec![Traversal::Attr(AttrName::new("field")), Traversal::Call(2)]
        );
        assert_eq!(derived.to_string(), "<ext.pkg::Widget.field(2 args)>");
    }

    #[test]
    fn class_value_identity_is_intrinsic() {
        let ids = ObjectIds::default();
        let class = Arc::new(ClassValue {
            id: ids.alloc(),
            name: AttrName::new("Widget"),
            doc: None,
            bases: Vec::new(),
            metaclass: None,
            members: Namespace::default(),
        });
        let a = Value::class(Arc::clone(&class));
        let b = Value::class(class);
        assert_eq!(a.id(), b.id());
    }
}
