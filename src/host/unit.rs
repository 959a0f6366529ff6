//! Namespace units.
//!
//! A unit is the object produced by resolving a dotted name: metadata
//! plus an attribute body. Bodies come in two flavors. *Plain* units own
//! a concrete namespace filled in by executing their source program.
//! *Facade* units delegate attribute access to a [`UnitFacade`], which is
//! how stubbed and tracked stand-ins intercept reads.

use indexmap::IndexMap;
use parking_lot::RwLock;
use smol_str::SmolStr;
use std::sync::Arc;

use crate::base::{AttrName, ObjectId, ObjectIds, UnitName};
use crate::ctx::{RunCtx, Strategy};
use crate::error::ExtractError;
use crate::host::namespace::Namespace;
use crate::host::value::Value;
use crate::source::UnitSource;

pub type UnitHandle = Arc<Unit>;

/// Attribute names answered from unit metadata rather than the body.
/// Reads of these never reach a facade and are never tracked.
pub const RESERVED_ATTRS: [&str; 3] = ["__name__", "__exports__", "__origin__"];

/// Behavior plugged into a facade unit. Implementations synthesize or
/// delegate attribute values instead of reading a stored namespace.
pub trait UnitFacade: Send + Sync + std::fmt::Debug {
    /// Produce the value for an attribute read, or fail.
    fn attr(
        &self,
        unit: &Unit,
        ctx: &mut RunCtx,
        name: &str,
    ) -> Result<Value, ExtractError>;

    /// Produce the unit's export list.
    fn export_list(
        &self,
        unit: &Unit,
        ctx: &mut RunCtx,
    ) -> Result<Vec<AttrName>, ExtractError>;
}

#[derive(Debug)]
pub enum UnitBody {
    Plain(RwLock<Namespace>),
    Facade(Box<dyn UnitFacade>),
}

/// Mutable unit metadata, behind a lock on the unit.
#[derive(Debug, Default)]
pub struct UnitState {
    pub doc: Option<SmolStr>,
    /// Explicit export list, if one was declared or injected.
    pub exports: Option<Vec<AttrName>>,
    pub is_package: bool,
    /// Where the source came from, e.g. a file path.
    pub origin: Option<Arc<str>>,
    /// Child units attached under this one, by relative name.
    pub children: IndexMap<AttrName, UnitHandle>,
    /// How this particular unit object was produced.
    pub strategy: Option<Strategy>,
    pub source: Option<Arc<UnitSource>>,
}

#[derive(Debug)]
pub struct Unit {
    name: UnitName,
    object_id: ObjectId,
    ids: ObjectIds,
    state: RwLock<UnitState>,
    body: UnitBody,
}

impl Unit {
    pub fn plain(ids: &ObjectIds, name: UnitName) -> UnitHandle {
        Arc::new(Self {
            name,
            object_id: ids.alloc(),
            ids: ids.clone(),
            state: RwLock::new(UnitState::default()),
            body: UnitBody::Plain(RwLock::new(Namespace::new())),
        })
    }

    pub fn with_facade(
        ids: &ObjectIds,
        name: UnitName,
        facade: Box<dyn UnitFacade>,
    ) -> UnitHandle {
        Arc::new(Self {
            name,
            object_id: ids.alloc(),
            ids: ids.clone(),
            state: RwLock::new(UnitState::default()),
            body: UnitBody::Facade(facade),
        })
    }

    pub fn name(&self) -> &UnitName {
        &self.name
    }

    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    pub fn ids(&self) -> &ObjectIds {
        &self.ids
    }

    // ------------------------------------------------------------------------
    // METADATA
    // ------------------------------------------------------------------------

    pub fn doc(&self) -> Option<SmolStr> {
        self.state.read().doc.clone()
    }

    pub fn is_package(&self) -> bool {
        self.state.read().is_package
    }

    pub fn set_is_package(&self, is_package: bool) {
        self.state.write().is_package = is_package;
    }

    pub fn origin(&self) -> Option<Arc<str>> {
        self.state.read().origin.clone()
    }

    pub fn set_origin(&self, origin: Option<Arc<str>>) {
        self.state.write().origin = origin;
    }

    pub fn strategy(&self) -> Option<Strategy> {
        self.state.read().strategy
    }

    pub fn set_strategy(&self, strategy: Strategy) {
        self.state.write().strategy = Some(strategy);
    }

    pub fn source(&self) -> Option<Arc<UnitSource>> {
        self.state.read().source.clone()
    }

    pub fn set_source(&self, source: Arc<UnitSource>) {
        self.state.write().source = Some(source);
    }

    pub fn set_exports(&self, exports: Vec<AttrName>) {
        self.state.write().exports = Some(exports);
    }

    pub fn declared_exports(&self) -> Option<Vec<AttrName>> {
        self.state.read().exports.clone()
    }

    pub fn attach_child(&self, relname: AttrName, child: UnitHandle) {
        self.state.write().children.insert(relname, child);
    }

    pub fn child(&self, relname: &str) -> Option<UnitHandle> {
        self.state.read().children.get(relname).cloned()
    }

    // ------------------------------------------------------------------------
    // ATTRIBUTE ACCESS
    // ------------------------------------------------------------------------

    /// Resolve an attribute on this unit.
    ///
    /// Reserved attributes come straight from metadata and bypass the
    /// body, so they stay answerable (and untracked) on facade units.
    /// Attached children shadow the body next, then the body itself.
    pub fn attr(&self, ctx: &mut RunCtx, name: &str) -> Result<Value, ExtractError> {
        match name {
            "__name__" => return Ok(Value::str(&self.ids, self.name.as_str())),
            "__exports__" => {
                let exports = self.export_list(ctx)?;
                let values = exports
                    .iter()
                    .map(|e| Value::str(&self.ids, e.as_str()))
                    .collect();
                return Ok(Value::list(&self.ids, values));
            }
            "__origin__" => {
                let origin = self.origin();
                return Ok(Value::str(
                    &self.ids,
                    origin.as_deref().unwrap_or(""),
                ));
            }
            _ => {}
        }
        if let Some(child) = self.child(name) {
            return Ok(Value::unit(child));
        }
        match &self.body {
            UnitBody::Plain(namespace) => namespace
                .read()
                .get(name)
                .cloned()
                .ok_or_else(|| ExtractError::attr_not_found(self.name.as_str(), name)),
            UnitBody::Facade(facade) => facade.attr(self, ctx, name),
        }
    }

    /// The unit's export list: the declared list if one exists, otherwise
    /// every public body name. Facades decide for themselves.
    pub fn export_list(&self, ctx: &mut RunCtx) -> Result<Vec<AttrName>, ExtractError> {
        if let Some(exports) = self.declared_exports() {
            return Ok(exports);
        }
        match &self.body {
            UnitBody::Plain(namespace) => Ok(namespace.read().public_names()),
            UnitBody::Facade(facade) => facade.export_list(self, ctx),
        }
    }

    /// Replace the body namespace of a plain unit. No effect on facades.
    pub fn replace_namespace(&self, namespace: Namespace) {
        if let UnitBody::Plain(body) = &self.body {
            *body.write() = namespace;
        }
    }

    /// Snapshot of a plain unit's namespace. Empty for facades.
    pub fn namespace_snapshot(&self) -> Namespace {
        match &self.body {
            UnitBody::Plain(body) => body.read().clone(),
            UnitBody::Facade(_) => Namespace::new(),
        }
    }

    pub fn is_facade(&self) -> bool {
        matches!(self.body, UnitBody::Facade(_))
    }

    /// Write the result of executing the unit's program into the unit.
    pub fn apply_outcome(
        &self,
        namespace: Namespace,
        doc: Option<SmolStr>,
        exports: Option<Vec<AttrName>>,
        is_package: bool,
    ) {
        self.replace_namespace(namespace);
        let mut state = self.state.write();
        state.doc = doc;
        state.exports = exports;
        if is_package {
            state.is_package = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> UnitName {
        UnitName::new(s).unwrap()
    }

    #[test]
    fn reserved_attrs_come_from_metadata() {
        let ids = ObjectIds::default();
        let unit = Unit::plain(&ids, name("pkg.mod"));
        unit.set_origin(Some(Arc::from("/src/pkg/mod.unit")));
        let mut ctx = RunCtx::default();

        let got = unit.attr(&mut ctx, "__name__").unwrap();
        match got.kind {
            crate::host::value::ValueKind::Str(s) => assert_eq!(s, "pkg.mod"),
            other => panic!("expected str, got {other:?}"),
        }
        let origin = unit.attr(&mut ctx, "__origin__").unwrap();
        match origin.kind {
            crate::host::value::ValueKind::Str(s) => assert_eq!(s, "/src/pkg/mod.unit"),
            other => panic!("expected str, got {other:?}"),
        }
    }

    #[test]
    fn children_shadow_body() {
        let ids = ObjectIds::default();
        let parent = Unit::plain(&ids, name("pkg"));
        let mut ns = Namespace::new();
        ns.insert(AttrName::new("sub"), Value::int(&ids, 1));
        parent.replace_namespace(ns);

        let child = Unit::plain(&ids, name("pkg.sub"));
        parent.attach_child(AttrName::new("sub"), Arc::clone(&child));

        let mut ctx = RunCtx::default();
        let got = parent.attr(&mut ctx, "sub").unwrap();
        assert_eq!(got.id(), child.object_id());
    }

    #[test]
    fn missing_attr_reports_unit_and_name() {
        let ids = ObjectIds::default();
        let unit = Unit::plain(&ids, name("pkg.mod"));
        let mut ctx = RunCtx::default();
        let err = unit.attr(&mut ctx, "nope").unwrap_err();
        assert!(err.to_string().contains("pkg.mod"));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn export_list_defaults_to_public_names() {
        let ids = ObjectIds::default();
        let unit = Unit::plain(&ids, name("pkg.mod"));
        let mut ns = Namespace::new();
        ns.insert(AttrName::new("visible"), Value::int(&ids, 1));
        ns.insert(AttrName::new("_private"), Value::int(&ids, 2));
        unit.replace_namespace(ns);

        let mut ctx = RunCtx::default();
        assert_eq!(unit.export_list(&mut ctx).unwrap(), ["visible"]);

        unit.set_exports(vec![AttrName::new("_private")]);
        assert_eq!(unit.export_list(&mut ctx).unwrap(), ["_private"]);
    }
}
