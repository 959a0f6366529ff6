//! The runtime host: unit sources, the loaded-unit registry, and the
//! resolution entry point.
//!
//! [`Host::resolve`] is the single door every dotted-name lookup goes
//! through. A cached registry entry wins outright; otherwise an
//! installed [`ResolverHook`] gets the first refusal, and only if it
//! declines does the default loader execute the unit's source program.

mod eval;
mod namespace;
mod registry;
mod unit;
mod value;

pub use eval::{exec_program, exec_two_pass, EvalOutcome, StaticMode};
pub use namespace::Namespace;
pub use registry::UnitRegistry;
pub use unit::{Unit, UnitBody, UnitFacade, UnitHandle, UnitState, RESERVED_ATTRS};
pub use value::{
    ClassValue, FnValue, InstanceValue, ParamValue, Placeholder, PlaceholderKind,
    Traversal, Value, ValueKind,
};

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::{debug, error};

use crate::base::{ObjectIds, UnitName};
use crate::ctx::RunCtx;
use crate::error::ExtractError;
use crate::source::{parse_unit_source, UnitSource};

// ============================================================================
// SOURCE INDEX
// ============================================================================

#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub source: Arc<UnitSource>,
    pub origin: Arc<str>,
}

/// Parsed unit programs by dotted name. Populated up front (from a
/// directory walk or inline registration) before any resolution runs.
#[derive(Debug, Default)]
pub struct SourceIndex {
    entries: IndexMap<UnitName, SourceEntry>,
}

impl SourceIndex {
    pub fn get(&self, name: &str) -> Option<&SourceEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &UnitName> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UnitName, &SourceEntry)> {
        self.entries.iter()
    }

    /// Whether any indexed unit sits strictly below `name`.
    pub fn has_children(&self, name: &UnitName) -> bool {
        self.entries.keys().any(|n| n.is_within(name.as_str()))
    }
}

// ============================================================================
// RESOLVER HOOK
// ============================================================================

/// Interception point for unit resolution. At most one hook is installed
/// at a time; while installed, it sees every cache miss before the
/// default loader does.
pub trait ResolverHook: Send + Sync + std::fmt::Debug {
    /// Produce a unit for `name`, or return `Ok(None)` to defer to the
    /// default loader.
    fn resolve(
        &self,
        host: &mut Host,
        ctx: &mut RunCtx,
        name: &UnitName,
    ) -> Result<Option<UnitHandle>, ExtractError>;
}

// ============================================================================
// HOST
// ============================================================================

#[derive(Debug, Default)]
pub struct Host {
    ids: ObjectIds,
    registry: UnitRegistry,
    sources: SourceIndex,
    stdlib: FxHashSet<SmolStr>,
    hook: Option<Arc<dyn ResolverHook>>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &ObjectIds {
        &self.ids
    }

    pub fn registry(&self) -> &UnitRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut UnitRegistry {
        &mut self.registry
    }

    pub fn sources(&self) -> &SourceIndex {
        &self.sources
    }

    /// Register a unit program from inline text.
    pub fn add_source(&mut self, name: &str, text: &str) -> Result<(), ExtractError> {
        let name = UnitName::new(name)?;
        self.add_source_file(name, text, Arc::from("<inline>"))
    }

    /// Register a unit program, recording where it came from. The text is
    /// parsed eagerly so malformed programs surface at registration time.
    pub fn add_source_file(
        &mut self,
        name: UnitName,
        text: &str,
        origin: Arc<str>,
    ) -> Result<(), ExtractError> {
        let source = parse_unit_source(text)
            .map_err(|cause| ExtractError::parse(name.clone(), cause))?;
        self.sources.entries.insert(
            name,
            SourceEntry {
                source: Arc::new(source),
                origin,
            },
        );
        Ok(())
    }

    /// Mark a toplevel package as part of the host's own runtime. Such
    /// names are never intercepted or stashed.
    pub fn mark_stdlib(&mut self, package: &str) {
        self.stdlib.insert(SmolStr::new(package));
    }

    pub fn is_stdlib(&self, toplevel: &str) -> bool {
        self.stdlib.contains(toplevel)
    }

    // ------------------------------------------------------------------------
    // HOOK INSTALLATION
    // ------------------------------------------------------------------------

    /// Install a resolver hook. Fails if one is already installed, which
    /// keeps concurrent or nested interception runs from stepping on each
    /// other.
    pub fn install_hook(&mut self, hook: Arc<dyn ResolverHook>) -> Result<(), ExtractError> {
        if self.hook.is_some() {
            return Err(ExtractError::HookAlreadyInstalled);
        }
        self.hook = Some(hook);
        Ok(())
    }

    pub fn remove_hook(&mut self) -> Option<Arc<dyn ResolverHook>> {
        self.hook.take()
    }

    pub fn hook_installed(&self) -> bool {
        self.hook.is_some()
    }

    // ------------------------------------------------------------------------
    // RESOLUTION
    // ------------------------------------------------------------------------

    /// Resolve a dotted name to a unit, loading it if necessary.
    pub fn resolve(
        &mut self,
        ctx: &mut RunCtx,
        name: &UnitName,
    ) -> Result<UnitHandle, ExtractError> {
        if let Some(unit) = self.registry.get(name.as_str()) {
            return Ok(unit);
        }
        if let Some(hook) = self.hook.clone() {
            if let Some(unit) = hook.resolve(self, ctx, name)? {
                return Ok(unit);
            }
        }
        self.load_default(ctx, name)
    }

    /// Load a unit from its indexed source, registering it and executing
    /// its program.
    fn load_default(
        &mut self,
        ctx: &mut RunCtx,
        name: &UnitName,
    ) -> Result<UnitHandle, ExtractError> {
        let entry = self
            .sources
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| ExtractError::UnitNotFound(name.clone()))?;

        debug!(unit = %name, "loading unit");
        let unit = Unit::plain(&self.ids, name.clone());
        unit.set_source(Arc::clone(&entry.source));
        unit.set_origin(Some(Arc::clone(&entry.origin)));
        unit.set_is_package(
            entry.source.is_package() || self.sources.has_children(name),
        );
        // Registered before execution so a load already in flight is
        // visible; body reads against the half-built unit fail with a
        // missing-attribute error rather than recursing forever.
        self.registry.insert(name.clone(), Arc::clone(&unit));

        let outcome = exec_program(
            self,
            ctx,
            name,
            &entry.source,
            Namespace::new(),
            StaticMode::Runtime,
        );
        match outcome {
            Ok(outcome) => {
                unit.apply_outcome(
                    outcome.namespace,
                    outcome.doc,
                    outcome.exports,
                    outcome.is_package,
                );
                // Loaded units become attributes of their parent package,
                // the way loader machinery conventionally wires them.
                if let Some(parent) = name.parent() {
                    if let Some(parent_unit) = self.registry.get(parent.as_str()) {
                        parent_unit.attach_child(name.relname(), Arc::clone(&unit));
                    }
                }
                Ok(unit)
            }
            Err(cause) => {
                self.registry.remove(name.as_str());
                error!(unit = %name, error = %cause, "unit initialization failed");
                Err(ExtractError::init(name.clone(), cause))
            }
        }
    }

    /// Re-execute a registered plain unit's program in place, keeping the
    /// unit object itself (and therefore its identity) intact.
    pub fn reload(
        &mut self,
        ctx: &mut RunCtx,
        name: &UnitName,
    ) -> Result<UnitHandle, ExtractError> {
        let unit = self
            .registry
            .get(name.as_str())
            .ok_or_else(|| ExtractError::UnitNotFound(name.clone()))?;
        let source = unit
            .source()
            .ok_or_else(|| ExtractError::MissingRawUnit(name.clone()))?;
        debug!(unit = %name, "reloading unit in place");
        let outcome = exec_program(self, ctx, name, &source, Namespace::new(), StaticMode::Runtime);
        match outcome {
            Ok(outcome) => {
                unit.apply_outcome(
                    outcome.namespace,
                    outcome.doc,
                    outcome.exports,
                    outcome.is_package,
                );
                Ok(unit)
            }
            Err(cause) => {
                error!(unit = %name, error = %cause, "unit reload failed");
                Err(ExtractError::init(name.clone(), cause))
            }
        }
    }
}
