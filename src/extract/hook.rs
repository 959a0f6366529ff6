//! The extraction resolver hook.
//!
//! Installed on the host for the duration of a run, the hook decides for
//! every cache-missed unit name whether to serve a stub, a tracked form,
//! or to step aside and let the default loader run. The decision depends
//! on the stubbing policy, on whether the name is first-party, and on the
//! current extraction phase.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::base::UnitName;
use crate::ctx::{ExtractionPhase, RunCtx, Strategy};
use crate::error::ExtractError;
use crate::extract::policy::{PolicyDecision, StubsConfig};
use crate::extract::stubs::{SpecialMarkers, StubFacade};
use crate::extract::tracking::{DelegatingFacade, ReinitFacade};
use crate::host::{
    exec_program, Host, Namespace, ResolverHook, StaticMode, Unit, UnitHandle,
};

/// The resolution decision for one unit name.
#[derive(Debug)]
struct ResolveState {
    strategy: Strategy,
    is_firstparty: bool,
}

#[derive(Debug)]
pub struct ExtractionHook {
    config: StubsConfig,
    firstparty_packages: FxHashSet<SmolStr>,
    markers: Arc<RwLock<SpecialMarkers>>,
    /// Stub units served this run, cached per name.
    stash_stubbed: RwLock<FxHashMap<UnitName, UnitHandle>>,
    /// Raw units captured after the exploration phase. Tracked forms
    /// delegate to these, and first-party re-initialization reads their
    /// source.
    stash_raw: RwLock<FxHashMap<UnitName, UnitHandle>>,
    /// Tracked third-party units, cached per name. First-party tracked
    /// units are deliberately absent: they are rebuilt on every
    /// resolution.
    stash_tracked: RwLock<FxHashMap<UnitName, UnitHandle>>,
    /// Units that have been through inspection.
    inspected: RwLock<FxHashSet<UnitName>>,
}

impl ExtractionHook {
    pub fn new(
        config: StubsConfig,
        firstparty_packages: impl IntoIterator<Item = SmolStr>,
    ) -> Self {
        Self {
            config,
            firstparty_packages: firstparty_packages.into_iter().collect(),
            markers: Arc::new(RwLock::new(SpecialMarkers::default())),
            stash_stubbed: RwLock::new(FxHashMap::default()),
            stash_raw: RwLock::new(FxHashMap::default()),
            stash_tracked: RwLock::new(FxHashMap::default()),
            inspected: RwLock::new(FxHashSet::default()),
        }
    }

    pub fn config(&self) -> &StubsConfig {
        &self.config
    }

    pub fn is_firstparty(&self, name: &UnitName) -> bool {
        self.firstparty_packages.contains(name.toplevel())
    }

    /// Take on the special-form markers found during discovery.
    pub fn adopt_markers(&self, markers: &SpecialMarkers) {
        self.markers.write().merge(markers);
    }

    /// Capture the real units currently in the host registry as the raw
    /// stash. Run after the exploration phase, while the registry still
    /// holds genuinely-initialized units.
    pub fn capture_raw(&self, host: &Host) {
        let mut raw = self.stash_raw.write();
        for (name, unit) in host.registry().iter() {
            if host.is_stdlib(name.toplevel()) {
                continue;
            }
            if self.config.decide(name) == PolicyDecision::Bypass {
                continue;
            }
            if unit.is_facade() {
                continue;
            }
            raw.insert(name.clone(), Arc::clone(unit));
        }
        debug!(count = raw.len(), "captured raw units");
    }

    pub fn raw(&self, name: &UnitName) -> Option<UnitHandle> {
        self.stash_raw.read().get(name.as_str()).cloned()
    }

    pub fn mark_inspected(&self, name: UnitName) {
        self.inspected.write().insert(name);
    }

    /// Every unit name this hook has touched: served stubs and tracked
    /// forms, captured raws, and inspected units. These are the names
    /// that must not survive in the registry past a phase boundary.
    pub fn all_dirty(&self) -> FxHashSet<UnitName> {
        let mut dirty: FxHashSet<UnitName> =
            self.stash_stubbed.read().keys().cloned().collect();
        dirty.extend(self.stash_tracked.read().keys().cloned());
        dirty.extend(self.stash_raw.read().keys().cloned());
        dirty.extend(self.inspected.read().iter().cloned());
        dirty
    }

    /// The first-party subset of [`Self::all_dirty`]. Evicting only these
    /// between sibling inspections keeps third-party stubs and tracked
    /// forms stable across the extraction phase.
    pub fn firstparty_dirty(&self) -> FxHashSet<UnitName> {
        self.all_dirty()
            .into_iter()
            .filter(|name| self.is_firstparty(name))
            .collect()
    }

    // ------------------------------------------------------------------------
    // DECISION
    // ------------------------------------------------------------------------

    fn find_state(&self, host: &Host, ctx: &RunCtx, name: &UnitName) -> Option<ResolveState> {
        if host.is_stdlib(name.toplevel()) {
            debug!(unit = %name, "stdlib unit, not intercepting");
            return None;
        }
        let decision = self.config.decide(name);
        if decision == PolicyDecision::Bypass {
            debug!(unit = %name, "bypassed by policy");
            return None;
        }
        let is_firstparty = self.is_firstparty(name);

        // A stub-eligible third-party unit is stubbed no matter the
        // phase; nothing downstream ever needs its real form through the
        // hook.
        if decision == PolicyDecision::Eligible && !is_firstparty {
            return Some(ResolveState {
                strategy: Strategy::Stub,
                is_firstparty,
            });
        }

        match ctx.phase() {
            Some(ExtractionPhase::Exploration) => {
                // Real loads; raw capture happens at the end of the
                // phase.
                None
            }
            Some(ExtractionPhase::Preparation) | Some(ExtractionPhase::Extraction) => {
                if ctx.under_inspection() == Some(name) {
                    warn!(
                        unit = %name,
                        "Direct resolution detected of a unit currently under \
                         inspection. This is probably a bug in the unit itself \
                         (an indirect self-import); serving a stub instead.",
                    );
                    return Some(ResolveState {
                        strategy: Strategy::Stub,
                        is_firstparty,
                    });
                }
                let strategy = if decision == PolicyDecision::NeverStub {
                    Strategy::Track
                } else {
                    Strategy::Stub
                };
                Some(ResolveState {
                    strategy,
                    is_firstparty,
                })
            }
            phase => {
                warn!(
                    unit = %name,
                    ?phase,
                    "resolution intercepted outside a load-bearing phase; \
                     deferring to the default loader",
                );
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // CONSTRUCTION
    // ------------------------------------------------------------------------

    fn make_stub(&self, host: &Host, name: &UnitName) -> UnitHandle {
        if let Some(cached) = self.stash_stubbed.read().get(name.as_str()) {
            return Arc::clone(cached);
        }
        let raw = self.raw(name);
        let unit = Unit::with_facade(
            host.ids(),
            name.clone(),
            Box::new(StubFacade::new(Arc::clone(&self.markers))),
        );
        match &raw {
            Some(raw) => {
                unit.set_is_package(raw.is_package());
                unit.set_origin(raw.origin());
            }
            // Nothing known about the unit, so err on the side of
            // letting dotted child lookups proceed.
            None => unit.set_is_package(true),
        }
        unit.set_strategy(Strategy::Stub);
        self.stash_stubbed
            .write()
            .insert(name.clone(), Arc::clone(&unit));
        unit
    }

    fn make_tracked(
        &self,
        host: &mut Host,
        ctx: &mut RunCtx,
        name: &UnitName,
        is_firstparty: bool,
    ) -> Result<UnitHandle, ExtractError> {
        if !is_firstparty {
            if let Some(cached) = self.stash_tracked.read().get(name.as_str()) {
                return Ok(Arc::clone(cached));
            }
        }
        let raw = self
            .raw(name)
            .ok_or_else(|| ExtractError::MissingRawUnit(name.clone()))?;

        let unit = if is_firstparty {
            // Rebuild the namespace from source right now, under the
            // current hook state. The resulting wrapper is never cached:
            // a later resolution must see the then-current state, not
            // this one.
            let source = raw
                .source()
                .ok_or_else(|| ExtractError::MissingRawUnit(name.clone()))?;
            let outcome = exec_program(
                host,
                ctx,
                name,
                &source,
                Namespace::new(),
                StaticMode::Runtime,
            )
            .map_err(|cause| {
                error!(unit = %name, error = %cause, "tracked re-initialization failed");
                ExtractError::init(name.clone(), cause)
            })?;
            Unit::with_facade(
                raw.ids(),
                name.clone(),
                Box::new(ReinitFacade::new(outcome.namespace, outcome.exports)),
            )
        } else {
            Unit::with_facade(
                raw.ids(),
                name.clone(),
                Box::new(DelegatingFacade::new(Arc::clone(&raw))),
            )
        };
        unit.set_is_package(raw.is_package());
        unit.set_origin(raw.origin());
        unit.set_strategy(Strategy::Track);
        if !is_firstparty {
            self.stash_tracked
                .write()
                .insert(name.clone(), Arc::clone(&unit));
        }
        Ok(unit)
    }
}

impl ResolverHook for ExtractionHook {
    fn resolve(
        &self,
        host: &mut Host,
        ctx: &mut RunCtx,
        name: &UnitName,
    ) -> Result<Option<UnitHandle>, ExtractError> {
        let Some(state) = self.find_state(host, ctx, name) else {
            return Ok(None);
        };
        debug!(unit = %name, strategy = %state.strategy, "intercepting resolution");
        let unit = match state.strategy {
            Strategy::Stub => self.make_stub(host, name),
            Strategy::Track => self.make_tracked(host, ctx, name, state.is_firstparty)?,
            Strategy::Inspect => {
                // Inspection is driven from outside the hook; a
                // resolution should never ask for it. Degrade to the
                // default loader rather than abort the whole run.
                error!(unit = %name, "inspect strategy reached through resolution");
                return Ok(None);
            }
        };
        host.registry_mut().insert(name.clone(), Arc::clone(&unit));
        Ok(Some(unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> UnitName {
        UnitName::new(s).unwrap()
    }

    fn hook() -> ExtractionHook {
        ExtractionHook::new(
            StubsConfig::with_stubs(),
            [SmolStr::new("mypkg")],
        )
    }

    #[test]
    fn thirdparty_eligible_is_stubbed_in_any_phase() {
        let host = Host::new();
        let mut ctx = RunCtx::default();
        let hook = hook();
        let state = hook.find_state(&host, &ctx, &name("extpkg.sub")).unwrap();
        assert_eq!(state.strategy, Strategy::Stub);

        ctx.enter_phase(ExtractionPhase::Hooked);
        ctx.enter_phase(ExtractionPhase::Exploration);
        let state = hook.find_state(&host, &ctx, &name("extpkg.sub")).unwrap();
        assert_eq!(state.strategy, Strategy::Stub);
    }

    #[test]
    fn firstparty_loads_real_during_exploration() {
        let host = Host::new();
        let mut ctx = RunCtx::default();
        ctx.enter_phase(ExtractionPhase::Hooked);
        ctx.enter_phase(ExtractionPhase::Exploration);
        assert!(hook().find_state(&host, &ctx, &name("mypkg.mod")).is_none());
    }

    #[test]
    fn firstparty_is_stubbed_during_extraction() {
        let host = Host::new();
        let mut ctx = RunCtx::default();
        ctx.enter_phase(ExtractionPhase::Hooked);
        ctx.enter_phase(ExtractionPhase::Exploration);
        ctx.enter_phase(ExtractionPhase::Preparation);
        ctx.enter_phase(ExtractionPhase::Extraction);
        let state = hook().find_state(&host, &ctx, &name("mypkg.mod")).unwrap();
        assert_eq!(state.strategy, Strategy::Stub);
    }

    #[test]
    fn unit_under_inspection_degrades_to_stub() {
        let host = Host::new();
        let mut ctx = RunCtx::default();
        ctx.enter_phase(ExtractionPhase::Hooked);
        ctx.enter_phase(ExtractionPhase::Exploration);
        ctx.enter_phase(ExtractionPhase::Preparation);
        ctx.enter_phase(ExtractionPhase::Extraction);
        ctx.begin_inspection(name("mypkg.broken")).unwrap();

        // The inspected unit itself: stubbed with a warning even though
        // first-party no-stub units would normally be tracked.
        let mut config = StubsConfig::with_stubs();
        config.firstparty_blocklist.insert(name("mypkg.broken"));
        let hook2 = ExtractionHook::new(config, [SmolStr::new("mypkg")]);
        let state = hook2.find_state(&host, &ctx, &name("mypkg.broken")).unwrap();
        assert_eq!(state.strategy, Strategy::Stub);

        // A different first-party no-stub unit is still tracked.
        let mut config = StubsConfig::with_stubs();
        config.firstparty_blocklist.insert(name("mypkg.other"));
        let hook3 = ExtractionHook::new(config, [SmolStr::new("mypkg")]);
        let state = hook3.find_state(&host, &ctx, &name("mypkg.other")).unwrap();
        assert_eq!(state.strategy, Strategy::Track);
    }

    #[test]
    fn stdlib_and_bypass_are_not_intercepted() {
        let mut host = Host::new();
        host.mark_stdlib("core");
        let mut ctx = RunCtx::default();
        ctx.enter_phase(ExtractionPhase::Hooked);
        ctx.enter_phase(ExtractionPhase::Exploration);

        let mut config = StubsConfig::with_stubs();
        config.bypass_packages.insert(SmolStr::new("plugins"));
        let hook = ExtractionHook::new(config, [SmolStr::new("mypkg")]);
        assert!(hook.find_state(&host, &ctx, &name("core.mem")).is_none());
        assert!(hook.find_state(&host, &ctx, &name("plugins.x")).is_none());
    }

    #[test]
    fn stub_units_are_cached_per_name() {
        let host = Host::new();
        let hook = hook();
        let a = hook.make_stub(&host, &name("extpkg.sub"));
        let b = hook.make_stub(&host, &name("extpkg.sub"));
        assert_eq!(a.object_id(), b.object_id());
        assert_eq!(a.strategy(), Some(Strategy::Stub));
        assert!(a.is_package());
    }
}
