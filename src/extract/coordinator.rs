//! The extraction run coordinator.
//!
//! Drives a full run through its phases. Exploration loads every
//! first-party unit for real and captures the results as the raw stash.
//! Preparation rebuilds the first-party surface out of stubs and tracked
//! forms, injecting export lists and attaching child units. Extraction
//! then re-initializes each first-party unit one at a time under an
//! active provenance registry.
//!
//! Whatever happens inside the phases, teardown runs: the hook comes off
//! the host, run-dirtied registry entries are evicted, and the stashed
//! pre-run registry state is restored.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::base::UnitName;
use crate::ctx::{ExtractionPhase, ProvenanceRegistry, RunCtx, Strategy};
use crate::error::ExtractError;
use crate::extract::hook::ExtractionHook;
use crate::extract::policy::{PolicyDecision, StubsConfig};
use crate::extract::stash::RegistryStash;
use crate::extract::stubs::SpecialMarkers;
use crate::host::{exec_two_pass, Host, Namespace, ResolverHook, Unit, UnitHandle};
use crate::project::{discover_firstparty, Discovered};

/// Configuration for one extraction run.
#[derive(Debug, Default)]
pub struct ExtractOptions {
    /// Toplevel packages whose units are the subject of the run.
    pub firstparty_packages: FxHashSet<SmolStr>,
    pub stubs: StubsConfig,
    /// Special-form markers known up front, merged with whatever
    /// discovery finds in first-party source.
    pub special_markers: SpecialMarkers,
    /// Units that cannot be removed from the registry. Eviction reloads
    /// them in place instead.
    pub unpurgeable: FxHashSet<UnitName>,
}

impl ExtractOptions {
    pub fn for_packages(packages: impl IntoIterator<Item = SmolStr>) -> Self {
        Self {
            firstparty_packages: packages.into_iter().collect(),
            stubs: StubsConfig::with_stubs(),
            ..Self::default()
        }
    }
}

/// One inspected first-party unit, with everything observed about it.
#[derive(Debug)]
pub struct ExtractedUnit {
    pub unit: UnitHandle,
    /// Identity-keyed origins recorded while the unit initialized.
    pub provenance: ProvenanceRegistry,
    /// The exact source text the inspection ran.
    pub source: Arc<str>,
}

pub type ExtractedUnits = IndexMap<UnitName, ExtractedUnit>;

/// Run a full extraction over the host's first-party packages.
///
/// The host's registry is left exactly as it was found, on success and
/// on failure alike.
pub fn extract(
    host: &mut Host,
    options: &ExtractOptions,
) -> Result<ExtractedUnits, ExtractError> {
    let run_id = Uuid::new_v4();
    info!(
        %run_id,
        packages = ?options.firstparty_packages,
        "starting extraction run",
    );

    let discovered = discover_firstparty(host.sources(), &options.firstparty_packages);

    let stubs = options.stubs.clone();
    let mut stash = RegistryStash::capture(
        host,
        |name| options.unpurgeable.contains(name.as_str()),
        |name| stubs.decide(name) == PolicyDecision::Bypass,
    );
    for name in &options.unpurgeable {
        stash.mark_unpurgeable(name.clone());
    }

    let hook = Arc::new(ExtractionHook::new(
        options.stubs.clone(),
        options.firstparty_packages.iter().cloned(),
    ));
    hook.adopt_markers(&options.special_markers);
    hook.adopt_markers(&discovered.markers);

    let mut ctx = RunCtx::new();
    if let Err(error) = host.install_hook(Arc::clone(&hook) as Arc<dyn ResolverHook>) {
        stash.restore(host);
        return Err(error);
    }
    ctx.enter_phase(ExtractionPhase::Hooked);

    let result = run_phases(host, &mut ctx, &hook, &stash, &discovered);

    // Teardown, on every exit path. The hook comes off first so that
    // unpurgeable reloads during eviction run against the real loader.
    host.remove_hook();
    let dirty: FxHashSet<UnitName> = hook
        .all_dirty()
        .into_iter()
        .chain(stash.dirty_since_snapshot(host))
        .collect();
    stash.evict(host, &mut ctx, dirty)?;
    stash.restore(host);
    ctx.clear_phase();

    match &result {
        Ok(units) => info!(%run_id, units = units.len(), "extraction run finished"),
        Err(error) => error!(%run_id, %error, "extraction run failed"),
    }
    result
}

fn run_phases(
    host: &mut Host,
    ctx: &mut RunCtx,
    hook: &ExtractionHook,
    stash: &RegistryStash,
    discovered: &Discovered,
) -> Result<ExtractedUnits, ExtractError> {
    // EXPLORATION: everything first-party loads for real (third-party
    // stub-eligibles are already stubbed), then the real forms are
    // captured as the raw stash.
    ctx.enter_phase(ExtractionPhase::Exploration);
    for name in &discovered.names {
        host.resolve(ctx, name)?;
    }
    hook.capture_raw(host);
    stash.evict(host, ctx, hook.all_dirty())?;

    // PREPARATION: the first-party surface is rebuilt out of stubs and
    // tracked forms, export lists are injected from the raw forms, and
    // child units are attached to their parents. Parents come before
    // children in discovery order, so attachment sees the parent already
    // resolved.
    ctx.enter_phase(ExtractionPhase::Preparation);
    for name in &discovered.names {
        let unit = host.resolve(ctx, name)?;
        inject_exports(hook, name, &unit);
        attach_to_parent(host, ctx, hook, name, &unit)?;
    }
    stash.evict(host, ctx, hook.all_dirty())?;

    // EXTRACTION: one unit at a time, re-initialized from source under
    // an active provenance registry. First-party residue is evicted
    // between siblings so each inspection starts from the prepared
    // state.
    ctx.enter_phase(ExtractionPhase::Extraction);
    let mut results = ExtractedUnits::default();
    for name in &discovered.names {
        let extracted = inspect_unit(host, ctx, hook, name)?;
        results.insert(name.clone(), extracted);
        stash.evict(host, ctx, hook.firstparty_dirty())?;
    }
    Ok(results)
}

/// Copy the raw unit's export list onto its prepared stand-in, so star
/// imports against the stand-in resolve the same names the real unit
/// would export.
fn inject_exports(hook: &ExtractionHook, name: &UnitName, unit: &UnitHandle) {
    let Some(raw) = hook.raw(name) else {
        return;
    };
    let exports = raw
        .declared_exports()
        .unwrap_or_else(|| raw.namespace_snapshot().public_names());
    unit.set_exports(exports);
}

/// Attach a unit to its parent package, shadowing any same-named
/// attribute in the parent's body.
fn attach_to_parent(
    host: &mut Host,
    ctx: &mut RunCtx,
    hook: &ExtractionHook,
    name: &UnitName,
    unit: &UnitHandle,
) -> Result<(), ExtractError> {
    let Some(parent) = name.parent() else {
        return Ok(());
    };
    if !hook.is_firstparty(&parent) {
        return Ok(());
    }
    let parent_unit = host.resolve(ctx, &parent)?;
    parent_unit.attach_child(name.relname(), Arc::clone(unit));
    Ok(())
}

/// Re-initialize one unit from its captured source under observation.
fn inspect_unit(
    host: &mut Host,
    ctx: &mut RunCtx,
    hook: &ExtractionHook,
    name: &UnitName,
) -> Result<ExtractedUnit, ExtractError> {
    let raw = hook
        .raw(name)
        .ok_or_else(|| ExtractError::MissingRawUnit(name.clone()))?;
    let source = raw
        .source()
        .ok_or_else(|| ExtractError::MissingRawUnit(name.clone()))?;

    debug!(unit = %name, "inspecting unit");
    ctx.begin_inspection(name.clone())?;
    ctx.activate_provenance()?;
    let outcome = exec_two_pass(host, ctx, name, &source, Namespace::new());
    let provenance = ctx.deactivate_provenance().unwrap_or_default();
    ctx.end_inspection();

    let outcome = outcome.map_err(|cause| {
        error!(unit = %name, error = %cause, "inspection failed");
        ExtractError::init(name.clone(), cause)
    })?;

    // The inspected unit is deliberately NOT registered while its
    // program runs: an indirect resolution of its own name must go
    // through the hook, which warns and serves a stub.
    let unit = Unit::plain(raw.ids(), name.clone());
    unit.set_is_package(raw.is_package());
    unit.set_origin(raw.origin());
    unit.set_source(Arc::clone(&source));
    unit.set_strategy(Strategy::Inspect);
    unit.apply_outcome(
        outcome.namespace,
        outcome.doc,
        outcome.exports,
        outcome.is_package,
    );
    hook.mark_inspected(name.clone());

    Ok(ExtractedUnit {
        unit,
        provenance,
        source: Arc::clone(&source.text),
    })
}
