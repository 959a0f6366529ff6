//! Registry stashing and eviction.
//!
//! An extraction run must leave the host's registry exactly as it found
//! it. Before the hook is installed, [`RegistryStash::capture`] snapshots
//! the registered names and pulls the interceptable units out of the
//! registry; after the run, [`RegistryStash::restore`] puts them back in
//! their original order. In between, [`RegistryStash::evict`] clears
//! run-dirtied names at phase boundaries.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::base::UnitName;
use crate::ctx::RunCtx;
use crate::error::ExtractError;
use crate::host::{Host, UnitHandle};

#[derive(Debug, Default)]
pub struct RegistryStash {
    /// Every name registered at capture time, stashed or not.
    snapshot: FxHashSet<UnitName>,
    /// Units removed from the registry, in original registration order.
    stashed: IndexMap<UnitName, UnitHandle>,
    /// Names that cannot be cleanly removed from the registry. Eviction
    /// reloads these in place instead, so every consumer keeps seeing a
    /// single consistent unit object.
    unpurgeable: FxHashSet<UnitName>,
}

impl RegistryStash {
    /// Snapshot the registry and stash the interceptable units out of it.
    ///
    /// `keep_in_place` marks units that stay registered while the run is
    /// active (they are remembered for restore-order purposes but not
    /// removed); `bypass` marks units the run will never touch at all.
    pub fn capture(
        host: &mut Host,
        keep_in_place: impl Fn(&UnitName) -> bool,
        bypass: impl Fn(&UnitName) -> bool,
    ) -> Self {
        let mut stash = Self::default();
        for name in host.registry().names() {
            stash.snapshot.insert(name.clone());
            if host.is_stdlib(name.toplevel()) || bypass(&name) {
                continue;
            }
            if keep_in_place(&name) {
                continue;
            }
            if let Some(unit) = host.registry_mut().remove(name.as_str()) {
                stash.stashed.insert(name, unit);
            }
        }
        debug!(
            snapshot = stash.snapshot.len(),
            stashed = stash.stashed.len(),
            "captured registry state",
        );
        stash
    }

    pub fn mark_unpurgeable(&mut self, name: UnitName) {
        self.unpurgeable.insert(name);
    }

    /// Names present in the registry now that were not in the snapshot.
    pub fn dirty_since_snapshot(&self, host: &Host) -> Vec<UnitName> {
        host.registry()
            .names()
            .into_iter()
            .filter(|name| !self.snapshot.contains(name.as_str()))
            .collect()
    }

    /// Remove the named units from the registry. Unpurgeable units are
    /// reloaded in place instead of removed; names that are not
    /// registered are skipped.
    pub fn evict(
        &self,
        host: &mut Host,
        ctx: &mut RunCtx,
        names: impl IntoIterator<Item = UnitName>,
    ) -> Result<(), ExtractError> {
        for name in names {
            if !host.registry().contains(name.as_str()) {
                continue;
            }
            if self.unpurgeable.contains(name.as_str()) {
                debug!(unit = %name, "unpurgeable unit, reloading in place");
                if let Err(error) = host.reload(ctx, &name) {
                    // A unit that can be neither removed nor reloaded
                    // would poison every later phase if we stopped here;
                    // log and move on.
                    warn!(unit = %name, %error, "in-place reload failed during eviction");
                }
            } else {
                host.registry_mut().remove(name.as_str());
            }
        }
        Ok(())
    }

    /// Put every stashed unit back, in its original order, and drop
    /// anything the run left behind that the snapshot does not know.
    pub fn restore(&mut self, host: &mut Host) {
        for name in self.dirty_since_snapshot(host) {
            host.registry_mut().remove(name.as_str());
        }
        for (name, unit) in self.stashed.drain(..) {
            host.registry_mut().insert(name, unit);
        }
    }

    pub fn stashed_unit(&self, name: &str) -> Option<UnitHandle> {
        self.stashed.get(name).map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Unit;

    fn name(s: &str) -> UnitName {
        UnitName::new(s).unwrap()
    }

    fn seeded_host() -> Host {
        let mut host = Host::new();
        host.mark_stdlib("core");
        let ids = host.ids().clone();
        for unit in ["core.mem", "extpkg.sub", "mypkg.mod"] {
            let n = name(unit);
            let u = Unit::plain(&ids, n.clone());
            host.registry_mut().insert(n, u);
        }
        host
    }

    #[test]
    fn capture_skips_stdlib_and_kept_units() {
        let mut host = seeded_host();
        let stash = RegistryStash::capture(
            &mut host,
            |n| n.toplevel() == "mypkg",
            |_| false,
        );
        assert!(host.registry().contains("core.mem"));
        assert!(host.registry().contains("mypkg.mod"));
        assert!(!host.registry().contains("extpkg.sub"));
        assert!(stash.stashed_unit("extpkg.sub").is_some());
        assert_eq!(stash.snapshot.len(), 3);
    }

    #[test]
    fn restore_reinstates_and_clears_dirt() {
        let mut host = seeded_host();
        let mut stash = RegistryStash::capture(&mut host, |_| false, |_| false);

        // Simulate run dirt.
        let ids = host.ids().clone();
        let dirt = name("extpkg.other");
        host.registry_mut()
            .insert(dirt.clone(), Unit::plain(&ids, dirt));

        stash.restore(&mut host);
        assert!(host.registry().contains("extpkg.sub"));
        assert!(host.registry().contains("mypkg.mod"));
        assert!(!host.registry().contains("extpkg.other"));
    }

    #[test]
    fn evict_skips_missing_names() {
        let mut host = seeded_host();
        let stash = RegistryStash::capture(&mut host, |_| false, |_| false);
        let mut ctx = RunCtx::default();
        stash
            .evict(&mut host, &mut ctx, [name("not.registered")])
            .unwrap();
    }

    #[test]
    fn evict_reloads_unpurgeable_in_place() {
        let mut host = Host::new();
        host.add_source("sticky.mod", "let v = 1;").unwrap();
        let mut ctx = RunCtx::default();
        let unit = host.resolve(&mut ctx, &name("sticky.mod")).unwrap();

        let mut stash = RegistryStash::capture(&mut host, |_| true, |_| false);
        stash.mark_unpurgeable(name("sticky.mod"));
        stash
            .evict(&mut host, &mut ctx, [name("sticky.mod")])
            .unwrap();

        // Still registered, same unit object.
        let after = host.resolve(&mut ctx, &name("sticky.mod")).unwrap();
        assert_eq!(unit.object_id(), after.object_id());
    }
}
