//! First-party unit discovery.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use tracing::debug;

use crate::base::UnitName;
use crate::extract::SpecialMarkers;
use crate::host::SourceIndex;
use crate::source::Stmt;

/// What a discovery pass over the source index found.
#[derive(Debug, Default)]
pub struct Discovered {
    /// First-party unit names, parents before children and siblings in
    /// name order, so iteration visits a package before anything inside
    /// it.
    pub names: Vec<UnitName>,
    /// Special-form markers declared anywhere in first-party source.
    pub markers: SpecialMarkers,
}

/// Scan the source index for units belonging to the given toplevel
/// packages, collecting their names and any special-form markers their
/// programs declare.
pub fn discover_firstparty(
    sources: &SourceIndex,
    packages: &FxHashSet<SmolStr>,
) -> Discovered {
    let mut discovered = Discovered::default();
    for (name, entry) in sources.iter() {
        if !packages.contains(name.toplevel()) {
            continue;
        }
        discovered.names.push(name.clone());
        for stmt in &entry.source.program {
            if let Stmt::Marker { unit, attr, kind } = stmt {
                discovered
                    .markers
                    .insert(unit.clone(), attr.clone(), *kind);
            }
        }
    }
    discovered
        .names
        .sort_by(|a, b| a.depth().cmp(&b.depth()).then_with(|| a.cmp(b)));
    debug!(
        units = discovered.names.len(),
        markers = discovered.markers.len(),
        "discovered first-party units",
    );
    discovered
}
