//! Extraction phases.

use std::fmt;

/// Which phase of an extraction run is active. The resolution hook uses
/// this to decide what to do with a requested unit name it does not
/// recognize as bypassable.
///
/// Exactly one phase is active at a time; transitions within a run are
/// monotonic and no phase is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExtractionPhase {
    /// Hook installed, nothing resolved yet.
    Hooked,
    /// Normal resolution runs to completion once so every unit's real,
    /// fully-resolved form can be captured into the raw stash.
    Exploration,
    /// Stub/tracking forms are eagerly built for all first-party units.
    Preparation,
    /// First-party units are re-initialized one at a time under
    /// observation.
    Extraction,
}

impl fmt::Display for ExtractionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionPhase::Hooked => "hooked",
            ExtractionPhase::Exploration => "exploration",
            ExtractionPhase::Preparation => "preparation",
            ExtractionPhase::Extraction => "extraction",
        };
        f.write_str(name)
    }
}

impl ExtractionPhase {
    /// The phase that must directly precede `self`, if any.
    pub fn predecessor(self) -> Option<ExtractionPhase> {
        match self {
            ExtractionPhase::Hooked => None,
            ExtractionPhase::Exploration => Some(ExtractionPhase::Hooked),
            ExtractionPhase::Preparation => Some(ExtractionPhase::Exploration),
            ExtractionPhase::Extraction => Some(ExtractionPhase::Preparation),
        }
    }
}
