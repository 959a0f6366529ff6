//! The run-scoped context object.

use tracing::{error, info};

use crate::base::UnitName;
use crate::error::ExtractError;

use super::phase::ExtractionPhase;
use super::provenance::ProvenanceRegistry;

/// Mutable state scoped to exactly one extraction run.
///
/// Holds the current phase, the single unit-under-inspection marker, and
/// the active provenance registry. Constructed fresh per run by the
/// coordinator and passed `&mut` through every resolution decision and
/// attribute access, so no state outlives its run.
#[derive(Debug, Default)]
pub struct RunCtx {
    phase: Option<ExtractionPhase>,
    under_inspection: Option<UnitName>,
    provenance: Option<ProvenanceRegistry>,
}

impl RunCtx {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Phase
    // ------------------------------------------------------------------

    pub fn phase(&self) -> Option<ExtractionPhase> {
        self.phase
    }

    /// Transition to `phase`. Transitions must be monotonic with no phase
    /// skipped; a violation indicates an internal bug and is logged and
    /// then tolerated rather than escalated.
    pub fn enter_phase(&mut self, phase: ExtractionPhase) {
        if self.phase != phase.predecessor() {
            error!(
                current = ?self.phase,
                requested = %phase,
                "out-of-order extraction phase transition; this is almost \
                 certainly a bug"
            );
        }
        info!(phase = %phase, "entering extraction phase");
        self.phase = Some(phase);
    }

    /// Reset the phase on the way out of a run.
    pub fn clear_phase(&mut self) {
        self.phase = None;
    }

    // ------------------------------------------------------------------
    // Unit under inspection
    // ------------------------------------------------------------------

    pub fn under_inspection(&self) -> Option<&UnitName> {
        self.under_inspection.as_ref()
    }

    /// Mark `unit` as the unit under inspection. At most one inspection
    /// marker may be active at a time.
    pub fn begin_inspection(&mut self, unit: UnitName) -> Result<(), ExtractError> {
        if let Some(current) = &self.under_inspection {
            return Err(ExtractError::InspectionAlreadyActive {
                current: current.clone(),
                requested: unit,
            });
        }
        self.under_inspection = Some(unit);
        Ok(())
    }

    pub fn end_inspection(&mut self) -> Option<UnitName> {
        self.under_inspection.take()
    }

    // ------------------------------------------------------------------
    // Provenance registry
    // ------------------------------------------------------------------

    /// Activate a fresh provenance registry. Nesting is an error: the
    /// caller must deactivate the previous registry first.
    pub fn activate_provenance(&mut self) -> Result<(), ExtractError> {
        if self.provenance.is_some() {
            return Err(ExtractError::RegistryAlreadyActive);
        }
        self.provenance = Some(ProvenanceRegistry::new());
        Ok(())
    }

    /// Deactivate and return the active registry, if any.
    pub fn deactivate_provenance(&mut self) -> Option<ProvenanceRegistry> {
        self.provenance.take()
    }

    /// The active registry, if one is active. Tracking wrappers are pure
    /// passthroughs when this returns `None`.
    pub fn provenance_mut(&mut self) -> Option<&mut ProvenanceRegistry> {
        self.provenance.as_mut()
    }

    pub fn provenance_active(&self) -> bool {
        self.provenance.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_inspection_marker() {
        let mut ctx = RunCtx::new();
        let a = UnitName::new("pkg.a").unwrap();
        let b = UnitName::new("pkg.b").unwrap();
        ctx.begin_inspection(a.clone()).unwrap();
        let err = ctx.begin_inspection(b).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::InspectionAlreadyActive { .. }
        ));
        assert_eq!(ctx.end_inspection(), Some(a));
        assert!(ctx.under_inspection().is_none());
    }

    #[test]
    fn test_provenance_nesting_is_an_error() {
        let mut ctx = RunCtx::new();
        ctx.activate_provenance().unwrap();
        assert!(matches!(
            ctx.activate_provenance(),
            Err(ExtractError::RegistryAlreadyActive)
        ));
        assert!(ctx.deactivate_provenance().is_some());
        ctx.activate_provenance().unwrap();
    }

    #[test]
    fn test_phase_transitions() {
        let mut ctx = RunCtx::new();
        assert_eq!(ctx.phase(), None);
        ctx.enter_phase(ExtractionPhase::Hooked);
        ctx.enter_phase(ExtractionPhase::Exploration);
        ctx.enter_phase(ExtractionPhase::Preparation);
        ctx.enter_phase(ExtractionPhase::Extraction);
        assert_eq!(ctx.phase(), Some(ExtractionPhase::Extraction));
        ctx.clear_phase();
        assert_eq!(ctx.phase(), None);
    }
}
