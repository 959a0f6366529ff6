//! The extraction subsystem: policy, stubbing, tracking, registry
//! stashing, the resolver hook, and the run coordinator that ties them
//! together.

mod coordinator;
mod hook;
mod policy;
mod stash;
mod stubs;
mod tracking;

pub use coordinator::{extract, ExtractOptions, ExtractedUnit, ExtractedUnits};
pub use hook::ExtractionHook;
pub use policy::{PolicyDecision, StubsConfig};
pub use stash::RegistryStash;
pub use stubs::{make_placeholder, SpecialMarkers, StubFacade};
pub use tracking::{DelegatingFacade, ReinitFacade};
