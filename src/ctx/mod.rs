//! Run-scoped extraction context.
//!
//! The original design of this subsystem leans on process-wide mutable
//! state. Here that state is modeled explicitly: a [`RunCtx`] owns the
//! current extraction phase, the single unit-under-inspection marker, and
//! the active provenance registry, and is passed `&mut` through every
//! resolution and attribute-access call. Multiple sequential (never
//! concurrent) runs each get a fresh context, so nothing leaks between
//! them.

mod phase;
mod provenance;
mod run;
mod strategy;

pub use phase::ExtractionPhase;
pub use provenance::{Origin, ProvenanceRegistry};
pub use run::RunCtx;
pub use strategy::Strategy;
