//! # docpeek
//!
//! Documentation extraction for namespace units, built around a
//! resolution hook that swaps real unit loading for stubbed and tracked
//! stand-ins.
//!
//! Extracting documentation from a codebase means initializing its units
//! — and a unit's initializer happily drags in heavyweight third-party
//! dependencies that have nothing to say about the code's own API. This
//! crate intercepts unit resolution instead: third-party units become
//! stubs serving identity-carrying placeholders, first-party neighbors
//! become tracked forms that record where every imported value came
//! from, and each first-party unit is then re-initialized one at a time
//! under observation.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! project   → Source-tree loading, first-party discovery
//!   ↓
//! extract   → Stubbing policy, resolver hook, run coordinator
//!   ↓
//! host      → Units, namespaces, values, the resolution entry point
//!   ↓
//! ctx       → Run context: phases, strategies, provenance
//!   ↓
//! error     → ExtractError
//!   ↓
//! source    → Unit-definition language: lexer, AST, parser
//!   ↓
//! base      → Primitives (UnitName, ObjectId)
//! ```

// ============================================================================
// MODULES (dependency order: base → source → error → ctx → host → extract →
// project)
// ============================================================================

/// Foundation types: unit names, object identity
pub mod base;

/// Unit-definition language: Logos lexer, recursive-descent parser, AST
pub mod source;

/// Error types
pub mod error;

/// Run context: extraction phases, strategies, provenance registry
pub mod ctx;

/// The runtime host: units, namespaces, values, resolution
pub mod host;

/// Extraction: stubbing policy, resolver hook, run coordinator
pub mod extract;

/// Project management: source-tree loading, first-party discovery
pub mod project;

// Re-export foundation types
pub use base::{AttrName, InvalidUnitName, ObjectId, ObjectIds, UnitName};

// Re-export the working surface
pub use ctx::{ExtractionPhase, Origin, ProvenanceRegistry, RunCtx, Strategy};
pub use error::ExtractError;
pub use extract::{
    extract, ExtractOptions, ExtractedUnit, ExtractedUnits, SpecialMarkers,
    StubsConfig,
};
pub use host::{
    Host, Namespace, Placeholder, PlaceholderKind, ResolverHook, Traversal, Unit,
    UnitHandle, Value, ValueKind,
};
pub use project::{discover_firstparty, load_directory, Discovered};
