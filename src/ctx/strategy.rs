//! Resolution strategies.

use std::fmt;

/// What the resolution hook decided to do with a requested unit name.
/// Decided once per request and immutable thereafter; "bypass" is
/// expressed by the hook returning no override at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Produce a synthetic placeholder unit.
    Stub,
    /// Wrap a real unit in a provenance-tracking proxy.
    Track,
    /// The single unit currently being analyzed; at most one may be
    /// active process-wide.
    Inspect,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Stub => "stub",
            Strategy::Track => "track",
            Strategy::Inspect => "inspect",
        };
        f.write_str(name)
    }
}
