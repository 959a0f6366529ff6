//! Stubbing policy configuration.

use rustc_hash::FxHashSet;
use smol_str::SmolStr;

use crate::base::UnitName;

/// Where a unit falls under the stubbing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Never intercept: the hook hands the name straight to the default
    /// loader.
    Bypass,
    /// Eligible for stubbing.
    Eligible,
    /// Intercepted, but must never be stubbed: resolved real (tracked)
    /// instead.
    NeverStub,
}

/// Controls which units get stubbed during a run.
#[derive(Debug, Clone, Default)]
pub struct StubsConfig {
    /// When false, nothing is ever stubbed (everything eligible becomes
    /// no-stub instead).
    pub enable_stubs: bool,
    /// When present, *only* these exact unit names are eligible for
    /// stubbing; everything else is no-stub. Overrides the blocklists.
    pub global_allowlist: Option<FxHashSet<UnitName>>,
    /// Exact first-party unit names that must never be stubbed.
    pub firstparty_blocklist: FxHashSet<UnitName>,
    /// Third-party toplevel packages whose entire tree must never be
    /// stubbed.
    pub thirdparty_blocklist: FxHashSet<SmolStr>,
    /// Toplevel packages the hook must not intercept at all.
    pub bypass_packages: FxHashSet<SmolStr>,
}

impl StubsConfig {
    pub fn with_stubs() -> Self {
        Self {
            enable_stubs: true,
            ..Self::default()
        }
    }

    /// Classify a unit name under this policy.
    pub fn decide(&self, name: &UnitName) -> PolicyDecision {
        if self.bypass_packages.contains(name.toplevel()) {
            return PolicyDecision::Bypass;
        }
        if let Some(allowlist) = &self.global_allowlist {
            return if allowlist.contains(name.as_str()) {
                PolicyDecision::Eligible
            } else {
                PolicyDecision::NeverStub
            };
        }
        if !self.enable_stubs {
            return PolicyDecision::NeverStub;
        }
        if self.firstparty_blocklist.contains(name.as_str()) {
            return PolicyDecision::NeverStub;
        }
        if self.thirdparty_blocklist.contains(name.toplevel()) {
            return PolicyDecision::NeverStub;
        }
        PolicyDecision::Eligible
    }
}
