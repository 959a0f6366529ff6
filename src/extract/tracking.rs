//! Tracked (no-stub) units.
//!
//! A tracked unit serves real values but records where each served value
//! came from, feeding the provenance registry. Third-party tracked units
//! delegate to the raw unit captured during exploration. First-party
//! tracked units instead carry a namespace rebuilt from source at
//! wrapper-construction time, so the values they serve were initialized
//! under the *current* hook state rather than whatever was in effect when
//! the raw capture ran.

use tracing::debug;

use crate::base::AttrName;
use crate::ctx::RunCtx;
use crate::error::ExtractError;
use crate::host::{Namespace, Unit, UnitFacade, UnitHandle, Value};

fn record_provenance(ctx: &mut RunCtx, unit: &Unit, attr: &str, value: &Value) {
    match ctx.provenance_mut() {
        Some(registry) => {
            registry.record(value.id(), (unit.name().clone(), AttrName::new(attr)));
        }
        None => {
            debug!(
                unit = %unit.name(),
                attr,
                "tracked read outside an active provenance registry",
            );
        }
    }
}

/// Facade for a tracked third-party unit: reads pass through to the raw
/// captured unit, with provenance recorded against the wrapper's name.
#[derive(Debug)]
pub struct DelegatingFacade {
    delegate: UnitHandle,
}

impl DelegatingFacade {
    pub fn new(delegate: UnitHandle) -> Self {
        Self { delegate }
    }

    pub fn delegate(&self) -> &UnitHandle {
        &self.delegate
    }
}

impl UnitFacade for DelegatingFacade {
    fn attr(
        &self,
        unit: &Unit,
        ctx: &mut RunCtx,
        name: &str,
    ) -> Result<Value, ExtractError> {
        let value = self.delegate.attr(ctx, name)?;
        record_provenance(ctx, unit, name, &value);
        Ok(value)
    }

    fn export_list(
        &self,
        _unit: &Unit,
        ctx: &mut RunCtx,
    ) -> Result<Vec<AttrName>, ExtractError> {
        self.delegate.export_list(ctx)
    }
}

/// Facade for a tracked first-party unit: serves from a namespace rebuilt
/// at construction time. Never cached across resolutions; every
/// resolution of a first-party tracked unit gets a freshly-initialized
/// one.
#[derive(Debug)]
pub struct ReinitFacade {
    namespace: Namespace,
    exports: Option<Vec<AttrName>>,
}

impl ReinitFacade {
    pub fn new(namespace: Namespace, exports: Option<Vec<AttrName>>) -> Self {
        Self { namespace, exports }
    }
}

impl UnitFacade for ReinitFacade {
    fn attr(
        &self,
        unit: &Unit,
        ctx: &mut RunCtx,
        name: &str,
    ) -> Result<Value, ExtractError> {
        let value = self
            .namespace
            .get(name)
            .cloned()
            .ok_or_else(|| ExtractError::attr_not_found(unit.name().as_str(), name))?;
        record_provenance(ctx, unit, name, &value);
        Ok(value)
    }

    fn export_list(
        &self,
        _unit: &Unit,
        _ctx: &mut RunCtx,
    ) -> Result<Vec<AttrName>, ExtractError> {
        match &self.exports {
            Some(exports) => Ok(exports.clone()),
            None => Ok(self.namespace.public_names()),
        }
    }
}
