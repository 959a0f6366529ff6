//! Error types for extraction operations.

use thiserror::Error;

use crate::base::{InvalidUnitName, UnitName};
use crate::source::ParseError;

/// Errors that can occur while resolving, initializing, or extracting
/// namespace units.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A resolution hook is already installed on the host.
    #[error("cannot have multiple active resolution hooks")]
    HookAlreadyInstalled,

    /// A provenance registry is already active for this run.
    #[error("cannot have multiple activated provenance registries")]
    RegistryAlreadyActive,

    /// A unit is already under inspection.
    #[error("unit {current} is already under inspection (requested {requested})")]
    InspectionAlreadyActive {
        current: UnitName,
        requested: UnitName,
    },

    /// No source and no hook-provided form for the requested unit.
    #[error("unit not found: {0}")]
    UnitNotFound(UnitName),

    /// A delegated resolution needed the raw captured form of a unit, but
    /// none was stashed during exploration.
    #[error("no raw captured form for unit {0}")]
    MissingRawUnit(UnitName),

    /// Unit initialization failed. Carries the unit name because the
    /// underlying cause is often too generic to identify which unit broke.
    #[error("initialization of unit {unit} failed")]
    Init {
        unit: UnitName,
        #[source]
        cause: Box<ExtractError>,
    },

    /// A unit source failed to parse.
    #[error("cannot parse source of unit {unit}")]
    Parse {
        unit: UnitName,
        #[source]
        cause: ParseError,
    },

    /// An explicit `fail` statement was evaluated.
    #[error("unit initialization aborted: {0}")]
    Failed(String),

    /// A name reference did not resolve in the current namespace.
    #[error("name `{name}` is not defined")]
    NameNotFound { name: String },

    /// An attribute read found nothing.
    #[error("attribute `{attr}` not found on {on}")]
    AttrNotFound { on: String, attr: String },

    /// A call target cannot be called.
    #[error("{value} is not callable")]
    NotCallable { value: String },

    /// A class declaration used an unusable base or metaclass value.
    #[error("invalid class form for `{class}`: {message}")]
    InvalidClassForm { class: String, message: String },

    /// A unit name failed validation.
    #[error(transparent)]
    InvalidName(#[from] InvalidUnitName),

    /// IO error while loading unit sources from disk.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory discovery failed.
    #[error("source directory not found: {0}")]
    DirectoryNotFound(String),
}

impl ExtractError {
    /// Wrap a failure with the name of the unit whose initialization
    /// triggered it. Never double-wraps the same unit.
    pub fn init(unit: UnitName, cause: ExtractError) -> Self {
        if let ExtractError::Init { unit: inner, .. } = &cause {
            if *inner == unit {
                return cause;
            }
        }
        Self::Init {
            unit,
            cause: Box::new(cause),
        }
    }

    /// Create a parse error with unit context.
    pub fn parse(unit: UnitName, cause: ParseError) -> Self {
        Self::Parse { unit, cause }
    }

    /// Create a missing-attribute error.
    pub fn attr_not_found(on: impl Into<String>, attr: impl Into<String>) -> Self {
        Self::AttrNotFound {
            on: on.into(),
            attr: attr.into(),
        }
    }

    /// Create an undefined-name error.
    pub fn name_not_found(name: impl Into<String>) -> Self {
        Self::NameNotFound { name: name.into() }
    }

    /// Create an invalid-class-form error.
    pub fn invalid_class_form(
        class: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidClassForm {
            class: class.into(),
            message: message.into(),
        }
    }
}
