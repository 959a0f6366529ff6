//! Foundation types for docpeek.
//!
//! This module provides fundamental types used throughout the crate:
//! - [`UnitName`] - Validated, cheap-to-clone dotted unit names
//! - [`ObjectId`], [`ObjectIds`] - Object identity (not structural equality)
//!
//! This module has NO dependencies on other docpeek modules.

mod name;
mod object_id;

pub use name::{InvalidUnitName, UnitName};
pub use object_id::{ObjectId, ObjectIds};

/// Attribute names within a unit namespace.
pub type AttrName = smol_str::SmolStr;
