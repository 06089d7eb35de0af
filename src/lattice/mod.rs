//! Lattice namespace, beamline expansion and element addressing.
//!
//! This module provides the in-memory model built from a lattice file.
//! The [`Namespace`] holds every element and beamline definition together
//! with the global variables and the control annotation side-table.
//! Beamline expansion, ordering, selection and mutation are queries on it.

mod expand;
mod namespace;
mod select;
mod types;
mod validate;

pub use namespace::{canonical, ElementDefinition, Namespace};
pub use select::{MutationOp, Selector};
pub use types::*;
pub use validate::validate_namespace;
