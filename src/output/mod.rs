//! Serializers for a loaded [`Namespace`](crate::Namespace).
//!
//! - [`text`] renders a beamline back into lattice text
//! - [`json`] converts the whole namespace to and from a JSON document

pub mod json;
pub mod text;

pub use json::{to_json, CTRL_KEY, PREFIX_KEY};
pub use text::{render, render_element, RenderConfig, DEFAULT_REFS_PER_LINE};
