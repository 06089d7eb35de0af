//! # Beamline Core
//!
//! A reader, expander and editor for particle-accelerator lattice files.
//!
//! This library provides:
//! - A reader for elegant-style `.lte` lattice text with RPN expressions
//! - Global variable resolution with chained definitions
//! - Beamline expansion with repetition multipliers and cycle detection
//! - Element addressing by type and occurrence, and bulk parameter edits
//! - Rendering back into lattice text and a JSON document form
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`dsl`] - Line joiner, RPN evaluator, variables and statement parser
//! - [`lattice`] - The namespace, beamline expansion and element addressing
//! - [`output`] - Lattice text and JSON serializers
//! - [`error`] - Error and diagnostic types
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! beamline linac.lte expand BL --extend
//! beamline linac.lte render BL --charge -o linac_bl.lte
//! ```
//!
//! ### Library
//!
//! ```
//! use beamline_core::Namespace;
//!
//! let source = "D0: DRIFT, L=1\nQ1: QUAD, L=0.1, K1=10\nBL: LINE=(D0 2*Q1 D0)\n";
//! let ns = Namespace::from_source(source);
//! assert_eq!(ns.expand("BL", true).unwrap(), vec!["d0", "q1", "q1", "d0"]);
//! ```
//!
//! ### WASM
//!
//! ```javascript
//! import { WasmLattice } from 'beamline_core';
//!
//! const lattice = new WasmLattice(latticeText);
//! lattice.expand("BL", true);
//! ```

pub mod dsl;
pub mod error;
pub mod lattice;
pub mod output;

// Re-export main types for convenience
pub use dsl::{Loader, LoaderConfig};
pub use error::{BeamlineError, Result};
pub use lattice::Namespace;

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmLattice;
