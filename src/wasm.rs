//! WASM bindings for Beamline Core.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmLattice } from 'beamline_core';
//!
//! await init();
//!
//! const lattice = new WasmLattice(`
//!   D0: DRIFT, L=1.0
//!   Q1: QUAD, L=0.1, K1=10
//!   BL: LINE=(D0 2*Q1 D0)
//! `);
//!
//! lattice.expand("BL", true);           // ["d0", "q1", "q1", "d0"]
//! lattice.mutate("BL", "QUAD", "all", "K1", "+10%");
//! const text = lattice.render("BL");
//! ```

use wasm_bindgen::prelude::*;

use crate::error::BeamlineError;
use crate::lattice::Namespace;
use crate::output::{render, to_json, RenderConfig};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn to_js(err: BeamlineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_js_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| to_js(e.into()))
}

/// A loaded lattice, editable from JavaScript.
#[wasm_bindgen]
pub struct WasmLattice {
    namespace: Namespace,
}

#[wasm_bindgen]
impl WasmLattice {
    /// Load lattice text.
    ///
    /// Loading never fails outright; problems are reported by
    /// [`diagnostics`](Self::diagnostics).
    #[wasm_bindgen(constructor)]
    pub fn new(lattice: &str) -> WasmLattice {
        WasmLattice {
            namespace: Namespace::from_source(lattice),
        }
    }

    /// Load the JSON document form.
    #[wasm_bindgen]
    pub fn from_json(document: &str) -> Result<WasmLattice, JsValue> {
        let doc: serde_json::Value = serde_json::from_str(document).map_err(|e| to_js(e.into()))?;
        let namespace = Namespace::from_json(&doc).map_err(to_js)?;
        Ok(WasmLattice { namespace })
    }

    /// Expand a beamline into element names.
    #[wasm_bindgen]
    pub fn expand(&self, beamline: &str, extend: bool) -> Result<Vec<String>, JsValue> {
        self.namespace.expand(beamline, extend).map_err(to_js)
    }

    /// Ordering records of a beamline, as a JSON array.
    #[wasm_bindgen]
    pub fn order(&self, beamline: &str) -> Result<String, JsValue> {
        to_js_json(&self.namespace.order(beamline).map_err(to_js)?)
    }

    /// Selected ordering records, as a JSON array.
    #[wasm_bindgen]
    pub fn select(
        &self,
        beamline: &str,
        element_type: &str,
        selector: &str,
    ) -> Result<String, JsValue> {
        to_js_json(&self.namespace.select(beamline, element_type, selector).map_err(to_js)?)
    }

    /// Edit a numeric parameter; returns the applied edits as a JSON array.
    #[wasm_bindgen]
    pub fn mutate(
        &mut self,
        beamline: &str,
        element_type: &str,
        selector: &str,
        property: &str,
        op: &str,
    ) -> Result<String, JsValue> {
        let edits = self
            .namespace
            .mutate(beamline, element_type, selector, property, op)
            .map_err(to_js)?;
        to_js_json(&edits)
    }

    /// Render a beamline back into lattice text.
    #[wasm_bindgen]
    pub fn render(&self, beamline: &str) -> Result<String, JsValue> {
        render(&self.namespace, beamline, &RenderConfig::default()).map_err(to_js)
    }

    /// The namespace as a JSON document.
    #[wasm_bindgen]
    pub fn to_json(&self) -> Result<String, JsValue> {
        to_js_json(&to_json(&self.namespace).map_err(to_js)?)
    }

    /// Load diagnostics, one message per entry.
    #[wasm_bindgen]
    pub fn diagnostics(&self) -> Vec<String> {
        self.namespace.diagnostics().iter().map(ToString::to_string).collect()
    }

    /// Names of all beamlines.
    #[wasm_bindgen]
    pub fn beamlines(&self) -> Vec<String> {
        self.namespace.beamline_names().map(str::to_string).collect()
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
