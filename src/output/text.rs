//! Lattice text serializer.

use std::fmt::Write as _;

use indexmap::IndexSet;
use tracing::debug;

use crate::dsl::{ElementKind, CONTINUATION_CHAR};
use crate::error::{BeamlineError, Result};
use crate::lattice::{canonical, ElementDefinition, Namespace, Reference};

/// Default number of references per beamline line before a continuation.
pub const DEFAULT_REFS_PER_LINE: usize = 8;

/// Configuration for [`render`].
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Emit the generated-file comment header.
    pub header: bool,
    /// Emit resolved global variables as `% value sto name`.
    pub variables: bool,
    /// Put the namespace CHARGE element first when the beamline lacks one.
    pub charge_element: bool,
    /// References per beamline line; 0 keeps the whole list on one line.
    pub refs_per_line: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            header: true,
            variables: false,
            charge_element: false,
            refs_per_line: DEFAULT_REFS_PER_LINE,
        }
    }
}

impl RenderConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn with_variables(mut self, variables: bool) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_charge_element(mut self, charge_element: bool) -> Self {
        self.charge_element = charge_element;
        self
    }

    pub fn with_refs_per_line(mut self, refs_per_line: usize) -> Self {
        self.refs_per_line = refs_per_line;
        self
    }
}

/// Render one beamline and every element it reaches back into lattice text.
///
/// Element statements come first, in order of first appearance in the
/// expansion, followed by a single `line` statement built from the
/// single-pass expansion. Resolved parameters are written as numbers; the
/// original expressions are not kept.
pub fn render(namespace: &Namespace, beamline: &str, config: &RenderConfig) -> Result<String> {
    let name = canonical(beamline);
    let mut refs = namespace.expand(&name, false)?;

    let mut leaves: IndexSet<String> = IndexSet::new();
    for token in &refs {
        let reference = Reference::parse(token)
            .ok_or_else(|| BeamlineError::reference(token.as_str(), &name))?;
        leaves.insert(reference.name);
    }

    if config.charge_element {
        if let Some(charge) = namespace.charge_element() {
            let starts_with_charge = leaves
                .first()
                .and_then(|first| namespace.element(first))
                .is_some_and(|def| def.kind == ElementKind::Charge);
            if !starts_with_charge {
                let charge = charge.to_ascii_lowercase();
                leaves.shift_insert(0, charge.clone());
                refs.insert(0, charge);
            }
        }
    }

    let mut out = String::new();
    if config.header {
        writeln!(out, "! Lattice file for beamline {}", name).ok();
        let generator = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));
        writeln!(out, "! Generated by {}", generator).ok();
        writeln!(out).ok();
    }

    if config.variables && !namespace.variables().is_empty() {
        writeln!(out, "! Variables:").ok();
        for (var, value) in namespace.variables().values() {
            writeln!(out, "% {} sto {}", value, var).ok();
        }
        writeln!(out).ok();
    }

    writeln!(out, "! Element definitions:").ok();
    for leaf in &leaves {
        let def = namespace
            .element(leaf)
            .ok_or_else(|| BeamlineError::reference(leaf.as_str(), &name))?;
        writeln!(out, "{}", render_element(def)).ok();
    }

    writeln!(out).ok();
    writeln!(out, "! Beamline definitions:").ok();
    writeln!(out, "{}", render_beamline(&name, &refs, config.refs_per_line)).ok();

    debug!(beamline = %name, elements = leaves.len(), references = refs.len(), "beamline rendered");
    Ok(out)
}

/// Render one element statement, `NAME : TYPE, k1="v1", k2="v2"`.
pub fn render_element(def: &ElementDefinition) -> String {
    let mut line = format!("{} : {}", def.name, def.type_name.to_ascii_uppercase());
    for (key, value) in &def.params {
        write!(line, ", {}=\"{}\"", key.to_ascii_uppercase(), value).ok();
    }
    line
}

fn render_beamline(name: &str, refs: &[String], refs_per_line: usize) -> String {
    let chunk = if refs_per_line == 0 { refs.len().max(1) } else { refs_per_line };
    let body = refs
        .chunks(chunk)
        .map(|group| group.join(", "))
        .collect::<Vec<_>>()
        .join(&format!(", {}\n    ", CONTINUATION_CHAR));
    format!("{} : line = ({})", name, body)
}
