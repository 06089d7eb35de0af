//! Namespace loader: the whole-file pass over a lattice source.

use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::ast::{Assignment, Value};
use super::lexer::{LineJoiner, LineKind};
use super::parser::Parser;
use super::variables::{parse_assignments, VariableTable};
use crate::error::{BeamlineError, Diagnostic, Result};
use crate::lattice::{ElementDefinition, Namespace};

/// Default marker introducing a control annotation line.
pub const DEFAULT_ANNOTATION_MARKER: &str = "!@";

/// Configuration for the loader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Prefix of control annotation lines; empty disables annotations.
    pub annotation_marker: String,
    /// Named values available to every expression before any `%` statement.
    pub constants: IndexMap<String, f64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            annotation_marker: DEFAULT_ANNOTATION_MARKER.to_string(),
            constants: IndexMap::new(),
        }
    }
}

impl LoaderConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the control annotation marker.
    pub fn with_annotation_marker(mut self, marker: impl Into<String>) -> Self {
        self.annotation_marker = marker.into();
        self
    }

    /// Add a named constant.
    pub fn with_constant(mut self, name: impl Into<String>, value: f64) -> Self {
        self.constants.insert(name.into(), value);
        self
    }
}

/// Builds a [`Namespace`] from lattice text.
///
/// Loading is best effort: a malformed statement is recorded as a
/// diagnostic and the scan goes on.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    config: LoaderConfig,
}

impl Loader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Read and load a lattice file.
    pub fn load_file(&self, path: &Path) -> Result<Namespace> {
        let content = std::fs::read_to_string(path).map_err(|e| BeamlineError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        debug!(path = %path.display(), bytes = content.len(), "lattice file read");
        Ok(self.load(&content))
    }

    /// Load lattice text.
    pub fn load(&self, input: &str) -> Namespace {
        let lines: Vec<_> = LineJoiner::new(input, &self.config.annotation_marker).collect();
        let mut diagnostics = Vec::new();

        // Variables first: element parameters may use any of them
        let mut prefix = Vec::new();
        let mut assignments = Vec::new();
        for line in lines.iter().filter(|l| l.kind == LineKind::Variable) {
            prefix.push(line.text.clone());
            match parse_assignments(&line.text, line.line) {
                Ok(mut parsed) => assignments.append(&mut parsed),
                Err(err) => report(&mut diagnostics, line.line, &err),
            }
        }
        let variables = build_variables(&assignments, &self.config.constants, &mut diagnostics);

        let mut parser = Parser::new();
        let mut namespace = Namespace::from_parts(variables, prefix);
        let mut last: Option<String> = None;

        for line in &lines {
            match line.kind {
                LineKind::Variable => {}
                LineKind::Statement => match parser.parse_statement(&line.text, line.line) {
                    Ok((name, mut record)) => {
                        if !record.kind().is_beamline() {
                            resolve_params(&mut record.params, namespace.variables());
                        }
                        namespace.insert(ElementDefinition::new(&name, record));
                        last = Some(name);
                    }
                    Err(err) => report(&mut diagnostics, line.line, &err),
                },
                LineKind::Annotation => match &last {
                    Some(name) => namespace.annotate(name, &line.text),
                    None => report(
                        &mut diagnostics,
                        line.line,
                        &BeamlineError::OrphanAnnotation { line: line.line },
                    ),
                },
            }
        }
        diagnostics.append(&mut parser.take_diagnostics());
        diagnostics.sort_by_key(|d| d.line);

        debug!(
            definitions = namespace.len(),
            variables = namespace.variables().len(),
            annotations = namespace.annotations().len(),
            diagnostics = diagnostics.len(),
            "lattice loaded"
        );
        namespace.set_diagnostics(diagnostics);
        namespace
    }
}

/// Resolve the variable table, recording unresolved variables.
pub(crate) fn build_variables(
    assignments: &[Assignment],
    constants: &IndexMap<String, f64>,
    diagnostics: &mut Vec<Diagnostic>,
) -> VariableTable {
    let mut variables = VariableTable::with_constants(constants);
    variables.resolve(assignments);
    for err in variables.errors() {
        let line = match &err {
            BeamlineError::EvaluationError { variable, .. } => assignments
                .iter()
                .rev()
                .find(|a| &a.name == variable)
                .map_or(0, |a| a.line),
            _ => 0,
        };
        diagnostics.push(Diagnostic::from_error(line, &err));
    }
    variables
}

/// Replace every parameter expression that resolves by its number.
pub(crate) fn resolve_params(params: &mut IndexMap<String, Value>, variables: &VariableTable) {
    for value in params.values_mut() {
        if let Value::Text(raw) = value {
            if let Some(v) = variables.evaluate(raw) {
                *value = Value::Number(v);
            }
        }
    }
}

fn report(diagnostics: &mut Vec<Diagnostic>, line: usize, err: &BeamlineError) {
    warn!(line, "{}", err);
    diagnostics.push(Diagnostic::from_error(line, err));
}
