//! Error types for the beamline lattice toolkit.
//!
//! This module provides a unified error type [`BeamlineError`] that covers
//! all error conditions that can occur while loading a lattice file,
//! expanding beamlines, addressing elements and editing parameters.
//!
//! Failures that only affect a single statement during a load are not
//! returned; they are kept on the namespace as [`Diagnostic`] records.

use std::fmt;

use thiserror::Error;

/// Result type alias using [`BeamlineError`].
pub type Result<T> = std::result::Result<T, BeamlineError>;

/// Unified error type for all lattice operations.
#[derive(Error, Debug)]
pub enum BeamlineError {
    // ============ Lattice Parsing Errors ============
    /// Statement cannot be split into name, type and parameters
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Global variable still unresolved after the fixed-point cap
    #[error("Unresolved variable '{variable}' (expression: '{expression}')")]
    EvaluationError { variable: String, expression: String },

    /// Control annotation with no statement to attach to
    #[error("Orphan control annotation at line {line}")]
    OrphanAnnotation { line: usize },

    // ============ Expansion Errors ============
    /// A beamline reference names nothing in the namespace
    #[error("Unresolved reference '{name}' in beamline '{beamline}'")]
    ReferenceError { name: String, beamline: String },

    /// A beamline (directly or transitively) references itself
    #[error("Beamline '{beamline}' references itself: {}", .path.join(" -> "))]
    CycleError { beamline: String, path: Vec<String> },

    /// Name exists but is not a beamline
    #[error("'{name}' is not a defined beamline")]
    NotABeamline { name: String },

    /// Name is not defined at all
    #[error("Element '{name}' is not defined")]
    UnknownElement { name: String },

    // ============ Addressing / Mutation Errors ============
    /// Malformed index, slice or operator string
    #[error("Invalid selector '{selector}': {message}")]
    SelectorError { selector: String, message: String },

    /// Selected element has no such parameter
    #[error("Element '{element}' has no parameter '{property}'")]
    MissingProperty { element: String, property: String },

    /// Selected element parameter is not numeric
    #[error("Parameter '{property}' of '{element}' is not numeric (value: '{value}')")]
    NonNumericProperty {
        element: String,
        property: String,
        value: String,
    },

    // ============ Document Errors ============
    /// JSON document does not have the lattice layout
    #[error("Invalid lattice document: {message}")]
    InvalidDocument { message: String },

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ============ I/O Errors ============
    /// Error reading a lattice file
    #[error("Failed to read lattice file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing a generated file
    #[error("Failed to write '{path}': {source}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl BeamlineError {
    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create a selector error
    pub fn selector(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SelectorError {
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// Create a reference error
    pub fn reference(name: impl Into<String>, beamline: impl Into<String>) -> Self {
        Self::ReferenceError {
            name: name.into(),
            beamline: beamline.into(),
        }
    }

    /// Create an invalid document error
    pub fn document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }
}

/// Category of a recovered load-time problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Malformed statement, skipped or kept as a bare type
    Parse,
    /// Variable left unresolved
    Evaluation,
    /// Annotation that could not be attached
    Annotation,
}

/// A problem recovered during a load. The scan continued past it.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Physical line (1-indexed), 0 when not tied to a line
    pub line: usize,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    /// Record a recovered error.
    pub fn from_error(line: usize, error: &BeamlineError) -> Self {
        let kind = match error {
            BeamlineError::EvaluationError { .. } => DiagnosticKind::Evaluation,
            BeamlineError::OrphanAnnotation { .. } => DiagnosticKind::Annotation,
            _ => DiagnosticKind::Parse,
        };
        Self {
            line,
            kind,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "line {}: {}", self.line, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}
