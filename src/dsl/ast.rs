//! Parsed representation of lattice statements.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Reserved parameter key holding a beamline's reference list.
pub const LATTICE_KEY: &str = "lattice";

/// Type name stored for every beamline, whatever keyword declared it.
pub const BEAMLINE_TYPE: &str = "beamline";

/// A parameter value.
///
/// Values start as raw text and become numbers once their expression
/// resolves. Text that never resolves (file names, unknown symbols) is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric value, if resolved.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// Raw text, if unresolved.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Element kinds the lattice model treats specially.
///
/// Anything else keeps its keyword in [`ElementRecord::type_name`] and is
/// classified as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Beamline container (`line`)
    Beamline,
    /// Beam charge definition
    Charge,
    /// Any other element keyword
    Other,
}

impl ElementKind {
    /// Classify an element type keyword.
    ///
    /// Matches whole keywords only, so an element type that merely contains
    /// `line` is never taken for a beamline.
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.to_ascii_lowercase().as_str() {
            "line" | "beamline" => Self::Beamline,
            "charge" => Self::Charge,
            _ => Self::Other,
        }
    }

    pub fn is_beamline(&self) -> bool {
        matches!(self, Self::Beamline)
    }
}

/// A single parsed statement: `NAME : TYPE, k=v, ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRecord {
    /// Type keyword, lowercased
    pub type_name: String,
    /// Parameters in declaration order, keys lowercased
    pub params: IndexMap<String, Value>,
}

impl ElementRecord {
    /// A record carrying only a type.
    pub fn bare(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            params: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        ElementKind::from_keyword(&self.type_name)
    }
}

/// One `<expr> sto <name>` assignment from a `%` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Variable name
    pub name: String,
    /// Right-hand side RPN expression
    pub expression: String,
    /// Source line number
    pub line: usize,
}
