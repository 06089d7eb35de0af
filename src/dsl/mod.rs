//! Reader for elegant-style `.lte` lattice files.
//!
//! The format is line-oriented. A physical line ending in `&` continues on
//! the next one, and `!` starts a comment outside quotes.
//!
//! # Grammar Overview
//!
//! ```text
//! lattice     = { line }
//! line        = comment | annotation | variable | statement | empty
//! comment     = '!' { any_char }
//! annotation  = marker { any_char }              (marker defaults to "!@")
//! variable    = '%' rpn_expr "sto" name { rpn_expr "sto" name }
//! statement   = name ':' type { ',' param }
//!             | name ':' ("line" | "beamline") ['='] '(' refs ')'
//!
//! param       = key '=' (number | quoted_rpn | bare_word)
//! refs        = reference { (',' | ' ') reference }
//! reference   = [count '*'] name | name '*' count
//! ```
//!
//! # Statement Kinds
//!
//! | Kind | Example | Result |
//! |------|---------|--------|
//! | Element | `Q01 : QUAD, L=0.05, K1=10` | element definition |
//! | Beamline | `BL : LINE=(D0, 2*Q01, D0)` | beamline definition |
//! | Variable | `% 0.2 sto lb` | global variable |
//! | Annotation | `!@ pv=LINAC:Q01:K1` | attached to the previous statement |
//!
//! Quoted parameter values are RPN expressions. They are evaluated against
//! the global variables and kept as text when they do not resolve.
//!
//! # Example
//!
//! ```text
//! ! FODO cell
//! % 0.1 sto lq
//! QF : QUAD, L="lq", K1=1.2
//! QD : QUAD, L="lq", K1=-1.2
//! D1 : DRIFT, L=0.5
//! CELL : LINE=(QF, D1, QD, D1)
//! ```

mod ast;
mod lexer;
mod loader;
mod parser;
mod rpn;
mod variables;

pub use ast::*;
pub use lexer::{
    split_outside_quotes, strip_comment, strip_quotes, LineJoiner, LineKind, LogicalLine,
    COMMENT_CHAR, CONTINUATION_CHAR,
};
pub(crate) use loader::{build_variables, resolve_params};
pub use loader::{Loader, LoaderConfig, DEFAULT_ANNOTATION_MARKER};
pub use parser::{parse_statement, Parser};
pub use rpn::{constant, solve, C_MKS, E_MKS, ME_MKS, MEV};
pub use variables::{parse_assignments, VariableTable, STO_KEYWORD};

use crate::error::Result;
use crate::lattice::Namespace;

/// Load lattice text with the default configuration.
pub fn load(input: &str) -> Namespace {
    Loader::default().load(input)
}

/// Load a lattice file with the default configuration.
pub fn load_file(path: &std::path::Path) -> Result<Namespace> {
    Loader::default().load_file(path)
}
