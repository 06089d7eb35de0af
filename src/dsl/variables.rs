//! Global variable table built from `% <expr> sto <name>` statements.

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::ast::Assignment;
use super::rpn::solve;
use crate::error::{BeamlineError, Result};

/// Keyword separating an expression from the variable it is stored in.
pub const STO_KEYWORD: &str = "sto";

/// Resolved global variables.
///
/// Definitions may chain (`% b sto a`, `% 0.1 sto b`) in any declaration
/// order. Entries that never resolve are kept apart with their expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableTable {
    values: IndexMap<String, f64>,
    unresolved: IndexMap<String, String>,
}

impl VariableTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table pre-seeded with constants.
    pub fn with_constants(constants: &IndexMap<String, f64>) -> Self {
        Self {
            values: constants.clone(),
            unresolved: IndexMap::new(),
        }
    }

    /// Resolve a list of assignments on top of the current values.
    ///
    /// Every pass substitutes already resolved names into the pending
    /// expressions and tries to evaluate them. The loop stops once a pass
    /// changes nothing or after one pass per variable.
    pub fn resolve(&mut self, assignments: &[Assignment]) {
        // Later definitions of the same name win
        let mut pending: IndexMap<String, String> = IndexMap::new();
        for a in assignments {
            self.values.shift_remove(&a.name);
            pending.insert(a.name.clone(), a.expression.clone());
        }

        let cap = pending.len().max(1);
        for pass in 1..=cap {
            let mut changed = false;
            let names: Vec<String> = pending.keys().cloned().collect();
            for name in names {
                let Some(expr) = pending.get(&name) else {
                    continue;
                };
                if let Some(v) = self.evaluate(expr) {
                    pending.shift_remove(&name);
                    self.values.insert(name, v);
                    changed = true;
                }
            }
            if pending.is_empty() || !changed {
                debug!(
                    pass,
                    resolved = self.values.len(),
                    pending = pending.len(),
                    "variable resolution finished"
                );
                break;
            }
        }

        for (name, expr) in pending {
            warn!(variable = %name, expression = %expr, "variable left unresolved");
            self.unresolved.insert(name, expr);
        }
    }

    /// Replace every token naming a resolved variable by its value.
    pub fn substitute(&self, expr: &str) -> String {
        expr.split_whitespace()
            .map(|tok| match self.values.get(tok) {
                Some(v) => v.to_string(),
                None => tok.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Substitute variables, then evaluate.
    pub fn evaluate(&self, expr: &str) -> Option<f64> {
        solve(&self.substitute(expr))
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Resolved variables in definition order.
    pub fn values(&self) -> &IndexMap<String, f64> {
        &self.values
    }

    /// Variables still unresolved, with their expressions.
    pub fn unresolved(&self) -> &IndexMap<String, String> {
        &self.unresolved
    }

    /// One [`BeamlineError::EvaluationError`] per unresolved variable.
    pub fn errors(&self) -> Vec<BeamlineError> {
        self.unresolved
            .iter()
            .map(|(name, expr)| BeamlineError::EvaluationError {
                variable: name.clone(),
                expression: expr.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parse the body of a `%` statement into assignments.
///
/// A statement may carry several `<expr> sto <name>` groups.
pub fn parse_assignments(text: &str, line: usize) -> Result<Vec<Assignment>> {
    let body = text.trim_start_matches('%');
    let mut assignments = Vec::new();
    let mut expr: Vec<&str> = Vec::new();
    let mut tokens = body.split_whitespace();

    while let Some(tok) = tokens.next() {
        if tok != STO_KEYWORD {
            expr.push(tok);
            continue;
        }
        let name = tokens
            .next()
            .ok_or_else(|| BeamlineError::parse(line, "'sto' without a variable name"))?;
        if expr.is_empty() {
            return Err(BeamlineError::parse(line, format!("no expression stored in '{}'", name)));
        }
        assignments.push(Assignment {
            name: name.to_string(),
            expression: expr.join(" "),
            line,
        });
        expr.clear();
    }

    if !expr.is_empty() {
        return Err(BeamlineError::parse(
            line,
            format!("expression '{}' is not stored in a variable", expr.join(" ")),
        ));
    }
    if assignments.is_empty() {
        return Err(BeamlineError::parse(line, "empty variable statement"));
    }
    Ok(assignments)
}
