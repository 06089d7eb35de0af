//! Parser for single lattice statements.

use indexmap::IndexMap;
use tracing::warn;

use super::ast::*;
use super::lexer::{split_outside_quotes, strip_quotes};
use crate::error::{BeamlineError, Diagnostic, Result};

/// Statement parser.
///
/// Malformed parameter lists do not fail the statement: the parser falls
/// back to a bare record and keeps a diagnostic instead.
#[derive(Debug, Default)]
pub struct Parser {
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Problems recovered so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Hand over the recovered problems.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Parse `NAME : TYPE, k=v, ...` or `NAME : line = (ref ref ...)`.
    ///
    /// Returns the uppercased name and the record. Fails only when no
    /// name or type can be found at all.
    pub fn parse_statement(&mut self, text: &str, line: usize) -> Result<(String, ElementRecord)> {
        let (head, rest) = text
            .split_once(':')
            .ok_or_else(|| {
                BeamlineError::parse(line, format!("expected 'NAME : TYPE', got '{}'", text))
            })?;

        let name = head.trim();
        if name.is_empty() || name.contains(char::is_whitespace) || name.starts_with('%') {
            return Err(BeamlineError::parse(line, format!("invalid statement name '{}'", name)));
        }
        if rest.starts_with('=') {
            return Err(BeamlineError::parse(
                line,
                format!("'{}' is an assignment, not an element definition", name),
            ));
        }

        let rest = rest.trim();
        let type_end = rest
            .find(|c: char| c == ',' || c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let type_token = &rest[..type_end];
        if type_token.is_empty() {
            return Err(BeamlineError::parse(line, format!("missing type for '{}'", name)));
        }
        let mut type_name = type_token.to_ascii_lowercase();
        let tail = rest[type_end..].trim_start();

        let outcome = if ElementKind::from_keyword(&type_name).is_beamline() {
            type_name = BEAMLINE_TYPE.to_string();
            parse_reference_list(tail).map(|lattice| {
                let mut params = IndexMap::new();
                params.insert(LATTICE_KEY.to_string(), Value::Text(lattice));
                ElementRecord {
                    type_name: BEAMLINE_TYPE.to_string(),
                    params,
                }
            })
        } else {
            parse_params(tail).map(|params| ElementRecord {
                type_name: type_name.clone(),
                params,
            })
        };

        let record = match outcome {
            Ok(record) => record,
            Err(message) => {
                let err = BeamlineError::parse(line, format!("'{}': {}", name, message));
                warn!(line, element = %name, "{}", err);
                self.diagnostics.push(Diagnostic::from_error(line, &err));
                ElementRecord::bare(type_name)
            }
        };

        Ok((name.to_ascii_uppercase(), record))
    }
}

/// Parse a statement with a throwaway [`Parser`].
pub fn parse_statement(text: &str) -> Result<(String, ElementRecord)> {
    Parser::new().parse_statement(text, 0)
}

/// Parse `, k=v, k="v"` into an ordered map of raw values.
fn parse_params(tail: &str) -> std::result::Result<IndexMap<String, Value>, String> {
    let mut params = IndexMap::new();
    let tail = match tail.strip_prefix(',') {
        Some(t) => t,
        None if tail.is_empty() => return Ok(params),
        None => return Err(format!("expected ',' after type, got '{}'", tail)),
    };

    for field in split_outside_quotes(tail, ',') {
        let field = field.trim();
        // Continuation joins can leave empty fields
        if field.is_empty() {
            continue;
        }
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| format!("parameter '{}' has no value", field))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("parameter without a name in '{}'", field));
        }
        params.insert(key.to_ascii_lowercase(), Value::Text(strip_quotes(value)));
    }
    Ok(params)
}

/// Parse `= (a, 2*b, c)` into the normalized form `(a 2*b c)`.
///
/// The `beamline, lattice = (...)` spelling is accepted as well.
fn parse_reference_list(tail: &str) -> std::result::Result<String, String> {
    let list = if let Some(list) = tail.strip_prefix('=') {
        list
    } else if let Some(list) = tail
        .strip_prefix(',')
        .map(str::trim_start)
        .and_then(|t| t.strip_prefix(LATTICE_KEY))
        .and_then(|t| t.trim_start().strip_prefix('='))
    {
        list
    } else {
        return Err(format!("expected '= (...)' after line, got '{}'", tail));
    };
    let list = strip_quotes(list);
    let inner = list
        .strip_prefix('(')
        .and_then(|l| l.strip_suffix(')'))
        .ok_or_else(|| format!("reference list '{}' is not parenthesized", list))?;

    // `2 * q1` and `2*q1` are the same reference
    let compact = inner.replace(',', " ");
    let mut refs: Vec<String> = Vec::new();
    let mut tokens = compact.split_whitespace().peekable();
    while let Some(tok) = tokens.next() {
        let mut reference = tok.to_ascii_lowercase();
        while reference.ends_with('*') || tokens.peek().is_some_and(|t| t.starts_with('*')) {
            match tokens.next() {
                Some(next) => reference.push_str(&next.to_ascii_lowercase()),
                None => break,
            }
        }
        refs.push(reference);
    }
    if refs.is_empty() {
        return Err("empty reference list".to_string());
    }
    Ok(format!("({})", refs.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_element() {
        let (name, rec) = parse_statement("q01 : quad, l = 5.000000000e-02, k1 = 0").unwrap();
        assert_eq!(name, "Q01");
        assert_eq!(rec.type_name, "quad");
        assert_eq!(rec.params["l"], Value::Text("5.000000000e-02".into()));
        assert_eq!(rec.params["k1"], Value::Text("0".into()));
    }

    #[test]
    fn test_parse_quoted_values() {
        let (_, rec) =
            parse_statement("B11: CSRCSBEN, ANGLE=\"10.24 pi * 180 /\", csr='csr_on_off'").unwrap();
        assert_eq!(rec.type_name, "csrcsben");
        assert_eq!(rec.params["angle"], Value::Text("10.24 pi * 180 /".into()));
        assert_eq!(rec.params["csr"], Value::Text("csr_on_off".into()));
    }

    #[test]
    fn test_parse_type_only() {
        let (name, rec) = parse_statement("BPM01: MONI").unwrap();
        assert_eq!(name, "BPM01");
        assert_eq!(rec, ElementRecord::bare("moni"));
    }

    #[test]
    fn test_parse_beamline() {
        let (name, rec) =
            parse_statement("doub1 : line=(DQD3, Q05, 2 * DQD2, Q06,, DQD3)").unwrap();
        assert_eq!(name, "DOUB1");
        assert!(rec.kind().is_beamline());
        assert_eq!(rec.params[LATTICE_KEY], Value::Text("(dqd3 q05 2*dqd2 q06 dqd3)".into()));
    }

    #[test]
    fn test_line_in_element_name_is_not_beamline() {
        let (name, rec) = parse_statement("LINE1: DRIFT, L=1").unwrap();
        assert_eq!(name, "LINE1");
        assert_eq!(rec.type_name, "drift");
        let (_, rec) = parse_statement("d1: drift, l=\"line\"").unwrap();
        assert!(!rec.kind().is_beamline());
    }

    #[test]
    fn test_malformed_params_degrade() {
        let mut parser = Parser::new();
        let (name, rec) = parser.parse_statement("Q2: QUAD, L=0.1, K1", 7).unwrap();
        assert_eq!(name, "Q2");
        assert_eq!(rec, ElementRecord::bare("quad"));
        assert_eq!(parser.diagnostics().len(), 1);
        assert_eq!(parser.diagnostics()[0].line, 7);
    }

    #[test]
    fn test_unparsable_statement() {
        assert!(parse_statement("just some words").is_err());
        assert!(parse_statement("x := 3").is_err());
        assert!(parse_statement("two words: quad").is_err());
        assert!(parse_statement("q1 :").is_err());
    }
}
