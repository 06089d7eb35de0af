//! Core types for beamline expansion and element addressing.

use std::fmt;

use serde::Serialize;

/// One entry of a beamline reference list: `[N*]NAME`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Repetition count, 1 when omitted
    pub count: u32,
    /// Referenced name, lowercased
    pub name: String,
}

impl Reference {
    /// Parse a reference token. Both `18*a1p` and `a1p*18` are accepted.
    pub fn parse(token: &str) -> Option<Self> {
        split_reference(token).map(|(count, name)| Self { count, name })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 1 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}*{}", self.count, self.name)
        }
    }
}

/// Split a reference token into its repetition count and name.
pub fn split_reference(token: &str) -> Option<(u32, String)> {
    let token: String = token.split_whitespace().collect();
    let (count, name) = match token.split_once('*') {
        None => (1, token.as_str()),
        Some((a, b)) => match (a.parse::<u32>(), b.parse::<u32>()) {
            (Ok(n), Err(_)) => (n, b),
            (Err(_), Ok(n)) => (n, a),
            _ => return None,
        },
    };
    if name.is_empty() || name.contains('*') || count == 0 {
        return None;
    }
    Some((count, name.to_ascii_lowercase()))
}

/// Position of an element among all elements of its type in one expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderingRecord {
    /// Element name, lowercased
    pub name: String,
    /// Element type, uppercased
    pub element_type: String,
    /// 1-based occurrence index within the type
    pub index: usize,
}

impl fmt::Display for OrderingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10}:{:<10}:{:>3}", self.name, self.element_type, self.index)
    }
}

/// A single parameter change applied by a mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterEdit {
    /// Canonical element name
    pub element: String,
    pub property: String,
    pub old: f64,
    pub new: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_reference() {
        assert_eq!(split_reference("18*aip"), Some((18, "aip".to_string())));
        assert_eq!(split_reference("q01"), Some((1, "q01".to_string())));
        assert_eq!(split_reference("D01*3"), Some((3, "d01".to_string())));
        assert_eq!(split_reference("2 * x"), Some((2, "x".to_string())));
        assert_eq!(split_reference("a*b"), None);
        assert_eq!(split_reference("2*"), None);
        assert_eq!(split_reference("0*d1"), None);
    }

    #[test]
    fn test_reference_display() {
        assert_eq!(Reference::parse("18*A1P").unwrap().to_string(), "18*a1p");
        assert_eq!(Reference::parse("q01").unwrap().to_string(), "q01");
    }
}
