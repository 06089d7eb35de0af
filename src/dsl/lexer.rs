//! Line joiner for lattice files.
//!
//! Turns physical lines into logical statements: comments are stripped,
//! `&` continuations are joined and control annotations are split off.

use std::collections::VecDeque;

/// Comment introducer.
pub const COMMENT_CHAR: char = '!';

/// Line continuation marker (last character of a physical line).
pub const CONTINUATION_CHAR: char = '&';

/// Kind of a logical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// `NAME : TYPE, ...` or anything else that is not a variable line
    Statement,
    /// `% <expr> sto <name>`
    Variable,
    /// Control annotation payload (marker removed)
    Annotation,
}

/// A logical line produced by the [`LineJoiner`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalLine {
    pub kind: LineKind,
    /// Joined text, comments and continuation markers removed
    pub text: String,
    /// Physical line the statement starts on (1-indexed)
    pub line: usize,
}

/// Iterator over the logical lines of a lattice source.
pub struct LineJoiner<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    annotation_marker: &'a str,
    pending: Option<(String, usize)>,
    deferred: VecDeque<LogicalLine>,
}

impl<'a> LineJoiner<'a> {
    /// Create a joiner for the given input.
    ///
    /// Lines starting with `annotation_marker` become [`LineKind::Annotation`];
    /// an empty marker disables annotations.
    pub fn new(input: &'a str, annotation_marker: &'a str) -> Self {
        Self {
            lines: input.lines().enumerate(),
            annotation_marker,
            pending: None,
            deferred: VecDeque::new(),
        }
    }

    fn finish(text: String, line: usize) -> LogicalLine {
        let kind = if text.starts_with('%') {
            LineKind::Variable
        } else {
            LineKind::Statement
        };
        LogicalLine { kind, text, line }
    }
}

impl Iterator for LineJoiner<'_> {
    type Item = LogicalLine;

    fn next(&mut self) -> Option<LogicalLine> {
        loop {
            if self.pending.is_none() {
                if let Some(line) = self.deferred.pop_front() {
                    return Some(line);
                }
            }

            let Some((idx, raw)) = self.lines.next() else {
                // Dangling continuation at end of input still counts
                if let Some((text, line)) = self.pending.take() {
                    return Some(Self::finish(text, line));
                }
                return self.deferred.pop_front();
            };
            let lineno = idx + 1;
            let trimmed = raw.trim();

            if !self.annotation_marker.is_empty() && trimmed.starts_with(self.annotation_marker) {
                let annotation = LogicalLine {
                    kind: LineKind::Annotation,
                    text: trimmed[self.annotation_marker.len()..].trim().to_string(),
                    line: lineno,
                };
                if self.pending.is_some() {
                    self.deferred.push_back(annotation);
                    continue;
                }
                return Some(annotation);
            }

            let code = strip_comment(trimmed).trim();
            if code.is_empty() {
                continue;
            }

            let (body, continues) = match code.strip_suffix(CONTINUATION_CHAR) {
                Some(body) => (body.trim_end(), true),
                None => (code, false),
            };

            match self.pending.as_mut() {
                Some((buf, _)) => {
                    // Variable lines are whitespace separated, statements comma separated
                    buf.push(if buf.starts_with('%') { ' ' } else { ',' });
                    buf.push_str(body);
                }
                None => self.pending = Some((body.to_string(), lineno)),
            }

            if !continues {
                if let Some((text, line)) = self.pending.take() {
                    return Some(Self::finish(text, line));
                }
            }
        }
    }
}

/// Remove a trailing `!` comment, ignoring `!` inside quotes.
pub fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    for (pos, ch) in line.char_indices() {
        match (quote, ch) {
            (None, '"' | '\'') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            (None, COMMENT_CHAR) => return &line[..pos],
            _ => {}
        }
    }
    line
}

/// Split on `delim`, ignoring delimiters inside quotes.
pub fn split_outside_quotes(text: &str, delim: char) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut quote = None;
    let mut start = 0;
    for (pos, ch) in text.char_indices() {
        match (quote, ch) {
            (None, '"' | '\'') => quote = Some(ch),
            (Some(q), c) if c == q => quote = None,
            (None, c) if c == delim => {
                fields.push(&text[start..pos]);
                start = pos + c.len_utf8();
            }
            _ => {}
        }
    }
    fields.push(&text[start..]);
    fields
}

/// Trim whitespace and remove all quote characters.
pub fn strip_quotes(text: &str) -> String {
    text.trim().chars().filter(|c| *c != '"' && *c != '\'').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(input: &str) -> Vec<LogicalLine> {
        LineJoiner::new(input, "!@").collect()
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("q1: quad, l=0.1 ! focusing"), "q1: quad, l=0.1 ");
        let quoted = "w: watch, filename=\"a!b.sdds\"";
        assert_eq!(strip_comment(quoted), quoted);
        assert_eq!(strip_comment("! whole line"), "");
    }

    #[test]
    fn test_joins_continuations() {
        let lines = join("! header\nq1: quad, l=0.1, &\n   k1=2.0\nd1: drift, l=1\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "q1: quad, l=0.1,,k1=2.0");
        assert_eq!(lines[0].line, 2);
        assert_eq!(lines[0].kind, LineKind::Statement);
        assert_eq!(lines[1].line, 4);
    }

    #[test]
    fn test_variable_line() {
        let lines = join("% 0.1 2 * &\n sto len\n");
        assert_eq!(lines[0].kind, LineKind::Variable);
        assert_eq!(lines[0].text, "% 0.1 2 * sto len");
    }

    #[test]
    fn test_annotation_deferred_past_continuation() {
        let lines = join("q1: quad, &\n!@ pv=Q1:SET\n k1=1\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "q1: quad,,k1=1");
        assert_eq!(lines[1].kind, LineKind::Annotation);
        assert_eq!(lines[1].text, "pv=Q1:SET");
        assert_eq!(lines[1].line, 2);
    }

    #[test]
    fn test_dangling_continuation_flushed() {
        let lines = join("bl: line=(a, b, &\n");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "bl: line=(a, b,");
    }

    #[test]
    fn test_split_outside_quotes() {
        assert_eq!(
            split_outside_quotes("l=0.1, f=\"a,b\", k1=2", ','),
            vec!["l=0.1", " f=\"a,b\"", " k1=2"]
        );
        assert_eq!(strip_quotes(" \"0.1 2 *\" "), "0.1 2 *");
    }
}
