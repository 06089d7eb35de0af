//! Element addressing and bulk parameter mutation.
//!
//! Elements are addressed by type and by their occurrence within one fully
//! expanded beamline:
//!
//! | Selector | Meaning |
//! |----------|---------|
//! | `0` | first element of the type |
//! | `-1` | last element of the type |
//! | `0,2,3` | first, third and fourth |
//! | `2:10:1` | `start:stop:step` slice, bounds optional |
//! | `all` | every element of the type |
//!
//! Mutation operators are `+n%`/`-n%` (relative to the current value) or
//! `+n`, `-n`, `*n`, `/n` (absolute arithmetic).

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tracing::info;

use super::namespace::{canonical, Namespace};
use super::types::{OrderingRecord, ParameterEdit};
use crate::dsl::Value;
use crate::error::{BeamlineError, Result};

/// Position selector over the elements of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Single index, negative counts from the end
    Index(i64),
    /// Explicit list of indices
    List(Vec<i64>),
    /// `start:stop:step`
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
    },
    All,
}

impl FromStr for Selector {
    type Err = BeamlineError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let int = |part: &str| -> Result<i64> {
            part.trim().parse::<i64>().map_err(|_| {
                BeamlineError::selector(s, format!("'{}' is not an integer", part.trim()))
            })
        };

        if text.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        if text.contains(',') {
            return text.split(',').map(int).collect::<Result<Vec<_>>>().map(Self::List);
        }
        if text.contains(':') {
            let parts: Vec<&str> = text.split(':').collect();
            if parts.len() > 3 {
                return Err(BeamlineError::selector(s, "slice takes at most start:stop:step"));
            }
            let bound = |part: &str| -> Result<Option<i64>> {
                if part.trim().is_empty() {
                    Ok(None)
                } else {
                    int(part).map(Some)
                }
            };
            let step = match parts.get(2) {
                Some(p) => bound(p)?.unwrap_or(1),
                None => 1,
            };
            if step == 0 {
                return Err(BeamlineError::selector(s, "slice step cannot be zero"));
            }
            return Ok(Self::Slice {
                start: bound(parts[0])?,
                stop: bound(parts[1])?,
                step,
            });
        }
        int(text).map(Self::Index)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opt = |v: &Option<i64>| v.map(|v| v.to_string()).unwrap_or_default();
        match self {
            Self::Index(i) => write!(f, "{}", i),
            Self::List(list) => {
                let parts: Vec<String> = list.iter().map(i64::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
            Self::Slice { start, stop, step } => write!(f, "{}:{}:{}", opt(start), opt(stop), step),
            Self::All => write!(f, "all"),
        }
    }
}

impl Selector {
    /// Resolve to positions within a sequence of `len` items.
    pub fn positions(&self, len: usize) -> Result<Vec<usize>> {
        let n = len as i64;
        let single = |i: i64| -> Result<usize> {
            let idx = if i < 0 { n + i } else { i };
            if idx < 0 || idx >= n {
                return Err(BeamlineError::selector(
                    self.to_string(),
                    format!("index {} out of range for {} elements", i, len),
                ));
            }
            Ok(idx as usize)
        };

        match self {
            Self::Index(i) => Ok(vec![single(*i)?]),
            Self::List(list) => list.iter().map(|i| single(*i)).collect(),
            Self::All => Ok((0..len).collect()),
            Self::Slice { start, stop, step } => {
                let step = *step;
                let adjust = |v: i64| if v < 0 { v + n } else { v };
                // A step that overflows i64 ends the walk
                let walk = move |from: i64| {
                    std::iter::successors(Some(from), move |i: &i64| i.checked_add(step))
                };
                let out = if step > 0 {
                    let start = start.map(adjust).unwrap_or(0).clamp(0, n);
                    let stop = stop.map(adjust).unwrap_or(n).clamp(0, n);
                    walk(start).take_while(|i| *i < stop).map(|i| i as usize).collect()
                } else {
                    let start = start.map(adjust).unwrap_or(n - 1).clamp(-1, n - 1);
                    let stop = stop.map(adjust).unwrap_or(-1).clamp(-1, n - 1);
                    walk(start).take_while(|i| *i > stop).map(|i| i as usize).collect()
                };
                Ok(out)
            }
        }
    }
}

/// A parameter edit operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MutationOp {
    /// Scale by `1 + fraction` (`+10%` is 0.1, `-10%` is -0.1)
    Relative(f64),
    Add(f64),
    Sub(f64),
    Mul(f64),
    Div(f64),
}

impl FromStr for MutationOp {
    type Err = BeamlineError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let mut chars = text.chars();
        let op = chars
            .next()
            .ok_or_else(|| BeamlineError::selector(s, "empty operator"))?;
        let rest = chars.as_str().trim();

        let (number, percent) = match rest.strip_suffix('%') {
            Some(n) => (n.trim(), true),
            None => (rest, false),
        };
        if number.contains('%') {
            return Err(BeamlineError::selector(s, "only one trailing '%' is allowed"));
        }
        if !number.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            return Err(BeamlineError::selector(s, format!("expected a number after '{}'", op)));
        }
        let value: f64 = number
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| BeamlineError::selector(s, format!("'{}' is not a number", number)))?;

        match (op, percent) {
            ('+', true) => Ok(Self::Relative(value / 100.0)),
            ('-', true) => Ok(Self::Relative(-value / 100.0)),
            ('*' | '/', true) => {
                Err(BeamlineError::selector(s, "'%' only combines with '+' or '-'"))
            }
            ('+', false) => Ok(Self::Add(value)),
            ('-', false) => Ok(Self::Sub(value)),
            ('*', false) => Ok(Self::Mul(value)),
            ('/', false) if value == 0.0 => Err(BeamlineError::selector(s, "division by zero")),
            ('/', false) => Ok(Self::Div(value)),
            _ => Err(BeamlineError::selector(s, format!("unknown operator '{}'", op))),
        }
    }
}

impl MutationOp {
    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            Self::Relative(p) => value * (1.0 + p),
            Self::Add(n) => value + n,
            Self::Sub(n) => value - n,
            Self::Mul(n) => value * n,
            Self::Div(n) => value / n,
        }
    }
}

impl Namespace {
    /// Select elements of one type by occurrence within a beamline.
    pub fn select(
        &self,
        beamline: &str,
        element_type: &str,
        selector: &str,
    ) -> Result<Vec<OrderingRecord>> {
        let selector: Selector = selector.parse()?;
        if !self.is_beamline(beamline) {
            return Err(BeamlineError::NotABeamline { name: canonical(beamline) });
        }

        let matched: Vec<OrderingRecord> = self
            .order(beamline)?
            .into_iter()
            .filter(|r| r.element_type.eq_ignore_ascii_case(element_type))
            .collect();

        Ok(selector
            .positions(matched.len())?
            .into_iter()
            .map(|i| matched[i].clone())
            .collect())
    }

    /// Every occurrence of one element within a beamline.
    pub fn select_by_name(&self, beamline: &str, name: &str) -> Result<Vec<OrderingRecord>> {
        let name = name.trim().to_ascii_lowercase();
        let records: Vec<OrderingRecord> = self
            .order(beamline)?
            .into_iter()
            .filter(|r| r.name == name)
            .collect();
        if records.is_empty() {
            return Err(BeamlineError::reference(name, canonical(beamline)));
        }
        Ok(records)
    }

    /// Apply `op` to `property` of every selected element.
    ///
    /// All new values are computed before anything is written, so either
    /// every selected definition changes or none does. An element that
    /// occurs several times in the beamline is edited once.
    pub fn mutate(
        &mut self,
        beamline: &str,
        element_type: &str,
        selector: &str,
        property: &str,
        op: &str,
    ) -> Result<Vec<ParameterEdit>> {
        let op: MutationOp = op.parse()?;
        let property = property.trim().to_ascii_lowercase();
        let selected = self.select(beamline, element_type, selector)?;

        let mut seen = HashSet::new();
        let mut edits = Vec::new();
        for record in selected {
            let def = self
                .element(&record.name)
                .ok_or_else(|| BeamlineError::UnknownElement { name: canonical(&record.name) })?;
            if !seen.insert(def.name.clone()) {
                continue;
            }
            let current = def.params.get(&property).ok_or_else(|| BeamlineError::MissingProperty {
                element: def.name.clone(),
                property: property.clone(),
            })?;
            let old = current.as_number().ok_or_else(|| BeamlineError::NonNumericProperty {
                element: def.name.clone(),
                property: property.clone(),
                value: current.to_string(),
            })?;
            let new = op.apply(old);
            if !new.is_finite() {
                return Err(BeamlineError::selector(
                    format!("{:?}", op),
                    format!("result for '{}' is not finite", def.name),
                ));
            }
            edits.push(ParameterEdit {
                element: def.name.clone(),
                property: property.clone(),
                old,
                new,
            });
        }

        for edit in &edits {
            if let Some(def) = self.element_mut(&edit.element) {
                def.params.insert(edit.property.clone(), Value::Number(edit.new));
            }
        }
        info!(
            beamline = %canonical(beamline),
            element_type,
            property = %property,
            edited = edits.len(),
            "lattice mutated"
        );
        Ok(edits)
    }
}
