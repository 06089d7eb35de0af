//! Beamline expansion.
//!
//! Expansion walks the reference graph with an explicit stack of frames,
//! one per beamline being expanded, so deeply nested lattices never grow
//! the native call stack. The names on the stack form the active path; a
//! reference back into that path is a cycle.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::namespace::{canonical, Namespace};
use super::types::{OrderingRecord, Reference};
use crate::error::{BeamlineError, Result};

/// A beamline whose reference list is being walked.
struct Frame {
    name: String,
    refs: Vec<Reference>,
    next: usize,
    /// How many times the parent splices this frame's output
    repeat: u32,
    out: Vec<String>,
}

impl Namespace {
    /// Reference list of a beamline, without any expansion.
    pub fn get_beamline(&self, name: &str) -> Result<Vec<Reference>> {
        let def = self
            .element(name)
            .ok_or_else(|| BeamlineError::UnknownElement { name: canonical(name) })?;
        let lattice = def
            .lattice()
            .ok_or_else(|| BeamlineError::NotABeamline { name: def.name.clone() })?;

        let inner = lattice.trim().trim_start_matches('(').trim_end_matches(')');
        inner
            .split_whitespace()
            .map(|tok| {
                Reference::parse(tok).ok_or_else(|| BeamlineError::reference(tok, &def.name))
            })
            .collect()
    }

    /// Expand a beamline into leaf element names.
    ///
    /// With `extend`, every repetition is materialized and the result is
    /// the flat element sequence. Without it, nested beamlines are spliced
    /// in but leaf references keep their textual multiplier (`18*a1p`).
    pub fn expand(&self, name: &str, extend: bool) -> Result<Vec<String>> {
        let root = canonical(name);
        let refs = self.get_beamline(&root)?;

        let mut path = vec![root.clone()];
        let mut cache: HashMap<String, Vec<String>> = HashMap::new();
        let mut stack = vec![Frame {
            name: root.clone(),
            refs,
            next: 0,
            repeat: 1,
            out: Vec::new(),
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.next == frame.refs.len() {
                let Some(done) = stack.pop() else { break };
                path.pop();
                trace!(beamline = %done.name, elements = done.out.len(), "beamline expanded");
                match stack.last_mut() {
                    Some(parent) => {
                        for _ in 0..done.repeat {
                            parent.out.extend(done.out.iter().cloned());
                        }
                        cache.insert(done.name, done.out);
                    }
                    None => {
                        debug!(
                            beamline = %root,
                            extend,
                            elements = done.out.len(),
                            "expansion finished"
                        );
                        return Ok(done.out);
                    }
                }
                continue;
            }

            let reference = frame.refs[frame.next].clone();
            frame.next += 1;

            let def = self
                .element(&reference.name)
                .ok_or_else(|| BeamlineError::reference(&reference.name, &frame.name))?;

            if !def.is_beamline() {
                if extend {
                    for _ in 0..reference.count {
                        frame.out.push(reference.name.clone());
                    }
                } else {
                    frame.out.push(reference.to_string());
                }
                continue;
            }

            let key = def.name.clone();
            if path.contains(&key) {
                let mut cycle = path.clone();
                cycle.push(key);
                return Err(BeamlineError::CycleError {
                    beamline: root,
                    path: cycle,
                });
            }

            if let Some(done) = cache.get(&key) {
                for _ in 0..reference.count {
                    frame.out.extend(done.iter().cloned());
                }
                continue;
            }

            let refs = self.get_beamline(&key)?;
            trace!(beamline = %key, parent = %frame.name, depth = path.len(), "entering beamline");
            path.push(key.clone());
            stack.push(Frame {
                name: key,
                refs,
                next: 0,
                repeat: reference.count,
                out: Vec::new(),
            });
        }

        Ok(Vec::new())
    }

    /// Number every element of a fully expanded beamline within its type.
    ///
    /// `[q, q01, b11, q02]` becomes
    /// `[(q, CHARGE, 1), (q01, QUAD, 1), (b11, CSRCSBEN, 1), (q02, QUAD, 2)]`.
    pub fn order(&self, name: &str) -> Result<Vec<OrderingRecord>> {
        let elements = self.expand(name, true)?;
        let mut counters: HashMap<String, usize> = HashMap::new();
        let mut records = Vec::with_capacity(elements.len());

        for element in elements {
            let element_type = self
                .element_type(&element)
                .ok_or_else(|| BeamlineError::reference(&element, canonical(name)))?;
            let counter = counters.entry(element_type.clone()).or_insert(0);
            *counter += 1;
            records.push(OrderingRecord {
                name: element,
                element_type,
                index: *counter,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LATTICE: &str = "\
D0: DRIFT, L=1.0
Q1: QUAD, L=0.1, K1=10
Q2: QUAD, L=0.1, K1=-10
BPM: MONI
CELL: LINE=(Q1 D0 Q2 D0)
BL: LINE=(D0 2*Q1 D0)
RING: LINE=(BPM, 2*CELL, BL, 3*BPM)
";

    fn ns() -> Namespace {
        Namespace::from_source(LATTICE)
    }

    #[test]
    fn test_expand_extend() {
        assert_eq!(ns().expand("BL", true).unwrap(), vec!["d0", "q1", "q1", "d0"]);
    }

    #[test]
    fn test_expand_nested_extend() {
        let flat = ns().expand("ring", true).unwrap();
        assert_eq!(flat.len(), 1 + 8 + 4 + 3);
        assert_eq!(&flat[..5], &["bpm", "q1", "d0", "q2", "d0"]);
        assert_eq!(&flat[13..], &["bpm", "bpm", "bpm"]);
    }

    #[test]
    fn test_expand_single_pass_keeps_leaf_multipliers() {
        let once = ns().expand("ring", false).unwrap();
        assert_eq!(
            once,
            vec![
                "bpm", "q1", "d0", "q2", "d0", "q1", "d0", "q2", "d0", "d0", "2*q1", "d0", "3*bpm"
            ]
        );
    }

    #[test]
    fn test_expand_is_idempotent() {
        let ns = ns();
        assert_eq!(ns.expand("ring", true).unwrap(), ns.expand("ring", true).unwrap());
    }

    #[test]
    fn test_get_beamline() {
        let refs = ns().get_beamline("bl").unwrap();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[1], Reference { count: 2, name: "q1".into() });
        assert!(matches!(ns().get_beamline("q1"), Err(BeamlineError::NotABeamline { .. })));
        assert!(matches!(ns().get_beamline("nope"), Err(BeamlineError::UnknownElement { .. })));
    }

    #[test]
    fn test_unresolved_reference() {
        let ns = Namespace::from_source("D0: DRIFT, L=1\nBL: LINE=(D0 QX)\n");
        match ns.expand("BL", true) {
            Err(BeamlineError::ReferenceError { name, beamline }) => {
                assert_eq!(name, "qx");
                assert_eq!(beamline, "BL");
            }
            other => panic!("expected reference error, got {:?}", other),
        }
    }

    #[test]
    fn test_direct_cycle() {
        let ns = Namespace::from_source("D0: DRIFT, L=1\nBL: LINE=(D0 BL)\n");
        assert!(matches!(ns.expand("BL", true), Err(BeamlineError::CycleError { .. })));
        assert!(matches!(ns.expand("BL", false), Err(BeamlineError::CycleError { .. })));
    }

    #[test]
    fn test_indirect_cycle() {
        let ns = Namespace::from_source(
            "D0: DRIFT, L=1\nA: LINE=(D0 B)\nB: LINE=(2*C)\nC: LINE=(A D0)\n",
        );
        match ns.expand("A", true) {
            Err(BeamlineError::CycleError { beamline, path }) => {
                assert_eq!(beamline, "A");
                assert_eq!(path, vec!["A", "B", "C", "A"]);
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_deep_nesting_does_not_recurse() {
        let mut src = String::from("D0: DRIFT, L=1\nL0: LINE=(D0)\n");
        for i in 1..2000 {
            src.push_str(&format!("L{}: LINE=(L{} D0)\n", i, i - 1));
        }
        let flat = Namespace::from_source(&src).expand("L1999", true).unwrap();
        assert_eq!(flat.len(), 2000);
    }

    #[test]
    fn test_order() {
        let records = ns().order("cell").unwrap();
        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.name.as_str(), r.element_type.as_str(), r.index))
            .collect();
        assert_eq!(
            summary,
            vec![("q1", "QUAD", 1), ("d0", "DRIFT", 1), ("q2", "QUAD", 2), ("d0", "DRIFT", 2)]
        );
    }
}
