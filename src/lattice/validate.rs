//! Namespace validation.

use tracing::warn;

use crate::error::BeamlineError;

use super::Namespace;

/// Validate every beamline of a namespace.
///
/// Checks:
/// - All references resolve to a definition
/// - No beamline reaches itself
///
/// Returns one error per failing beamline; an empty list means every
/// beamline expands.
pub fn validate_namespace(namespace: &Namespace) -> Vec<BeamlineError> {
    let mut errors = Vec::new();
    for name in namespace.beamline_names() {
        if let Err(err) = namespace.expand(name, true) {
            warn!(beamline = %name, "{}", err);
            errors.push(err);
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_namespace() {
        let ns = Namespace::from_source("D: DRIFT, L=1\nA: LINE=(D)\nB: LINE=(A, 2*A, D)\n");
        assert!(validate_namespace(&ns).is_empty());
    }

    #[test]
    fn test_reports_each_broken_beamline() {
        let ns = Namespace::from_source("D: DRIFT, L=1\nA: LINE=(D X)\nB: LINE=(B)\nC: LINE=(D)\n");
        let errors = validate_namespace(&ns);
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], BeamlineError::ReferenceError { .. }));
        assert!(matches!(errors[1], BeamlineError::CycleError { .. }));
    }
}
