//! JSON document form of a namespace.
//!
//! ```text
//! {
//!   "Q01": {"quad": {"l": 0.05, "k1": 0.0}},
//!   "BPM01": "moni",
//!   "BL": {"beamline": {"lattice": "(q01 bpm01)"}},
//!   "_prefixstr": ["% 0.2 sto lb"],
//!   "_ctrlinfo": {"Q01": "pv=LINAC:Q01:K1"}
//! }
//! ```

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::dsl::{
    build_variables, parse_assignments, resolve_params, ElementKind, ElementRecord, Value,
    BEAMLINE_TYPE, LATTICE_KEY,
};
use crate::error::{BeamlineError, Result};
use crate::lattice::{ElementDefinition, Namespace};

/// Reserved key holding the raw `%` statements.
pub const PREFIX_KEY: &str = "_prefixstr";

/// Reserved key holding the control annotation side-table.
pub const CTRL_KEY: &str = "_ctrlinfo";

/// Convert a namespace into its JSON document form.
pub fn to_json(namespace: &Namespace) -> Result<Json> {
    let mut doc = Map::new();
    for def in namespace.iter() {
        let entry = if def.params.is_empty() {
            Json::String(def.type_name.clone())
        } else {
            let mut typed = Map::new();
            typed.insert(def.type_name.clone(), serde_json::to_value(&def.params)?);
            Json::Object(typed)
        };
        doc.insert(def.name.clone(), entry);
    }

    if !namespace.prefix_statements().is_empty() {
        doc.insert(PREFIX_KEY.to_string(), serde_json::to_value(namespace.prefix_statements())?);
    }
    if !namespace.annotations().is_empty() {
        doc.insert(CTRL_KEY.to_string(), serde_json::to_value(namespace.annotations())?);
    }
    Ok(Json::Object(doc))
}

impl Namespace {
    /// Rebuild a namespace from its JSON document form.
    ///
    /// Global variables are recomputed from `_prefixstr`, so unresolved
    /// parameter expressions resolve the same way they do when loading text.
    pub fn from_json(doc: &Json) -> Result<Namespace> {
        let doc = doc
            .as_object()
            .ok_or_else(|| BeamlineError::document("top level must be an object"))?;

        let prefix: Vec<String> = match doc.get(PREFIX_KEY) {
            Some(raw) => serde_json::from_value(raw.clone())?,
            None => Vec::new(),
        };
        let mut diagnostics = Vec::new();
        let mut assignments = Vec::new();
        for (idx, statement) in prefix.iter().enumerate() {
            assignments.extend(parse_assignments(statement, idx + 1)?);
        }
        let variables = build_variables(&assignments, &IndexMap::new(), &mut diagnostics);

        let mut namespace = Namespace::from_parts(variables, prefix);
        for (name, entry) in doc {
            if name == PREFIX_KEY || name == CTRL_KEY {
                continue;
            }
            let mut record = parse_entry(name, entry)?;
            if record.kind().is_beamline() {
                record.type_name = BEAMLINE_TYPE.to_string();
                if record.params.get(LATTICE_KEY).and_then(Value::as_text).is_none() {
                    let message = format!("beamline '{}' has no lattice", name);
                    return Err(BeamlineError::document(message));
                }
            } else {
                resolve_params(&mut record.params, namespace.variables());
            }
            namespace.insert(ElementDefinition::new(name, record));
        }

        if let Some(ctrl) = doc.get(CTRL_KEY) {
            let ctrl: IndexMap<String, String> = serde_json::from_value(ctrl.clone())?;
            for (name, payload) in &ctrl {
                namespace.annotate(name, payload);
            }
        }

        debug!(definitions = namespace.len(), "namespace rebuilt from json");
        namespace.set_diagnostics(diagnostics);
        Ok(namespace)
    }
}

/// `"type"` or `{"type": {params}}`.
fn parse_entry(name: &str, entry: &Json) -> Result<ElementRecord> {
    match entry {
        Json::String(type_name) => Ok(ElementRecord::bare(type_name.to_ascii_lowercase())),
        Json::Object(typed) if typed.len() == 1 => {
            let (type_name, params) = typed
                .iter()
                .next()
                .ok_or_else(|| BeamlineError::document(format!("'{}' has no type", name)))?;
            let params: IndexMap<String, Value> = serde_json::from_value(params.clone())?;
            let mut record = ElementRecord::bare(type_name.to_ascii_lowercase());
            record.params = params
                .into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::Text(s) if ElementKind::from_keyword(type_name).is_beamline() => {
                            Value::Text(s.to_ascii_lowercase())
                        }
                        other => other,
                    };
                    (key.to_ascii_lowercase(), value)
                })
                .collect();
            Ok(record)
        }
        _ => Err(BeamlineError::document(format!(
            "'{}' must be a type name or a single-key object",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LATTICE: &str = "\
% 0.2 sto lb
Q01 : QUAD, L=\"lb\", K1=\"kq\"
!@ pv=LINAC:Q01:K1
BPM01 : MONI
BL : LINE=(Q01, 2*BPM01)
";

    #[test]
    fn test_to_json() {
        let doc = to_json(&Namespace::from_source(LATTICE)).unwrap();
        assert_eq!(
            doc,
            json!({
                "Q01": {"quad": {"l": 0.2, "k1": "kq"}},
                "BPM01": "moni",
                "BL": {"beamline": {"lattice": "(q01 2*bpm01)"}},
                "_prefixstr": ["% 0.2 sto lb"],
                "_ctrlinfo": {"Q01": "pv=LINAC:Q01:K1"}
            })
        );
        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["Q01", "BPM01", "BL", "_prefixstr", "_ctrlinfo"]);
    }

    #[test]
    fn test_from_json_resolves_with_prefix() {
        let doc = json!({
            "_prefixstr": ["% 2 sto kq"],
            "Q1": {"QUAD": {"L": 0.1, "K1": "kq 5 *"}},
            "D0": {"drift": {"l": 1.0}},
            "BL": {"line": {"lattice": "(D0 2*Q1 D0)"}},
            "_ctrlinfo": {"q1": "pv=Q1"}
        });
        let ns = Namespace::from_json(&doc).unwrap();
        assert_eq!(ns.element("q1").unwrap().param("k1"), Some(&Value::Number(10.0)));
        assert_eq!(ns.element_type("bl").as_deref(), Some("BEAMLINE"));
        assert_eq!(ns.expand("bl", true).unwrap(), vec!["d0", "q1", "q1", "d0"]);
        assert_eq!(ns.annotation("Q1"), Some("pv=Q1"));
    }

    #[test]
    fn test_json_round_trip() {
        let ns = Namespace::from_source(LATTICE);
        let back = Namespace::from_json(&to_json(&ns).unwrap()).unwrap();
        assert_eq!(back.expand("bl", true).unwrap(), ns.expand("bl", true).unwrap());
        assert_eq!(back.element("q01"), ns.element("q01"));
        assert_eq!(back.annotations(), ns.annotations());
    }

    #[test]
    fn test_from_json_rejects_bad_documents() {
        assert!(matches!(
            Namespace::from_json(&json!([1, 2])),
            Err(BeamlineError::InvalidDocument { .. })
        ));
        assert!(matches!(
            Namespace::from_json(&json!({"Q1": {"quad": {}, "drift": {}}})),
            Err(BeamlineError::InvalidDocument { .. })
        ));
        assert!(matches!(
            Namespace::from_json(&json!({"BL": {"line": {"l": 1}}})),
            Err(BeamlineError::InvalidDocument { .. })
        ));
    }
}
