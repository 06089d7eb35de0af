//! The lattice namespace: every element and beamline by name.

use indexmap::IndexMap;
use tracing::debug;

use crate::dsl::{ElementKind, ElementRecord, Loader, Value, VariableTable, LATTICE_KEY};
use crate::error::{BeamlineError, Diagnostic, Result};

use super::types::Reference;

/// Canonical namespace key for a name.
pub fn canonical(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

/// A named element or beamline definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDefinition {
    /// Canonical (uppercase) name
    pub name: String,
    pub kind: ElementKind,
    /// Type keyword, lowercased
    pub type_name: String,
    /// Parameters in declaration order
    pub params: IndexMap<String, Value>,
}

impl ElementDefinition {
    /// Attach a name to a parsed record.
    pub fn new(name: &str, record: ElementRecord) -> Self {
        Self {
            name: canonical(name),
            kind: record.kind(),
            type_name: record.type_name,
            params: record.params,
        }
    }

    pub fn is_beamline(&self) -> bool {
        self.kind.is_beamline()
    }

    /// Look up a parameter (case-insensitive key).
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(&key.to_ascii_lowercase())
    }

    /// The reference list of a beamline, `(a b 2*c)`.
    pub fn lattice(&self) -> Option<&str> {
        if !self.is_beamline() {
            return None;
        }
        self.params.get(LATTICE_KEY).and_then(Value::as_text)
    }
}

/// Every definition loaded from one lattice source.
///
/// Built once by the [`Loader`]; expansion and rendering only read it,
/// mutation edits definitions in place.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: IndexMap<String, ElementDefinition>,
    variables: VariableTable,
    /// Raw `%` statements in input order
    prefix: Vec<String>,
    /// Control annotations by element name, never interpreted here
    annotations: IndexMap<String, String>,
    diagnostics: Vec<Diagnostic>,
}

impl Namespace {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a namespace from lattice text with the default configuration.
    pub fn from_source(input: &str) -> Self {
        Loader::default().load(input)
    }

    /// An empty namespace over an already resolved variable table.
    pub(crate) fn from_parts(variables: VariableTable, prefix: Vec<String>) -> Self {
        Self {
            variables,
            prefix,
            ..Self::default()
        }
    }

    pub(crate) fn set_diagnostics(&mut self, diagnostics: Vec<Diagnostic>) {
        self.diagnostics = diagnostics;
    }

    /// Insert a definition. A later definition of the same name replaces
    /// the earlier one, which is returned.
    pub fn insert(&mut self, def: ElementDefinition) -> Option<ElementDefinition> {
        let previous = self.entries.insert(def.name.clone(), def);
        if let Some(prev) = &previous {
            debug!(element = %prev.name, "definition replaced");
        }
        previous
    }

    /// Look up a definition (case-insensitive).
    pub fn element(&self, name: &str) -> Option<&ElementDefinition> {
        self.entries.get(&canonical(name))
    }

    pub(crate) fn element_mut(&mut self, name: &str) -> Option<&mut ElementDefinition> {
        self.entries.get_mut(&canonical(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&canonical(name))
    }

    /// Whether `name` is a defined beamline.
    pub fn is_beamline(&self, name: &str) -> bool {
        self.element(name).is_some_and(ElementDefinition::is_beamline)
    }

    /// Uppercased type keyword of a definition, e.g. `QUAD`.
    pub fn element_type(&self, name: &str) -> Option<String> {
        self.element(name).map(|def| def.type_name.to_ascii_uppercase())
    }

    /// All definitions in input order.
    pub fn iter(&self) -> impl Iterator<Item = &ElementDefinition> {
        self.entries.values()
    }

    /// Names of all non-beamline elements.
    pub fn element_names(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|d| !d.is_beamline()).map(|d| d.name.as_str())
    }

    /// Names of all beamlines.
    pub fn beamline_names(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|d| d.is_beamline()).map(|d| d.name.as_str())
    }

    /// Name of the first CHARGE element, if any.
    pub fn charge_element(&self) -> Option<&str> {
        self.iter()
            .find(|d| d.kind == ElementKind::Charge)
            .map(|d| d.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolved global variables.
    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    /// Raw `%` statements in input order.
    pub fn prefix_statements(&self) -> &[String] {
        &self.prefix
    }

    /// Control annotation side-table.
    pub fn annotations(&self) -> &IndexMap<String, String> {
        &self.annotations
    }

    pub fn annotation(&self, name: &str) -> Option<&str> {
        self.annotations.get(&canonical(name)).map(String::as_str)
    }

    /// Attach (or append to) the annotation of an element.
    pub fn annotate(&mut self, name: &str, payload: &str) {
        self.annotations
            .entry(canonical(name))
            .and_modify(|existing| {
                existing.push('\n');
                existing.push_str(payload);
            })
            .or_insert_with(|| payload.to_string());
    }

    /// Problems recovered while loading.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Define (or redefine) a beamline from existing names.
    ///
    /// Every reference must resolve and the new line must not reach itself;
    /// otherwise the namespace is left untouched.
    pub fn define_beamline(&mut self, name: &str, refs: &[&str]) -> Result<()> {
        let key = canonical(name);
        let mut tokens = Vec::with_capacity(refs.len());
        for token in refs {
            let reference =
                Reference::parse(token).ok_or_else(|| BeamlineError::reference(*token, &key))?;
            if !self.contains(&reference.name) && canonical(&reference.name) != key {
                return Err(BeamlineError::reference(reference.name, &key));
            }
            tokens.push(reference.to_string());
        }
        if tokens.is_empty() {
            return Err(BeamlineError::NotABeamline { name: key });
        }

        let mut record = ElementRecord::bare(crate::dsl::BEAMLINE_TYPE);
        record
            .params
            .insert(LATTICE_KEY.to_string(), Value::Text(format!("({})", tokens.join(" "))));
        let previous = self.insert(ElementDefinition::new(&key, record));

        if let Err(err) = self.expand(&key, true) {
            match previous {
                Some(prev) => {
                    self.insert(prev);
                }
                None => {
                    self.entries.shift_remove(&key);
                }
            }
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
q : charge, total=1e-9
d0: drift, l=1.0
Q1: QUAD, L=0.1, K1=10
bpm1: moni
BL: line=(q d0 2*Q1 bpm1 D0)
";

    #[test]
    fn test_queries() {
        let ns = Namespace::from_source(SOURCE);
        assert_eq!(ns.len(), 5);
        assert!(ns.is_beamline("bl"));
        assert!(!ns.is_beamline("q1"));
        assert!(!ns.is_beamline("bl01"));
        assert_eq!(ns.element_type("q1").as_deref(), Some("QUAD"));
        assert_eq!(ns.beamline_names().collect::<Vec<_>>(), vec!["BL"]);
        assert_eq!(ns.element_names().count(), 4);
        assert_eq!(ns.charge_element(), Some("Q"));
        assert_eq!(ns.element("Q1").unwrap().param("K1"), Some(&Value::Number(10.0)));
    }

    #[test]
    fn test_define_beamline() {
        let mut ns = Namespace::from_source(SOURCE);
        ns.define_beamline("newline", &["d0", "2*bl", "q1"]).unwrap();
        assert!(ns.is_beamline("NEWLINE"));
        assert_eq!(ns.expand("newline", true).unwrap().len(), 14);
    }

    #[test]
    fn test_define_beamline_rejects_unknown_and_self() {
        let mut ns = Namespace::from_source(SOURCE);
        assert!(matches!(
            ns.define_beamline("x", &["d0", "nope"]),
            Err(BeamlineError::ReferenceError { name, .. }) if name == "nope"
        ));
        assert!(!ns.contains("x"));

        let before = ns.element("BL").cloned();
        assert!(matches!(
            ns.define_beamline("bl", &["d0", "bl"]),
            Err(BeamlineError::CycleError { .. })
        ));
        assert_eq!(ns.element("BL").cloned(), before);
    }

    #[test]
    fn test_annotate_appends() {
        let mut ns = Namespace::new();
        ns.annotate("q1", "pv=Q1:K1");
        ns.annotate("Q1", "scale=2");
        assert_eq!(ns.annotation("q1"), Some("pv=Q1:K1\nscale=2"));
    }
}
