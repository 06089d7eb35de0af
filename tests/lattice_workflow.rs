//! End-to-end checks: load, expand, address, edit and re-render lattices.

use std::io::Write;

use approx::assert_relative_eq;
use rstest::{fixture, rstest};

use beamline_core::dsl::{self, Value};
use beamline_core::error::DiagnosticKind;
use beamline_core::lattice::validate_namespace;
use beamline_core::output::{render, to_json, RenderConfig};
use beamline_core::{BeamlineError, Namespace};

const LINAC: &str = "\
! injector excerpt
% 10.24 pi * 180 / sto theta
% 0.2 sto lb
% lb theta * theta sin / sto larc
q : charge, total = 5e-10
D0 : DRIFT, L=1.0
Q1 : QUAD, L=0.1, K1=10
Q2 : QUAD, L=0.1, K1=-8
Q3 : QUAD, L=0.1, K1=\"kq\"
!@ pv=LINAC:Q3:K1
B11 : CSRCSBEN, L=\"larc\", ANGLE=\"theta\", &
      E1=0, CSR=csr_on_off
BPM : MONI
W1 : WATCH, FILENAME=\"%s.w1\"
CHICANE : LINE=(B11, D0, B11)
CELL : LINE=(Q1, D0, Q2, D0)
BL : LINE=(q, D0, 2*Q1, D0)
LINAC : LINE=(q, BPM, 2*CELL, CHICANE, Q3, 3*D0, W1)
";

#[fixture]
fn linac() -> Namespace {
    Namespace::from_source(LINAC)
}

#[rstest]
fn test_load_is_clean(linac: Namespace) {
    assert!(linac.diagnostics().is_empty(), "{:?}", linac.diagnostics());
    assert!(validate_namespace(&linac).is_empty());
    assert_eq!(linac.beamline_names().collect::<Vec<_>>(), vec!["CHICANE", "CELL", "BL", "LINAC"]);
    assert_relative_eq!(
        linac.element("b11").unwrap().param("l").unwrap().as_number().unwrap(),
        0.20106869612225164,
        max_relative = 1e-12
    );
    assert_eq!(linac.element("q3").unwrap().param("k1"), Some(&Value::Text("kq".into())));
    assert_eq!(linac.annotation("q3"), Some("pv=LINAC:Q3:K1"));
}

#[rstest]
#[case("BL", vec!["q", "d0", "q1", "q1", "d0"])]
#[case("CHICANE", vec!["b11", "d0", "b11"])]
#[case("CELL", vec!["q1", "d0", "q2", "d0"])]
fn test_expand(linac: Namespace, #[case] beamline: &str, #[case] expected: Vec<&str>) {
    assert_eq!(linac.expand(beamline, true).unwrap(), expected);
}

#[rstest]
fn test_expand_nested_counts(linac: Namespace) {
    let flat = linac.expand("linac", true).unwrap();
    assert_eq!(flat.len(), 2 + 8 + 3 + 1 + 3 + 1);
    let once = linac.expand("linac", false).unwrap();
    assert_eq!(once.len(), 2 + 8 + 3 + 1 + 1 + 1);
    assert!(once.contains(&"3*d0".to_string()));
}

#[rstest]
#[case("0,2", vec![1, 3])]
#[case("all", vec![1, 2, 3, 4, 5])]
#[case("-1", vec![5])]
#[case("1:4:2", vec![2, 4])]
#[case("::-2", vec![5, 3, 1])]
#[case("1::9223372036854775807", vec![2])]
fn test_select_quads(linac: Namespace, #[case] selector: &str, #[case] indices: Vec<usize>) {
    let records = linac.select("LINAC", "QUAD", selector).unwrap();
    assert_eq!(records.iter().map(|r| r.index).collect::<Vec<_>>(), indices);
    assert!(records.iter().all(|r| r.element_type == "QUAD"));
}

#[rstest]
fn test_select_list_and_out_of_range(linac: Namespace) {
    let records = linac.select("CELL", "quad", "0,1").unwrap();
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["q1", "q2"]);
    assert!(matches!(
        linac.select("CELL", "QUAD", "0,2"),
        Err(BeamlineError::SelectorError { .. })
    ));
}

#[rstest]
fn test_mutate_doubles_then_noop(mut linac: Namespace) {
    let edits = linac.mutate("CELL", "quad", "all", "k1", "+100%").unwrap();
    assert_eq!(edits.len(), 2);
    assert_eq!(linac.element("q1").unwrap().param("k1"), Some(&Value::Number(20.0)));
    assert_eq!(linac.element("q2").unwrap().param("k1"), Some(&Value::Number(-16.0)));

    let before = to_json(&linac).unwrap();
    linac.mutate("CELL", "quad", "all", "k1", "+0%").unwrap();
    assert_eq!(to_json(&linac).unwrap(), before);
}

#[rstest]
fn test_mutate_is_atomic(mut linac: Namespace) {
    let before = to_json(&linac).unwrap();
    let err = linac.mutate("LINAC", "QUAD", "all", "K1", "*2").unwrap_err();
    assert!(matches!(
        err,
        BeamlineError::NonNumericProperty { ref element, .. } if element == "Q3"
    ));
    assert_eq!(to_json(&linac).unwrap(), before);
}

#[rstest]
#[case("10%")]
#[case("+10%%")]
#[case("*10%")]
#[case("+abc")]
#[case("/0")]
fn test_mutate_rejects_bad_operators(mut linac: Namespace, #[case] op: &str) {
    assert!(matches!(
        linac.mutate("CELL", "QUAD", "all", "K1", op),
        Err(BeamlineError::SelectorError { .. })
    ));
}

#[rstest]
fn test_render_round_trip(linac: Namespace) {
    let text = render(&linac, "LINAC", &RenderConfig::default()).unwrap();
    let reloaded = dsl::load(&text);

    assert_eq!(reloaded.expand("linac", true).unwrap(), linac.expand("linac", true).unwrap());
    for name in linac.expand("linac", true).unwrap() {
        let original = linac.element(&name).unwrap();
        let copy = reloaded.element(&name).unwrap();
        assert_eq!(copy.type_name, original.type_name);
        for (key, value) in &original.params {
            match value {
                Value::Number(v) => {
                    let reloaded = copy.params[key].as_number().unwrap();
                    assert_relative_eq!(reloaded, *v, max_relative = 1e-12)
                }
                Value::Text(s) => assert_eq!(copy.params[key].as_text(), Some(s.as_str())),
            }
        }
    }
}

#[rstest]
fn test_render_after_mutation(mut linac: Namespace) {
    linac.mutate("BL", "QUAD", "0", "K1", "+10%").unwrap();
    let reloaded = dsl::load(&render(&linac, "BL", &RenderConfig::default()).unwrap());
    assert_relative_eq!(
        reloaded.element("q1").unwrap().param("k1").unwrap().as_number().unwrap(),
        11.0,
        max_relative = 1e-12
    );
}

#[rstest]
fn test_malformed_and_cyclic_input() {
    let ns = dsl::load(
        "D0: DRIFT, L=1\nnot a statement\nA: LINE=(D0 B)\nB: LINE=(A)\nC: LINE=(D0)\n",
    );
    assert_eq!(ns.diagnostics().len(), 1);
    assert_eq!(ns.diagnostics()[0].kind, DiagnosticKind::Parse);
    assert_eq!(ns.diagnostics()[0].line, 2);

    match ns.expand("a", true) {
        Err(BeamlineError::CycleError { path, .. }) => assert_eq!(path, vec!["A", "B", "A"]),
        other => panic!("expected cycle error, got {:?}", other),
    }
    assert_eq!(ns.expand("c", true).unwrap(), vec!["d0"]);
    assert_eq!(validate_namespace(&ns).len(), 2);
}

#[rstest]
fn test_load_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(LINAC.as_bytes()).unwrap();

    let ns = dsl::load_file(file.path()).unwrap();
    assert_eq!(ns.len(), Namespace::from_source(LINAC).len());
    assert_eq!(ns.expand("BL", true).unwrap(), vec!["q", "d0", "q1", "q1", "d0"]);
}

#[rstest]
fn test_json_round_trip(linac: Namespace) {
    let doc = to_json(&linac).unwrap();
    let back = Namespace::from_json(&doc).unwrap();
    assert_eq!(to_json(&back).unwrap(), doc);
    assert_eq!(back.expand("linac", true).unwrap(), linac.expand("linac", true).unwrap());
}
