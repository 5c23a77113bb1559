mod common;

use serde_json::json;
use statecraft::error::LoadError;
use statecraft::model::EntityRef;
use statecraft::validate::{self, Severity};

#[test]
fn clean_model_has_no_error_findings() {
    let model = common::traffic_light();
    let findings = validate::validate(&model);
    assert!(
        findings.iter().all(|d| d.severity != Severity::Error),
        "unexpected errors: {findings:?}"
    );
}

#[test]
fn unreachable_state_is_an_error() {
    let model = common::load_json(&json!({
        "name": "unreachable",
        "states": [
            {"name": "A", "is_initial": true},
            {"name": "B", "is_final": true},
            {"name": "C", "is_final": true}
        ],
        "transitions": [{"source": "A", "target": "B", "event": "e"}],
        "comments": []
    }));
    let findings = validate::validate(&model);
    let about_c: Vec<_> = findings
        .iter()
        .filter(|d| d.severity == Severity::Error && d.message.contains("'C'"))
        .collect();
    assert_eq!(about_c.len(), 1);
    assert!(about_c[0].message.contains("unreachable"));
    assert_eq!(
        about_c[0].location,
        Some(EntityRef::State {
            scope: vec![],
            index: 2
        })
    );
}

#[test]
fn final_state_with_outgoing_is_flagged_twice() {
    let model = common::load_json(&json!({
        "name": "final_outgoing",
        "states": [
            {"name": "A", "is_initial": true},
            {"name": "F", "is_final": true}
        ],
        "transitions": [
            {"source": "A", "target": "F", "event": "e"},
            {"source": "F", "target": "A", "event": "g"}
        ],
        "comments": []
    }));
    let findings = validate::validate(&model);

    let on_state = findings.iter().any(|d| {
        d.is_error()
            && d.location
                == Some(EntityRef::State {
                    scope: vec![],
                    index: 1
                })
    });
    let on_transition = findings.iter().any(|d| {
        d.is_error()
            && d.location
                == Some(EntityRef::Transition {
                    scope: vec![],
                    index: 1
                })
    });
    assert!(on_state, "missing error on the final state: {findings:?}");
    assert!(on_transition, "missing error on the outgoing transition");
}

#[test]
fn empty_model_yields_a_single_error() {
    let model = common::load_json(&json!({
        "name": "empty",
        "states": [],
        "transitions": [],
        "comments": []
    }));
    let findings = validate::validate(&model);
    assert_eq!(findings.len(), 1);
    assert!(findings[0].is_error());
    assert!(findings[0].message.contains("empty model"));
}

#[test]
fn dead_end_state_is_an_error() {
    let model = common::load_json(&json!({
        "name": "dead_end",
        "states": [
            {"name": "A", "is_initial": true},
            {"name": "Stuck"}
        ],
        "transitions": [{"source": "A", "target": "Stuck", "event": "e"}],
        "comments": []
    }));
    let findings = validate::validate(&model);
    assert!(
        findings
            .iter()
            .any(|d| d.is_error() && d.message.contains("dead end"))
    );
}

#[test]
fn undeclared_variables_are_listed_per_expression() {
    let model = common::load_json(&json!({
        "name": "undeclared",
        "states": [
            {
                "name": "A",
                "is_initial": true,
                "during_action": "ghost = phantom + 1",
                "action_language": "Python (Generic Simulation)"
            }
        ],
        "transitions": [],
        "comments": [],
        "data_dictionary": {}
    }));
    let findings = validate::validate(&model);
    let finding = findings
        .iter()
        .find(|d| d.is_error() && d.message.contains("undeclared"))
        .expect("must flag undeclared identifiers");
    assert!(finding.message.contains("ghost"));
    assert!(finding.message.contains("phantom"));
}

#[test]
fn missing_initial_state_is_an_error() {
    let model = common::load_json(&json!({
        "name": "no_initial",
        "states": [{"name": "A", "is_final": true}],
        "transitions": [],
        "comments": []
    }));
    let findings = validate::validate(&model);
    assert!(
        findings
            .iter()
            .any(|d| d.is_error() && d.message.contains("no initial state"))
    );
}

#[test]
fn overlapping_transitions_warn() {
    let model = common::load_json(&json!({
        "name": "overlap",
        "states": [
            {"name": "A", "is_initial": true},
            {"name": "B", "is_final": true},
            {"name": "C", "is_final": true}
        ],
        "transitions": [
            {"source": "A", "target": "B", "event": "go"},
            {"source": "A", "target": "C", "event": "go"}
        ],
        "comments": []
    }));
    let findings = validate::validate(&model);
    let warning = findings
        .iter()
        .find(|d| d.severity == Severity::Warning)
        .expect("must warn about the overlap");
    assert!(warning.message.contains("overlapping"));
    assert!(warning.message.contains("go"));
}

#[test]
fn nested_scopes_are_validated_with_paths() {
    let model = common::load_json(&json!({
        "name": "nested",
        "states": [{
            "name": "Super",
            "is_initial": true,
            "is_superstate": true,
            "sub_fsm_data": {
                "states": [
                    {"name": "X", "is_initial": true, "is_final": true},
                    {"name": "Y", "is_final": true}
                ],
                "transitions": [],
                "comments": []
            }
        }],
        "transitions": [],
        "comments": []
    }));
    let findings = validate::validate(&model);
    // Y is unreachable inside the nested scope of state 0.
    let nested = findings
        .iter()
        .find(|d| {
            d.location
                == Some(EntityRef::State {
                    scope: vec![0],
                    index: 1
                })
        })
        .expect("nested findings must carry scope paths");
    assert!(nested.message.contains("unreachable"));
}

#[test]
fn load_rejects_structural_inconsistencies() {
    let duplicate = json!({
        "states": [
            {"name": "A", "is_initial": true},
            {"name": "A"}
        ],
        "transitions": [],
        "comments": []
    });
    assert!(matches!(
        statecraft::load(duplicate.to_string().as_bytes()),
        Err(LoadError::DuplicateState { .. })
    ));

    let dangling = json!({
        "states": [{"name": "A", "is_initial": true}],
        "transitions": [{"source": "A", "target": "Missing"}],
        "comments": []
    });
    assert!(matches!(
        statecraft::load(dangling.to_string().as_bytes()),
        Err(LoadError::UnresolvedTarget { .. })
    ));

    assert!(matches!(
        statecraft::load(b"not json at all"),
        Err(LoadError::Parse(_))
    ));

    let missing_name = json!({
        "states": [{"is_initial": true}],
        "transitions": [],
        "comments": []
    });
    let err = statecraft::load(missing_name.to_string().as_bytes()).unwrap_err();
    match err {
        LoadError::Schema(schema) => assert_eq!(schema.path, "$.states[0].name"),
        other => panic!("expected a schema error, got {other:?}"),
    }
}
