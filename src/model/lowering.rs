//! Lowering from the raw wire structs into the IR.
//!
//! Endpoint names are resolved to state indices here; duplicate names and
//! dangling endpoints are hard errors. Cosmetic fields receive their
//! documented defaults from the raw structs, never invented here.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value as Json;
use tracing::debug;

use crate::error::LoadError;
use crate::model::schema::{self, RawDiagram, RawVariable};
use crate::model::{
    Comment, FsmModel, State, Transition, TransitionVisual, Value, VarType, Variable, Visual,
};

/// Parses, schema-validates and lowers a UTF-8 JSON diagram.
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub fn load(bytes: &[u8]) -> Result<FsmModel, LoadError> {
    let raw: Json = serde_json::from_slice(bytes)?;
    schema::validate_schema(&raw)?;
    let diagram: RawDiagram = serde_json::from_value(raw)?;

    let name = diagram.name.clone().unwrap_or_else(|| "fsm".to_string());
    let model = lower(diagram, &name)?;
    debug!(
        states = model.states.len(),
        transitions = model.transitions.len(),
        variables = model.variables.len(),
        "diagram lowered"
    );
    Ok(model)
}

fn lower(raw: RawDiagram, scope: &str) -> Result<FsmModel, LoadError> {
    let mut seen = BTreeSet::new();
    for state in &raw.states {
        if !seen.insert(state.name.clone()) {
            return Err(LoadError::DuplicateState {
                scope: scope.to_string(),
                name: state.name.clone(),
            });
        }
    }

    let mut states = Vec::with_capacity(raw.states.len());
    for s in raw.states {
        let sub_fsm = match s.sub_fsm_data {
            Some(sub) => {
                let sub_name = sub
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("{}.{}", scope, s.name));
                Some(Arc::new(lower(*sub, &sub_name)?))
            }
            None => None,
        };
        states.push(State {
            name: s.name,
            is_initial: s.is_initial,
            is_final: s.is_final,
            entry_action: s.entry_action,
            during_action: s.during_action,
            exit_action: s.exit_action,
            action_language: s.action_language,
            is_superstate: s.is_superstate || sub_fsm.is_some(),
            sub_fsm,
            visual: Visual {
                x: s.x,
                y: s.y,
                width: s.width,
                height: s.height,
                color: s.color,
                shape: s.shape,
            },
        });
    }

    let mut transitions = Vec::with_capacity(raw.transitions.len());
    for (index, t) in raw.transitions.into_iter().enumerate() {
        let source_index = states.iter().position(|s| s.name == t.source).ok_or_else(|| {
            LoadError::UnresolvedSource {
                scope: scope.to_string(),
                index,
                name: t.source.clone(),
            }
        })?;
        let target_index = states.iter().position(|s| s.name == t.target).ok_or_else(|| {
            LoadError::UnresolvedTarget {
                scope: scope.to_string(),
                index,
                name: t.target.clone(),
            }
        })?;
        transitions.push(Transition {
            source: t.source,
            target: t.target,
            event: t.event,
            condition: t.condition,
            action: t.action,
            action_language: t.action_language,
            source_index,
            target_index,
            visual: TransitionVisual {
                control_offset_x: t.control_offset_x,
                control_offset_y: t.control_offset_y,
                color: t.color,
                description: t.description,
            },
        });
    }

    let comments = raw
        .comments
        .into_iter()
        .map(|c| Comment {
            text: c.text,
            x: c.x,
            y: c.y,
            width: c.width,
        })
        .collect();

    // BTreeMap iteration keeps the dictionary sorted by name.
    let variables = raw
        .data_dictionary
        .into_iter()
        .map(|(name, v)| lower_variable(name, v))
        .collect();

    Ok(FsmModel {
        name: scope.to_string(),
        states,
        transitions,
        comments,
        variables,
    })
}

/// Total for schema-valid input: the type tag and initial/type agreement
/// were already enforced by `validate_schema`.
fn lower_variable(name: String, raw: RawVariable) -> Variable {
    let ty: VarType = raw.ty.parse().unwrap_or(VarType::Int);
    let initial = match (ty, &raw.initial_value) {
        (VarType::Int, Json::Number(n)) => Value::Int(n.as_i64().unwrap_or_default()),
        (VarType::Float, Json::Number(n)) => Value::Float(n.as_f64().unwrap_or_default()),
        (VarType::Bool, Json::Bool(b)) => Value::Bool(*b),
        (VarType::String, Json::String(s)) => Value::Str(s.clone()),
        _ => Value::zero(ty),
    };
    Variable { name, ty, initial }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes(v: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&v).unwrap()
    }

    #[test]
    fn endpoints_resolve_to_declaration_indices() {
        let model = load(&bytes(json!({
            "name": "demo",
            "states": [
                {"name": "A", "is_initial": true},
                {"name": "B"},
            ],
            "transitions": [{"source": "A", "target": "B", "event": "go"}],
            "comments": [],
        })))
        .unwrap();
        assert_eq!(model.transitions[0].source_index, 0);
        assert_eq!(model.transitions[0].target_index, 1);
        assert_eq!(model.initial_index(), Some(0));
    }

    #[test]
    fn duplicate_state_names_are_hard_errors() {
        let err = load(&bytes(json!({
            "states": [
                {"name": "A", "is_initial": true},
                {"name": "A"},
            ],
            "transitions": [],
            "comments": [],
        })))
        .unwrap_err();
        assert!(matches!(err, LoadError::DuplicateState { name, .. } if name == "A"));
    }

    #[test]
    fn dangling_target_is_a_hard_error() {
        let err = load(&bytes(json!({
            "states": [{"name": "A", "is_initial": true}],
            "transitions": [{"source": "A", "target": "Ghost"}],
            "comments": [],
        })))
        .unwrap_err();
        assert!(matches!(err, LoadError::UnresolvedTarget { name, .. } if name == "Ghost"));
    }

    #[test]
    fn dictionary_is_sorted_and_widened() {
        let model = load(&bytes(json!({
            "states": [{"name": "A", "is_initial": true}],
            "transitions": [],
            "comments": [],
            "data_dictionary": {
                "zeta": {"type": "float", "initial_value": 2},
                "alpha": {"type": "int", "initial_value": 7},
            },
        })))
        .unwrap();
        let names: Vec<_> = model.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert_eq!(model.variables[1].initial, Value::Float(2.0));
    }

    #[test]
    fn nested_machines_lower_recursively() {
        let model = load(&bytes(json!({
            "name": "outer",
            "states": [{
                "name": "Super",
                "is_initial": true,
                "is_superstate": true,
                "sub_fsm_data": {
                    "states": [{"name": "Inner", "is_initial": true}],
                    "transitions": [],
                    "comments": [],
                },
            }],
            "transitions": [],
            "comments": [],
        })))
        .unwrap();
        let sub = model.states[0].sub_fsm.as_ref().unwrap();
        assert_eq!(sub.states[0].name, "Inner");
        assert!(model.states[0].has_sub_machine());
    }
}
