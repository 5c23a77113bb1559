//! The published diagram schema.
//!
//! `validate_schema` walks a raw `serde_json::Value` and reports the first
//! structural violation with an instance path (`states[3].name`). Once the
//! walk succeeds, deserialization into the raw structs below is total.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value as Json};

use crate::config;
use crate::error::SchemaError;
use crate::model::VarType;

// ================================================================================================
// Raw (wire) structs
// ================================================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RawDiagram {
    #[serde(default)]
    pub name: Option<String>,
    pub states: Vec<RawState>,
    pub transitions: Vec<RawTransition>,
    #[serde(default)]
    pub comments: Vec<RawComment>,
    /// Keyed map on the wire; a `BTreeMap` keeps lowering deterministic.
    #[serde(default)]
    pub data_dictionary: BTreeMap<String, RawVariable>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawState {
    pub name: String,
    #[serde(default)]
    pub is_initial: bool,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub entry_action: String,
    #[serde(default)]
    pub during_action: String,
    #[serde(default)]
    pub exit_action: String,
    #[serde(default = "default_action_language")]
    pub action_language: String,
    #[serde(default)]
    pub is_superstate: bool,
    #[serde(default)]
    pub sub_fsm_data: Option<Box<RawDiagram>>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_state_width")]
    pub width: f64,
    #[serde(default = "default_state_height")]
    pub height: f64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub shape: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransition {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub action: String,
    #[serde(default = "default_action_language")]
    pub action_language: String,
    #[serde(default)]
    pub control_offset_x: f64,
    #[serde(default)]
    pub control_offset_y: f64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    pub text: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_comment_width")]
    pub width: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawVariable {
    #[serde(rename = "type")]
    pub ty: String,
    pub initial_value: Json,
}

fn default_action_language() -> String {
    config::DEFAULT_ACTION_LANGUAGE.to_string()
}

fn default_state_width() -> f64 {
    120.0
}

fn default_state_height() -> f64 {
    60.0
}

fn default_comment_width() -> f64 {
    150.0
}

// ================================================================================================
// Structural validation
// ================================================================================================

/// Checks a raw diagram value against the published schema.
///
/// Fails fast with the path of the first offending node. Unknown keys are
/// permitted everywhere (hosts attach `frames`, `displays` and other inert
/// payloads).
pub fn validate_schema(raw: &Json) -> Result<(), SchemaError> {
    check_machine(raw, "$")
}

fn check_machine(value: &Json, path: &str) -> Result<(), SchemaError> {
    let obj = as_object(value, path)?;

    if let Some(name) = obj.get("name") {
        require_string(name, &format!("{path}.name"))?;
    }

    let states = require_array(obj, "states", path)?;
    for (i, state) in states.iter().enumerate() {
        check_state(state, &format!("{path}.states[{i}]"))?;
    }

    let transitions = require_array(obj, "transitions", path)?;
    for (i, transition) in transitions.iter().enumerate() {
        check_transition(transition, &format!("{path}.transitions[{i}]"))?;
    }

    let comments = require_array(obj, "comments", path)?;
    for (i, comment) in comments.iter().enumerate() {
        check_comment(comment, &format!("{path}.comments[{i}]"))?;
    }

    if let Some(dict) = obj.get("data_dictionary") {
        let entries = as_object(dict, &format!("{path}.data_dictionary"))?;
        for (name, entry) in entries {
            check_variable(name, entry, &format!("{path}.data_dictionary.{name}"))?;
        }
    }

    Ok(())
}

fn check_state(value: &Json, path: &str) -> Result<(), SchemaError> {
    let obj = as_object(value, path)?;

    let name = require_key(obj, "name", path)?;
    let name = require_string(name, &format!("{path}.name"))?;
    if name.is_empty() {
        return Err(SchemaError::new(
            format!("{path}.name"),
            "state name must be non-empty",
        ));
    }

    for key in ["is_initial", "is_final", "is_superstate"] {
        if let Some(v) = obj.get(key) {
            require_bool(v, &format!("{path}.{key}"))?;
        }
    }
    for key in [
        "entry_action",
        "during_action",
        "exit_action",
        "action_language",
        "color",
        "shape",
    ] {
        if let Some(v) = obj.get(key)
            && !v.is_null()
        {
            require_string(v, &format!("{path}.{key}"))?;
        }
    }
    for key in ["x", "y", "width", "height"] {
        if let Some(v) = obj.get(key) {
            require_number(v, &format!("{path}.{key}"))?;
        }
    }

    if let Some(sub) = obj.get("sub_fsm_data")
        && !sub.is_null()
    {
        check_machine(sub, &format!("{path}.sub_fsm_data"))?;
    }

    Ok(())
}

fn check_transition(value: &Json, path: &str) -> Result<(), SchemaError> {
    let obj = as_object(value, path)?;

    for key in ["source", "target"] {
        let v = require_key(obj, key, path)?;
        let s = require_string(v, &format!("{path}.{key}"))?;
        if s.is_empty() {
            return Err(SchemaError::new(
                format!("{path}.{key}"),
                format!("transition {key} must be non-empty"),
            ));
        }
    }
    for key in ["event", "condition", "action", "action_language", "color", "description"] {
        if let Some(v) = obj.get(key)
            && !v.is_null()
        {
            require_string(v, &format!("{path}.{key}"))?;
        }
    }
    for key in ["control_offset_x", "control_offset_y"] {
        if let Some(v) = obj.get(key) {
            require_number(v, &format!("{path}.{key}"))?;
        }
    }

    Ok(())
}

fn check_comment(value: &Json, path: &str) -> Result<(), SchemaError> {
    let obj = as_object(value, path)?;
    let text = require_key(obj, "text", path)?;
    require_string(text, &format!("{path}.text"))?;
    for key in ["x", "y", "width"] {
        if let Some(v) = obj.get(key) {
            require_number(v, &format!("{path}.{key}"))?;
        }
    }
    Ok(())
}

fn check_variable(name: &str, value: &Json, path: &str) -> Result<(), SchemaError> {
    if !is_identifier(name) {
        return Err(SchemaError::new(
            path,
            format!("variable name '{name}' is not a valid identifier"),
        ));
    }

    let obj = as_object(value, path)?;

    let ty = require_key(obj, "type", path)?;
    let ty = require_string(ty, &format!("{path}.type"))?;
    let ty = VarType::from_str(ty).map_err(|_| {
        SchemaError::new(
            format!("{path}.type"),
            format!("unknown variable type '{ty}' (expected int, float, bool or string)"),
        )
    })?;

    let initial = require_key(obj, "initial_value", path)?;
    let matches = match ty {
        VarType::Int => initial.is_i64() || initial.is_u64(),
        // An integer initial is acceptable for a float variable; lowering widens it.
        VarType::Float => initial.is_number(),
        VarType::Bool => initial.is_boolean(),
        VarType::String => initial.is_string(),
    };
    if !matches {
        return Err(SchemaError::new(
            format!("{path}.initial_value"),
            format!("initial value {initial} does not match declared type '{ty}'"),
        ));
    }

    Ok(())
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ================================================================================================
// Walk helpers
// ================================================================================================

fn as_object<'a>(value: &'a Json, path: &str) -> Result<&'a Map<String, Json>, SchemaError> {
    value
        .as_object()
        .ok_or_else(|| SchemaError::new(path, "expected an object"))
}

fn require_key<'a>(
    obj: &'a Map<String, Json>,
    key: &str,
    path: &str,
) -> Result<&'a Json, SchemaError> {
    obj.get(key)
        .ok_or_else(|| SchemaError::new(format!("{path}.{key}"), "required field is missing"))
}

fn require_array<'a>(
    obj: &'a Map<String, Json>,
    key: &str,
    path: &str,
) -> Result<&'a Vec<Json>, SchemaError> {
    let v = require_key(obj, key, path)?;
    v.as_array()
        .ok_or_else(|| SchemaError::new(format!("{path}.{key}"), "expected an array"))
}

fn require_string<'a>(value: &'a Json, path: &str) -> Result<&'a str, SchemaError> {
    value
        .as_str()
        .ok_or_else(|| SchemaError::new(path, "expected a string"))
}

fn require_bool(value: &Json, path: &str) -> Result<bool, SchemaError> {
    value
        .as_bool()
        .ok_or_else(|| SchemaError::new(path, "expected a boolean"))
}

fn require_number(value: &Json, path: &str) -> Result<f64, SchemaError> {
    value
        .as_f64()
        .ok_or_else(|| SchemaError::new(path, "expected a number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_state_name_reports_its_path() {
        let raw = json!({
            "states": [
                {"name": "A", "is_initial": true},
                {"is_final": true},
            ],
            "transitions": [],
            "comments": [],
        });
        let err = validate_schema(&raw).unwrap_err();
        assert_eq!(err.path, "$.states[1].name");
    }

    #[test]
    fn wrong_endpoint_type_reports_its_path() {
        let raw = json!({
            "states": [{"name": "A", "is_initial": true}],
            "transitions": [{"source": "A", "target": 7}],
            "comments": [],
        });
        let err = validate_schema(&raw).unwrap_err();
        assert_eq!(err.path, "$.transitions[0].target");
    }

    #[test]
    fn dictionary_initial_must_match_declared_type() {
        let raw = json!({
            "states": [{"name": "A", "is_initial": true}],
            "transitions": [],
            "comments": [],
            "data_dictionary": {"timer": {"type": "int", "initial_value": "zero"}},
        });
        let err = validate_schema(&raw).unwrap_err();
        assert_eq!(err.path, "$.data_dictionary.timer.initial_value");

        let raw = json!({
            "states": [{"name": "A", "is_initial": true}],
            "transitions": [],
            "comments": [],
            "data_dictionary": {"ratio": {"type": "float", "initial_value": 1}},
        });
        assert!(validate_schema(&raw).is_ok());
    }

    #[test]
    fn nested_machines_are_checked_recursively() {
        let raw = json!({
            "states": [{
                "name": "Outer",
                "is_initial": true,
                "is_superstate": true,
                "sub_fsm_data": {
                    "states": [{"name": ""}],
                    "transitions": [],
                    "comments": [],
                },
            }],
            "transitions": [],
            "comments": [],
        });
        let err = validate_schema(&raw).unwrap_err();
        assert_eq!(err.path, "$.states[0].sub_fsm_data.states[0].name");
    }

    #[test]
    fn unknown_top_level_keys_are_inert() {
        let raw = json!({
            "states": [{"name": "A", "is_initial": true}],
            "transitions": [],
            "comments": [],
            "frames": [{"anything": true}],
            "displays": {"dock": "left"},
        });
        assert!(validate_schema(&raw).is_ok());
    }
}
