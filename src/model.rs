use std::fmt;
use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub mod schema;

mod lowering;

pub use lowering::load;

// ================================================================================================
// Variables & Values
// ================================================================================================

/// Declared type of a Data Dictionary entry. These are the only types the
/// action-language evaluator understands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum VarType {
    #[strum(serialize = "int")]
    #[serde(rename = "int")]
    Int,

    #[strum(serialize = "float")]
    #[serde(rename = "float")]
    Float,

    #[strum(serialize = "bool")]
    #[serde(rename = "bool")]
    Bool,

    #[strum(serialize = "string")]
    #[serde(rename = "string")]
    String,
}

/// A runtime value of the action language.
///
/// Variant order matters for the untagged deserializer: booleans before
/// integers before floats, so JSON `true` and `3` land on the right arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn var_type(&self) -> VarType {
        match self {
            Value::Bool(_) => VarType::Bool,
            Value::Int(_) => VarType::Int,
            Value::Float(_) => VarType::Float,
            Value::Str(_) => VarType::String,
        }
    }

    /// Default value for a declared type, used when re-initializing.
    pub fn zero(ty: VarType) -> Self {
        match ty {
            VarType::Int => Value::Int(0),
            VarType::Float => Value::Float(0.0),
            VarType::Bool => Value::Bool(false),
            VarType::String => Value::Str(String::new()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

/// A Data Dictionary entry: the only identifiers visible to the evaluator
/// besides the built-ins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub ty: VarType,
    pub initial: Value,
}

// ================================================================================================
// Diagram Entities
// ================================================================================================

/// Cosmetic attributes of a state. Carried verbatim, semantically inert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Visual {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: Option<String>,
    pub shape: Option<String>,
}

/// Cosmetic attributes of a transition curve. Semantically inert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionVisual {
    pub control_offset_x: f64,
    pub control_offset_y: f64,
    pub color: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// Unique within the containing scope.
    pub name: String,
    pub is_initial: bool,
    pub is_final: bool,
    pub entry_action: String,
    pub during_action: String,
    pub exit_action: String,
    pub action_language: String,
    pub is_superstate: bool,
    /// Nested machine when `is_superstate` holds. `Arc` so sub-simulators
    /// can share the nested model without back-pointers.
    pub sub_fsm: Option<Arc<FsmModel>>,
    pub visual: Visual,
}

impl State {
    /// True when this state carries a nested machine with at least one state.
    pub fn has_sub_machine(&self) -> bool {
        self.sub_fsm.as_ref().is_some_and(|m| !m.states.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub source: String,
    pub target: String,
    /// Empty string marks an anonymous transition, eligible on any step.
    pub event: String,
    /// Guard expression; empty means always true.
    pub condition: String,
    /// Expression evaluated when the transition fires.
    pub action: String,
    pub action_language: String,
    /// Resolved endpoint indices, attached by lowering.
    pub source_index: usize,
    pub target_index: usize,
    pub visual: TransitionVisual,
}

impl Transition {
    pub fn is_anonymous(&self) -> bool {
        self.event.is_empty()
    }

    /// Whether this transition is eligible for the supplied event.
    /// Anonymous transitions match anything, including a plain tick.
    pub fn matches_event(&self, event: Option<&str>) -> bool {
        self.is_anonymous() || event == Some(self.event.as_str())
    }

    /// Human-readable form used in diagnostics and log entries.
    pub fn describe(&self) -> String {
        if self.is_anonymous() {
            format!("{} --> {}", self.source, self.target)
        } else {
            format!("{} --{}--> {}", self.source, self.event, self.target)
        }
    }
}

/// Free-text annotation on the canvas. Semantically inert; diagram targets
/// render it as a note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
}

// ================================================================================================
// The Root IR Entity
// ================================================================================================

/// In-memory representation of one FSM scope. Immutable after construction;
/// share it via `Arc` across validators, simulators and code generators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsmModel {
    pub name: String,
    pub states: Vec<State>,
    pub transitions: Vec<Transition>,
    pub comments: Vec<Comment>,
    /// Data Dictionary, sorted by name at lowering time.
    pub variables: Vec<Variable>,
}

impl FsmModel {
    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s.name == name)
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn initial_index(&self) -> Option<usize> {
        self.states.iter().position(|s| s.is_initial)
    }

    pub fn initial_state(&self) -> Option<&State> {
        self.initial_index().map(|i| &self.states[i])
    }

    /// Outgoing transitions of the state at `index`, in declaration order.
    pub fn outgoing(&self, index: usize) -> impl Iterator<Item = (usize, &Transition)> {
        self.transitions
            .iter()
            .enumerate()
            .filter(move |(_, t)| t.source_index == index)
    }

    /// Sorted, deduplicated non-empty event names of this scope.
    pub fn events(&self) -> Vec<String> {
        self.transitions
            .iter()
            .filter(|t| !t.event.is_empty())
            .map(|t| t.event.clone())
            .sorted()
            .dedup()
            .collect()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

// ================================================================================================
// Entity Handles
// ================================================================================================

/// Stable back-reference from a diagnostic or log entry into the IR.
///
/// `scope` is the chain of superstate indices from the root model down to
/// the scope containing the entity; an empty chain means the root scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityRef {
    Model { scope: Vec<usize> },
    State { scope: Vec<usize>, index: usize },
    Transition { scope: Vec<usize>, index: usize },
    Variable { name: String },
}
