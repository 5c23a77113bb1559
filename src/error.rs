use serde::Serialize;
use thiserror::Error;

use crate::sim::ActionKind;

pub type StatecraftResult<T> = Result<T, StatecraftError>;

#[derive(Debug, Error)]
pub enum StatecraftError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    CodeGen(#[from] CodeGenError),
}

/// A structural violation of the published diagram schema.
///
/// `path` points at the offending node (e.g. `states[3].name`) so a host
/// editor can highlight it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("schema violation at {path}: {message}")]
pub struct SchemaError {
    pub path: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while turning raw diagram bytes into the IR.
///
/// Schema-valid input can still be structurally inconsistent (duplicate
/// state names, dangling transition endpoints); those are hard errors
/// here, never silently repaired.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("diagram is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("duplicate state name '{name}' in scope '{scope}'")]
    DuplicateState { scope: String, name: String },

    #[error("transition {index} in scope '{scope}': unknown source state '{name}'")]
    UnresolvedSource {
        scope: String,
        index: usize,
        name: String,
    },

    #[error("transition {index} in scope '{scope}': unknown target state '{name}'")]
    UnresolvedTarget {
        scope: String,
        index: usize,
        name: String,
    },
}

/// Errors raised by the sandboxed action-language evaluator.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum EvalError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{0}'")]
    Overflow(String),

    #[error("assignment is not allowed in a condition")]
    AssignmentInCondition,

    #[error("'{0}' is a read-only built-in")]
    ReadOnly(String),

    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("syntax error: {0}")]
    Syntax(String),
}

/// Fatal simulation failures. Guard-evaluation errors are *not* fatal and
/// never appear here; they surface as action-log entries instead.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum SimulationError {
    #[error("fatal error in {kind} action of '{site}': {source}")]
    FatalAction {
        kind: ActionKind,
        site: String,
        source: EvalError,
    },

    #[error("scope '{scope}' has no initial state")]
    NoInitialState { scope: String },
}

/// Errors aborting code generation for a target. No partial artifacts are
/// ever returned alongside one of these.
#[derive(Debug, Error)]
pub enum CodeGenError {
    #[error("cannot generate code: the model has no states")]
    EmptyModel,

    #[error("cannot generate code: the model has no initial state")]
    NoInitialState,

    #[error("unsupported target '{0}'")]
    UnsupportedTarget(String),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}
