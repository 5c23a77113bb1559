/// Hard ceiling on expression nesting depth accepted by the parser.
pub static MAX_EXPRESSION_DEPTH: usize = 64;

/// Hard ceiling on AST-node visits per evaluated action or condition.
pub static MAX_EVAL_STEPS: usize = 10_000;

/// Dialect tag attached to actions when the diagram omits one.
pub static DEFAULT_ACTION_LANGUAGE: &str = "Python (Generic Simulation)";

/// Banner written into the header of every generated artifact.
pub static GENERATOR: &str = concat!("statecraft v", env!("CARGO_PKG_VERSION"));

/// Timestamp format used in generated-artifact headers.
pub static TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
