// === Public Modules (The Canonical Paths) ===
pub mod artifact;
pub mod codegen;
pub mod config;
pub mod error;
pub mod expr;
pub mod model;
pub mod sim;
pub mod validate;

// === Private Implementation Details ===
mod macros;

// === Facades (Re-exporting the host surface) ===
pub use crate::artifact::{Artifact, Bundle, bundle};
pub use crate::codegen::{GenOptions, Target, generate};
pub use crate::error::{StatecraftError, StatecraftResult};
pub use crate::model::{FsmModel, load};
pub use crate::sim::{Simulator, StepOutcome};
pub use crate::validate::{Diagnostic, Severity, validate};
