//! Template-driven code generation.
//!
//! Every target pairs a pure context builder with a `minijinja` template
//! set; the engine itself is side-effect-free and artifacts only ever
//! materialize after the whole target rendered successfully. With a pinned
//! timestamp the output is byte-identical across runs.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use tracing::debug;

use crate::artifact::{Bundle, bundle};
use crate::config;
use crate::error::CodeGenError;
use crate::model::FsmModel;

pub mod sanitize;

mod context;
mod diagram;
mod pyemit;

/// The supported emission targets. String tags are stable host-facing
/// identifiers (`Target::from_str("vhdl")`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum Target {
    #[strum(serialize = "c-generic")]
    #[serde(rename = "c-generic")]
    CGeneric,

    #[strum(serialize = "c-state-table")]
    #[serde(rename = "c-state-table")]
    CStateTable,

    #[strum(serialize = "arduino")]
    #[serde(rename = "arduino")]
    Arduino,

    #[strum(serialize = "esp-idf")]
    #[serde(rename = "esp-idf")]
    EspIdf,

    #[strum(serialize = "pico-sdk")]
    #[serde(rename = "pico-sdk")]
    PicoSdk,

    #[strum(serialize = "stm32-hal")]
    #[serde(rename = "stm32-hal")]
    Stm32Hal,

    #[strum(serialize = "python")]
    #[serde(rename = "python")]
    Python,

    #[strum(serialize = "vhdl")]
    #[serde(rename = "vhdl")]
    Vhdl,

    #[strum(serialize = "verilog")]
    #[serde(rename = "verilog")]
    Verilog,

    #[strum(serialize = "plantuml")]
    #[serde(rename = "plantuml")]
    PlantUml,

    #[strum(serialize = "mermaid")]
    #[serde(rename = "mermaid")]
    Mermaid,
}

impl Target {
    /// Whether this target renders through the shared C pipeline.
    pub fn is_c_family(self) -> bool {
        matches!(
            self,
            Target::CGeneric
                | Target::CStateTable
                | Target::Arduino
                | Target::EspIdf
                | Target::PicoSdk
                | Target::Stm32Hal
        )
    }
}

/// Options shared by every target.
#[derive(Debug, Clone, Default)]
pub struct GenOptions {
    /// Pin the header timestamp for byte-identical output. `None` stamps
    /// the wall clock.
    pub pinned_timestamp: Option<DateTime<Utc>>,
    /// Also emit a self-contained testbench driver (C targets only).
    pub testbench: bool,
}

impl GenOptions {
    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.pinned_timestamp = Some(ts);
        self
    }

    pub fn with_testbench(mut self) -> Self {
        self.testbench = true;
        self
    }

    fn timestamp(&self) -> String {
        self.pinned_timestamp
            .unwrap_or_else(Utc::now)
            .format(config::TIMESTAMP_FORMAT)
            .to_string()
    }
}

/// Generates all artifacts of `target` for a model.
#[tracing::instrument(skip(model, options), fields(name = %model.name, %target))]
pub fn generate(
    model: &FsmModel,
    target: Target,
    options: &GenOptions,
) -> Result<Bundle, CodeGenError> {
    if model.states.is_empty() {
        return Err(CodeGenError::EmptyModel);
    }
    if model.initial_index().is_none() {
        return Err(CodeGenError::NoInitialState);
    }

    let timestamp = options.timestamp();
    let artifacts = match target {
        t if t.is_c_family() => context::render_c_family(model, t, options, &timestamp)?,
        Target::Python => context::render_python(model, &timestamp)?,
        Target::Vhdl | Target::Verilog => context::render_hdl(model, target, &timestamp)?,
        Target::PlantUml | Target::Mermaid => diagram::render(model, target, &timestamp)?,
        _ => unreachable!("every target is dispatched above"),
    };

    debug!(artifacts = artifacts.len(), "generation finished");
    Ok(bundle(artifacts))
}

/// Host-facing variant taking the free-form target tag. Unknown tags map
/// to [`CodeGenError::UnsupportedTarget`].
pub fn generate_for_tag(
    model: &FsmModel,
    tag: &str,
    options: &GenOptions,
) -> Result<Bundle, CodeGenError> {
    let target =
        Target::from_str(tag).map_err(|_| CodeGenError::UnsupportedTarget(tag.to_string()))?;
    generate(model, target, options)
}

/// One shared template environment. Templates are embedded so the crate
/// has no runtime file dependencies.
pub(crate) fn template_env() -> Result<Environment<'static>, CodeGenError> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    for (name, source) in [
        ("fsm.h", include_str!("codegen/templates/fsm_h.j2")),
        ("c_core", include_str!("codegen/templates/c_core.j2")),
        ("fsm.c", include_str!("codegen/templates/fsm_c.j2")),
        ("fsm_table.c", include_str!("codegen/templates/fsm_table_c.j2")),
        ("fsm.ino", include_str!("codegen/templates/fsm_arduino.j2")),
        ("fsm_espidf.c", include_str!("codegen/templates/fsm_espidf.j2")),
        ("fsm_pico.c", include_str!("codegen/templates/fsm_pico.j2")),
        ("fsm_stm32.c", include_str!("codegen/templates/fsm_stm32.j2")),
        ("testbench.c", include_str!("codegen/templates/testbench_c.j2")),
        ("fsm.py", include_str!("codegen/templates/fsm_py.j2")),
        ("fsm.vhd", include_str!("codegen/templates/fsm_vhd.j2")),
        ("fsm.v", include_str!("codegen/templates/fsm_v.j2")),
        ("diagram", include_str!("codegen/templates/diagram.j2")),
    ] {
        env.add_template(name, source)?;
    }
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_tags_round_trip() {
        use strum::IntoEnumIterator;
        for target in Target::iter() {
            let tag = target.to_string();
            assert_eq!(Target::from_str(&tag).unwrap(), target);
        }
    }

    #[test]
    fn unknown_tags_are_unsupported() {
        let model = FsmModel {
            name: "m".into(),
            states: vec![],
            transitions: vec![],
            comments: vec![],
            variables: vec![],
        };
        // Target parsing fails before the empty-model check fires.
        assert!(matches!(
            generate_for_tag(&model, "cobol", &GenOptions::default()),
            Err(CodeGenError::UnsupportedTarget(_))
        ));
    }

    #[test]
    fn empty_model_is_rejected_before_rendering() {
        let model = FsmModel {
            name: "m".into(),
            states: vec![],
            transitions: vec![],
            comments: vec![],
            variables: vec![],
        };
        assert!(matches!(
            generate(&model, Target::CGeneric, &GenOptions::default()),
            Err(CodeGenError::EmptyModel)
        ));
    }
}
