//! Pure context builders: one immutable, serializable render record per
//! target family. Nothing here touches the template engine state; the
//! records go straight into `minijinja`.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::artifact::Artifact;
use crate::codegen::sanitize::{Flavor, NameTable, sanitize};
use crate::codegen::{GenOptions, Target, pyemit, template_env};
use crate::config;
use crate::error::CodeGenError;
use crate::expr::{self, scan_condition};
use crate::model::{FsmModel, Value, VarType};

// ================================================================================================
// C Family
// ================================================================================================

#[derive(Debug, Clone, Default, Serialize)]
struct CAction {
    present: bool,
    lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct CTransitionRow {
    index: usize,
    source_enum: String,
    target_enum: String,
    target_name: String,
    target_original: String,
    target_is_final: bool,
    target_has_entry: bool,
    target_has_during: bool,
    event: String,
    /// `EVENT_NONE` marks an anonymous transition (wildcard row).
    event_enum: String,
    anonymous: bool,
    /// C guard expression; `1` when the guard is empty or foreign.
    guard: String,
    /// Original guard text when it could not be emitted natively.
    guard_comment: String,
    /// Function-pointer spellings for the state-table target (`NULL` when
    /// there is nothing to call).
    guard_fn: String,
    action_fn: String,
    action: CAction,
}

#[derive(Debug, Clone, Serialize)]
struct CState {
    name: String,
    original: String,
    enum_name: String,
    is_initial: bool,
    is_final: bool,
    entry: CAction,
    during: CAction,
    exit: CAction,
    transitions: Vec<CTransitionRow>,
    /// Module name of the nested machine's own artifact pair, if any.
    sub_module: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct CEvent {
    name: String,
    enum_name: String,
}

#[derive(Debug, Clone, Serialize)]
struct CVar {
    name: String,
    original: String,
    c_type: &'static str,
    initial: String,
}

#[derive(Debug, Serialize)]
struct CCtx {
    generator: &'static str,
    timestamp: String,
    fsm_name: String,
    fsm_name_original: String,
    h_guard: String,
    /// Rendered through the state-table templates instead of the switch.
    table: bool,
    initial_state_enum: String,
    states: Vec<CState>,
    transitions: Vec<CTransitionRow>,
    events: Vec<CEvent>,
    variables: Vec<CVar>,
}

/// Whether action text can be pasted into a C body as-is.
fn c_native(language: &str) -> bool {
    expr::is_generic_dialect(language) || language.trim_start().starts_with('C')
}

fn c_action(text: &str, language: &str) -> CAction {
    if text.is_empty() {
        return CAction::default();
    }
    let lines = if c_native(language) {
        text.split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("{s};"))
            .collect()
    } else {
        vec![format!(
            "/* ({}) {} */",
            language,
            text.replace('\n', " ").trim()
        )]
    };
    CAction {
        present: !lines.is_empty(),
        lines,
    }
}

fn c_guard(condition: &str, language: &str) -> (String, String) {
    if condition.is_empty() {
        ("1".to_string(), String::new())
    } else if c_native(language) {
        (condition.to_string(), String::new())
    } else {
        ("1".to_string(), condition.to_string())
    }
}

fn c_type(ty: VarType) -> &'static str {
    match ty {
        VarType::Int => "int",
        VarType::Float => "double",
        VarType::Bool => "bool",
        VarType::String => "const char *",
    }
}

fn c_value(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Float(x) => format!("{x:?}"),
        Value::Bool(b) => b.to_string(),
        Value::Str(s) => format!(
            "\"{}\"",
            s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
        ),
    }
}

fn build_c_ctx(model: &FsmModel, module: &str, target: Target, timestamp: &str) -> CCtx {
    let mut state_names = NameTable::new(Flavor::C);
    for reserved in ["s_state", "s_halted", "event", module] {
        state_names.reserve(reserved);
    }
    let mut state_enums = NameTable::new(Flavor::C);
    let mut event_enums = NameTable::new(Flavor::C);
    event_enums.reserve("NONE");
    let mut var_names = NameTable::new(Flavor::C);
    for reserved in ["s_state", "s_halted", "event"] {
        var_names.reserve(reserved);
    }

    // Assign every name up front, in declaration order, so collision
    // suffixes are stable.
    let mut names = Vec::new();
    let mut enums = Vec::new();
    for state in &model.states {
        names.push(state_names.assign(&state.name));
        enums.push(format!("STATE_{}", state_enums.assign(&state.name.to_uppercase())));
    }

    let events: Vec<CEvent> = model
        .events()
        .into_iter()
        .map(|name| {
            let enum_name = format!("EVENT_{}", event_enums.assign(&name.to_uppercase()));
            CEvent { name, enum_name }
        })
        .collect();
    let event_enum_of: BTreeMap<&str, &str> = events
        .iter()
        .map(|e| (e.name.as_str(), e.enum_name.as_str()))
        .collect();

    let variables: Vec<CVar> = model
        .variables
        .iter()
        .map(|v| CVar {
            name: var_names.assign(&v.name),
            original: v.name.clone(),
            c_type: c_type(v.ty),
            initial: c_value(&v.initial),
        })
        .collect();

    let transitions: Vec<CTransitionRow> = model
        .transitions
        .iter()
        .enumerate()
        .map(|(index, t)| {
            let (guard, guard_comment) = c_guard(&t.condition, &t.action_language);
            let action = c_action(&t.action, &t.action_language);
            let target_state = &model.states[t.target_index];
            let guard_fn = if guard == "1" && guard_comment.is_empty() {
                "NULL".to_string()
            } else {
                format!("t{index}_guard")
            };
            let action_fn = if action.present {
                format!("t{index}_action")
            } else {
                "NULL".to_string()
            };
            CTransitionRow {
                index,
                source_enum: enums[t.source_index].clone(),
                target_enum: enums[t.target_index].clone(),
                target_name: names[t.target_index].clone(),
                target_original: target_state.name.clone(),
                target_is_final: target_state.is_final,
                target_has_entry: c_action(&target_state.entry_action, &target_state.action_language)
                    .present,
                target_has_during: c_action(&target_state.during_action, &target_state.action_language)
                    .present,
                event: t.event.clone(),
                event_enum: event_enum_of
                    .get(t.event.as_str())
                    .map_or("EVENT_NONE", |e| e)
                    .to_string(),
                anonymous: t.is_anonymous(),
                guard,
                guard_comment,
                guard_fn,
                action_fn,
                action,
            }
        })
        .collect();

    let states: Vec<CState> = model
        .states
        .iter()
        .enumerate()
        .map(|(i, state)| CState {
            name: names[i].clone(),
            original: state.name.clone(),
            enum_name: enums[i].clone(),
            is_initial: state.is_initial,
            is_final: state.is_final,
            entry: c_action(&state.entry_action, &state.action_language),
            during: c_action(&state.during_action, &state.action_language),
            exit: c_action(&state.exit_action, &state.action_language),
            transitions: transitions
                .iter()
                .filter(|row| model.transitions[row.index].source_index == i)
                .cloned()
                .collect(),
            sub_module: state
                .has_sub_machine()
                .then(|| format!("{module}_{}", sanitize(&state.name, Flavor::C))),
        })
        .collect();

    let initial = model.initial_index().unwrap_or_default();

    CCtx {
        generator: config::GENERATOR,
        timestamp: timestamp.to_string(),
        fsm_name: module.to_string(),
        fsm_name_original: model.name.clone(),
        h_guard: format!("FSM_{}_H", module.to_uppercase()),
        table: target == Target::CStateTable,
        initial_state_enum: enums[initial].clone(),
        states,
        transitions,
        events,
        variables,
    }
}

pub(crate) fn render_c_family(
    model: &FsmModel,
    target: Target,
    options: &GenOptions,
    timestamp: &str,
) -> Result<Vec<Artifact>, CodeGenError> {
    let env = template_env()?;
    let mut artifacts = Vec::new();
    let module = sanitize(&model.name, Flavor::C);
    render_c_scope(
        &env,
        model,
        &module,
        target,
        options.testbench,
        timestamp,
        &mut artifacts,
    )?;
    Ok(artifacts)
}

fn render_c_scope(
    env: &minijinja::Environment<'_>,
    model: &FsmModel,
    module: &str,
    target: Target,
    testbench: bool,
    timestamp: &str,
    out: &mut Vec<Artifact>,
) -> Result<(), CodeGenError> {
    if model.initial_index().is_none() {
        return Err(CodeGenError::NoInitialState);
    }

    let ctx = build_c_ctx(model, module, target, timestamp);

    let header = env.get_template("fsm.h")?.render(&ctx)?;
    let (source_template, source_ext) = match target {
        Target::CStateTable => ("fsm_table.c", ".c"),
        Target::Arduino => ("fsm.ino", ".ino"),
        Target::EspIdf => ("fsm_espidf.c", ".c"),
        Target::PicoSdk => ("fsm_pico.c", ".c"),
        Target::Stm32Hal => ("fsm_stm32.c", ".c"),
        _ => ("fsm.c", ".c"),
    };
    let source = env.get_template(source_template)?.render(&ctx)?;

    out.push(Artifact::new(module, header, ".h", target));
    out.push(Artifact::new(module, source, source_ext, target));

    if testbench && matches!(target, Target::CGeneric | Target::CStateTable) {
        let content = env.get_template("testbench.c")?.render(&ctx)?;
        out.push(Artifact::new(
            format!("{module}_testbench"),
            content,
            ".c",
            target,
        ));
    }

    // Each nested machine becomes its own module pair; the parent refers
    // to it by name in a comment.
    for state in &model.states {
        if let Some(sub) = &state.sub_fsm
            && state.has_sub_machine()
        {
            let sub_module = format!("{module}_{}", sanitize(&state.name, Flavor::C));
            render_c_scope(env, sub, &sub_module, target, false, timestamp, out)?;
        }
    }

    Ok(())
}

// ================================================================================================
// Python
// ================================================================================================

#[derive(Debug, Clone, Default, Serialize)]
struct PyAction {
    present: bool,
    lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct PyTransition {
    /// Full `if` test, e.g. `event == "tick" and (self.timer >= 5)`.
    test: String,
    /// Comment line emitted above the `if` when the guard is foreign.
    guard_note: Option<String>,
    target_original: String,
    target_method: String,
    target_is_final: bool,
    target_has_entry: bool,
    target_has_during: bool,
    action: PyAction,
}

#[derive(Debug, Clone, Serialize)]
struct PyState {
    original: String,
    method: String,
    is_final: bool,
    entry: PyAction,
    during: PyAction,
    exit: PyAction,
    transitions: Vec<PyTransition>,
}

#[derive(Debug, Clone, Serialize)]
struct PyVar {
    name: String,
    original: String,
    initial: String,
}

#[derive(Debug, Clone, Serialize)]
struct PyClass {
    class_name: String,
    scope_note: Option<String>,
    initial: String,
    states: Vec<PyState>,
    variables: Vec<PyVar>,
}

#[derive(Debug, Serialize)]
struct PyCtx {
    generator: &'static str,
    timestamp: String,
    fsm_name_original: String,
    classes: Vec<PyClass>,
}

fn py_class_name(name: &str) -> String {
    let base = sanitize(name, Flavor::Python);
    // Class-case the sanitized spelling: `traffic light` -> `Traffic_light`.
    let mut chars = base.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => base,
    }
}

fn py_value(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Float(x) => format!("{x:?}"),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Str(s) => pyemit::py_str(s),
    }
}

fn py_action(text: &str, language: &str, declared: &BTreeSet<String>) -> PyAction {
    if text.is_empty() {
        return PyAction::default();
    }
    let lines = if expr::is_generic_dialect(language) {
        match pyemit::action_to_python(text, declared) {
            Ok(lines) => lines,
            Err(_) => vec![format!("# unparsable action: {}", text.replace('\n', " "))],
        }
    } else if language.trim_start().starts_with("Python") {
        text.lines().map(|l| l.trim_end().to_string()).collect()
    } else {
        vec![format!("# ({}) {}", language, text.replace('\n', " "))]
    };
    PyAction {
        present: !lines.is_empty(),
        lines,
    }
}

fn build_py_classes(
    model: &FsmModel,
    class_name: &str,
    out: &mut Vec<PyClass>,
) -> Result<(), CodeGenError> {
    let Some(initial) = model.initial_index() else {
        return Err(CodeGenError::NoInitialState);
    };
    let declared: BTreeSet<String> = model.variables.iter().map(|v| v.name.clone()).collect();

    let mut methods = NameTable::new(Flavor::Python);
    let mut var_names = NameTable::new(Flavor::Python);
    for reserved in ["state", "tick_count", "halted", "event"] {
        var_names.reserve(reserved);
    }

    let method_names: Vec<String> = model
        .states
        .iter()
        .map(|s| methods.assign(&s.name.to_lowercase()))
        .collect();

    let states: Vec<PyState> = model
        .states
        .iter()
        .enumerate()
        .map(|(i, state)| {
            let transitions = model
                .outgoing(i)
                .map(|(_, t)| {
                    let target = &model.states[t.target_index];
                    let mut parts = Vec::new();
                    if !t.is_anonymous() {
                        parts.push(format!("event == {}", pyemit::py_str(&t.event)));
                    }
                    let mut guard_note = None;
                    if !t.condition.is_empty() {
                        if expr::is_generic_dialect(&t.action_language) {
                            match pyemit::condition_to_python(&t.condition, &declared) {
                                Ok(expr) => parts.push(format!("({expr})")),
                                Err(_) => {
                                    guard_note =
                                        Some(format!("# unparsable guard: {}", t.condition));
                                }
                            }
                        } else {
                            guard_note = Some(format!(
                                "# guard ({}): {}",
                                t.action_language, t.condition
                            ));
                        }
                    }
                    let test = if parts.is_empty() {
                        "True".to_string()
                    } else {
                        parts.join(" and ")
                    };
                    PyTransition {
                        test,
                        guard_note,
                        target_original: target.name.clone(),
                        target_method: method_names[t.target_index].clone(),
                        target_is_final: target.is_final,
                        target_has_entry: py_action(
                            &target.entry_action,
                            &target.action_language,
                            &declared,
                        )
                        .present,
                        target_has_during: py_action(
                            &target.during_action,
                            &target.action_language,
                            &declared,
                        )
                        .present,
                        action: py_action(&t.action, &t.action_language, &declared),
                    }
                })
                .collect();

            PyState {
                original: state.name.clone(),
                method: method_names[i].clone(),
                is_final: state.is_final,
                entry: py_action(&state.entry_action, &state.action_language, &declared),
                during: py_action(&state.during_action, &state.action_language, &declared),
                exit: py_action(&state.exit_action, &state.action_language, &declared),
                transitions,
            }
        })
        .collect();

    let variables = model
        .variables
        .iter()
        .map(|v| PyVar {
            name: var_names.assign(&v.name),
            original: v.name.clone(),
            initial: py_value(&v.initial),
        })
        .collect();

    out.push(PyClass {
        class_name: class_name.to_string(),
        scope_note: None,
        initial: model.states[initial].name.clone(),
        states,
        variables,
    });

    for state in &model.states {
        if let Some(sub) = &state.sub_fsm
            && state.has_sub_machine()
        {
            let sub_class = format!("{class_name}_{}", py_class_name(&state.name));
            let index = out.len();
            build_py_classes(sub, &sub_class, out)?;
            out[index].scope_note = Some(format!(
                "Nested machine of superstate '{}'.",
                state.name
            ));
        }
    }
    Ok(())
}

pub(crate) fn render_python(
    model: &FsmModel,
    timestamp: &str,
) -> Result<Vec<Artifact>, CodeGenError> {
    let env = template_env()?;

    let mut classes = Vec::new();
    build_py_classes(model, &py_class_name(&model.name), &mut classes)?;

    let ctx = PyCtx {
        generator: config::GENERATOR,
        timestamp: timestamp.to_string(),
        fsm_name_original: model.name.clone(),
        classes,
    };
    let content = env.get_template("fsm.py")?.render(&ctx)?;
    let name = sanitize(&model.name, Flavor::Python).to_lowercase();
    Ok(vec![Artifact::new(name, content, ".py", Target::Python)])
}

// ================================================================================================
// HDL (VHDL / Verilog)
// ================================================================================================

#[derive(Debug, Clone, Serialize)]
struct HdlState {
    name: String,
    original: String,
    enum_name: String,
    index: usize,
    branch_lines: Vec<String>,
}

#[derive(Debug, Serialize)]
struct HdlCtx {
    generator: &'static str,
    timestamp: String,
    entity: String,
    fsm_name_original: String,
    states: Vec<HdlState>,
    initial_state: String,
    state_bits: u32,
    state_msb: u32,
    input_signals: Vec<String>,
}

fn state_bits(n: usize) -> u32 {
    if n <= 1 {
        1
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

pub(crate) fn render_hdl(
    model: &FsmModel,
    target: Target,
    timestamp: &str,
) -> Result<Vec<Artifact>, CodeGenError> {
    let env = template_env()?;
    let flavor = if target == Target::Vhdl {
        Flavor::Vhdl
    } else {
        Flavor::Verilog
    };

    let mut state_table = NameTable::new(flavor);
    for reserved in ["clk", "rst_n", "state", "state_out", "current_state", "next_state"] {
        state_table.reserve(reserved);
    }
    let names: Vec<String> = model
        .states
        .iter()
        .map(|s| state_table.assign(&s.name))
        .collect();
    let enum_names: Vec<String> = names.iter().map(|n| format!("STATE_{}", n.to_uppercase())).collect();

    // Input ports: one std_logic/wire per event, plus every identifier the
    // generic guards read.
    let mut raw_signals = BTreeSet::new();
    for t in &model.transitions {
        if !t.event.is_empty() {
            raw_signals.insert(t.event.clone());
        }
        if !t.condition.is_empty()
            && expr::is_generic_dialect(&t.action_language)
            && let Ok(usage) = scan_condition(&t.condition)
        {
            for name in usage.reads {
                if !expr::is_builtin(&name) {
                    raw_signals.insert(name);
                }
            }
        }
    }
    let mut signal_table = NameTable::new(flavor);
    for reserved in ["clk", "rst_n", "state", "state_out", "current_state", "next_state"] {
        signal_table.reserve(reserved);
    }
    let signal_of: BTreeMap<String, String> = raw_signals
        .iter()
        .map(|s| (s.clone(), signal_table.assign(s)))
        .collect();
    let input_signals: Vec<String> = signal_of.values().cloned().collect();

    let states: Vec<HdlState> = model
        .states
        .iter()
        .enumerate()
        .map(|(i, state)| {
            let branch_lines = if target == Target::Vhdl {
                vhdl_branch(model, i, &names, &signal_of)
            } else {
                verilog_branch(model, i, &enum_names, &signal_of)
            };
            HdlState {
                name: names[i].clone(),
                original: state.name.clone(),
                enum_name: enum_names[i].clone(),
                index: i,
                branch_lines,
            }
        })
        .collect();

    let initial = model.initial_index().unwrap_or_default();
    let bits = state_bits(model.states.len());
    let ctx = HdlCtx {
        generator: config::GENERATOR,
        timestamp: timestamp.to_string(),
        entity: sanitize(&model.name, flavor),
        fsm_name_original: model.name.clone(),
        initial_state: if target == Target::Vhdl {
            names[initial].clone()
        } else {
            enum_names[initial].clone()
        },
        states,
        state_bits: bits,
        state_msb: bits - 1,
        input_signals,
    };

    let (template, ext) = if target == Target::Vhdl {
        ("fsm.vhd", ".vhd")
    } else {
        ("fsm.v", ".v")
    };
    let content = env.get_template(template)?.render(&ctx)?;
    Ok(vec![Artifact::new(ctx.entity.clone(), content, ext, target)])
}

/// Builds the body of one `when` branch: an if/elsif chain in declaration
/// order, so the earliest declared transition wins, like the simulator.
fn vhdl_branch(
    model: &FsmModel,
    index: usize,
    names: &[String],
    signal_of: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut open = false;
    for (_, t) in model.outgoing(index) {
        let test = if t.event.is_empty() {
            "true".to_string()
        } else {
            format!("{} = '1'", signal_of[&t.event])
        };
        lines.push(format!("{} {} then", if open { "elsif" } else { "if" }, test));
        let comment = if t.condition.is_empty() {
            String::new()
        } else {
            format!("  -- when {}", t.condition.replace('\n', " "))
        };
        lines.push(format!("    next_state <= {};{}", names[t.target_index], comment));
        open = true;
    }
    if open {
        lines.push("end if;".to_string());
    } else {
        lines.push("null;".to_string());
    }
    lines
}

fn verilog_branch(
    model: &FsmModel,
    index: usize,
    enum_names: &[String],
    signal_of: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut open = false;
    for (_, t) in model.outgoing(index) {
        let test = if t.event.is_empty() {
            "1'b1".to_string()
        } else {
            signal_of[&t.event].clone()
        };
        let prefix = if open { "else if" } else { "if" };
        lines.push(format!("{prefix} ({test})"));
        let comment = if t.condition.is_empty() {
            String::new()
        } else {
            format!("  // when {}", t.condition.replace('\n', " "))
        };
        lines.push(format!("    state <= {};{}", enum_names[t.target_index], comment));
        open = true;
    }
    if !open {
        lines.push("// no outgoing transitions".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_bits_matches_ceil_log2() {
        assert_eq!(state_bits(1), 1);
        assert_eq!(state_bits(2), 1);
        assert_eq!(state_bits(3), 2);
        assert_eq!(state_bits(4), 2);
        assert_eq!(state_bits(5), 3);
        assert_eq!(state_bits(9), 4);
    }

    #[test]
    fn c_actions_split_statements_and_comment_foreign_dialects() {
        let action = c_action("timer = 0; armed = true", "Python (Generic Simulation)");
        assert_eq!(action.lines, vec!["timer = 0;", "armed = true;"]);

        let foreign = c_action("led.on()", "Python (PySerial)");
        assert_eq!(foreign.lines, vec!["/* (Python (PySerial)) led.on() */"]);
    }

    #[test]
    fn guards_fall_back_to_true_for_foreign_dialects() {
        assert_eq!(
            c_guard("timer >= 5", "C (Generic)"),
            ("timer >= 5".to_string(), String::new())
        );
        assert_eq!(
            c_guard("queue.empty()", "Python (PySerial)"),
            ("1".to_string(), "queue.empty()".to_string())
        );
    }
}
