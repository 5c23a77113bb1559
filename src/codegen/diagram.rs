//! PlantUML and Mermaid emission. Both are line-oriented, so the body is
//! assembled here and the template only wraps it with the header/footer.

use serde::Serialize;

use crate::artifact::Artifact;
use crate::codegen::sanitize::{Flavor, NameTable, sanitize};
use crate::codegen::{Target, template_env};
use crate::config;
use crate::error::CodeGenError;
use crate::model::FsmModel;

#[derive(Debug, Serialize)]
struct DiagramCtx {
    generator: &'static str,
    timestamp: String,
    fsm_name_original: String,
    kind: &'static str,
    body: String,
}

pub(crate) fn render(
    model: &FsmModel,
    target: Target,
    timestamp: &str,
) -> Result<Vec<Artifact>, CodeGenError> {
    let env = template_env()?;
    let kind = if target == Target::PlantUml {
        "plantuml"
    } else {
        "mermaid"
    };

    let mut lines = Vec::new();
    scope_body(model, 1, &mut lines);
    for (i, comment) in model.comments.iter().enumerate() {
        let text = comment.text.replace('\n', " ");
        match target {
            Target::PlantUml => lines.push(format!("    note \"{}\" as N{}", text, i + 1)),
            _ => lines.push(format!("    %% {text}")),
        }
    }

    let ctx = DiagramCtx {
        generator: config::GENERATOR,
        timestamp: timestamp.to_string(),
        fsm_name_original: model.name.clone(),
        kind,
        body: lines.join("\n"),
    };
    let content = env.get_template("diagram")?.render(&ctx)?;
    let ext = if target == Target::PlantUml { ".puml" } else { ".mmd" };
    let name = sanitize(&model.name, Flavor::Diagram);
    Ok(vec![Artifact::new(name, content, ext, target)])
}

fn label(event: &str, condition: &str, action: &str) -> String {
    let mut parts = Vec::new();
    if !event.is_empty() {
        parts.push(event.to_string());
    }
    if !condition.is_empty() {
        parts.push(format!("[{}]", condition.replace('\n', " ")));
    }
    if !action.is_empty() {
        parts.push(format!("/ {}", action.replace('\n', " ")));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" : {}", parts.join(" "))
    }
}

fn scope_body(model: &FsmModel, depth: usize, out: &mut Vec<String>) {
    let pad = "    ".repeat(depth);

    let mut table = NameTable::new(Flavor::Diagram);
    let ids: Vec<String> = model
        .states
        .iter()
        .map(|s| table.assign(&s.name))
        .collect();

    // Alias declarations keep the original spelling visible.
    for (i, state) in model.states.iter().enumerate() {
        if ids[i] != state.name && !state.has_sub_machine() {
            out.push(format!("{pad}state \"{}\" as {}", state.name, ids[i]));
        }
    }

    if let Some(initial) = model.initial_index() {
        out.push(format!("{pad}[*] --> {}", ids[initial]));
    }

    for (i, state) in model.states.iter().enumerate() {
        if let Some(sub) = &state.sub_fsm
            && state.has_sub_machine()
        {
            if ids[i] == state.name {
                out.push(format!("{pad}state {} {{", ids[i]));
            } else {
                out.push(format!("{pad}state \"{}\" as {} {{", state.name, ids[i]));
            }
            scope_body(sub, depth + 1, out);
            out.push(format!("{pad}}}"));
        }
        for (kind, text) in [
            ("entry", &state.entry_action),
            ("during", &state.during_action),
            ("exit", &state.exit_action),
        ] {
            if !text.is_empty() {
                out.push(format!(
                    "{pad}{} : {} / {}",
                    ids[i],
                    kind,
                    text.replace('\n', "; ")
                ));
            }
        }
        if state.is_final {
            out.push(format!("{pad}{} --> [*]", ids[i]));
        }
    }

    for t in &model.transitions {
        out.push(format!(
            "{pad}{} --> {}{}",
            ids[t.source_index],
            ids[t.target_index],
            label(&t.event, &t.condition, &t.action)
        ));
    }
}
