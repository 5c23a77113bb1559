//! Pure structural and semantic validation of an [`FsmModel`].
//!
//! `validate` never fails and never short-circuits: it walks every check in
//! a fixed order, accumulates every finding, and recurses into nested
//! machines. Findings carry [`EntityRef`] handles so a host editor can
//! highlight the offending entity.

use std::collections::{BTreeSet, VecDeque};

use itertools::Itertools;
use serde::Serialize;
use strum_macros::Display;
use tracing::debug;

use crate::expr::{self, scan_action, scan_condition};
use crate::model::{EntityRef, FsmModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A structured finding. Not an error: a model with warnings still loads,
/// simulates and generates code.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<EntityRef>,
}

impl Diagnostic {
    fn error(message: impl Into<String>, location: EntityRef) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location: Some(location),
        }
    }

    fn warning(message: impl Into<String>, location: EntityRef) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            location: Some(location),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Validates a model and every nested machine, returning all findings.
#[tracing::instrument(skip(model), fields(name = %model.name))]
pub fn validate(model: &FsmModel) -> Vec<Diagnostic> {
    let mut findings = Vec::new();
    check_scope(model, &mut Vec::new(), &mut findings);
    debug!(
        errors = findings.iter().filter(|d| d.is_error()).count(),
        total = findings.len(),
        "validation finished"
    );
    findings
}

fn check_scope(model: &FsmModel, scope: &mut Vec<usize>, out: &mut Vec<Diagnostic>) {
    // 1. Non-empty model. With no states every transition is an orphan and
    //    no further check applies to this scope.
    if model.states.is_empty() {
        out.push(Diagnostic::error(
            format!("empty model: scope '{}' declares no states", model.name),
            EntityRef::Model {
                scope: scope.clone(),
            },
        ));
        for (i, t) in model.transitions.iter().enumerate() {
            out.push(Diagnostic::error(
                format!("orphan transition {}: scope has no states", t.describe()),
                EntityRef::Transition {
                    scope: scope.clone(),
                    index: i,
                },
            ));
        }
        return;
    }

    check_initial(model, scope, out);
    check_final_outgoing(model, scope, out);
    let reachable = check_reachability(model, scope, out);
    check_dead_ends(model, &reachable, scope, out);
    check_endpoints(model, scope, out);
    check_variables(model, scope, out);
    check_overlap(model, scope, out);

    // 9. Recurse into every nested machine.
    for (i, state) in model.states.iter().enumerate() {
        if let Some(sub) = &state.sub_fsm {
            scope.push(i);
            check_scope(sub, scope, out);
            scope.pop();
        }
    }
}

/// 2. Exactly one initial state per scope.
fn check_initial(model: &FsmModel, scope: &[usize], out: &mut Vec<Diagnostic>) {
    let initials: Vec<&str> = model
        .states
        .iter()
        .filter(|s| s.is_initial)
        .map(|s| s.name.as_str())
        .collect();
    match initials.len() {
        0 => out.push(Diagnostic::error(
            format!("scope '{}' has no initial state", model.name),
            EntityRef::Model {
                scope: scope.to_vec(),
            },
        )),
        1 => {}
        _ => out.push(Diagnostic::error(
            format!(
                "scope '{}' has {} initial states: {}",
                model.name,
                initials.len(),
                initials.iter().join(", ")
            ),
            EntityRef::Model {
                scope: scope.to_vec(),
            },
        )),
    }
}

/// 3. Final states must have no outgoing transitions.
fn check_final_outgoing(model: &FsmModel, scope: &[usize], out: &mut Vec<Diagnostic>) {
    for (i, state) in model.states.iter().enumerate() {
        if !state.is_final {
            continue;
        }
        let outgoing: Vec<usize> = model.outgoing(i).map(|(ti, _)| ti).collect();
        if outgoing.is_empty() {
            continue;
        }
        out.push(Diagnostic::error(
            format!(
                "final state '{}' has {} outgoing transition(s)",
                state.name,
                outgoing.len()
            ),
            EntityRef::State {
                scope: scope.to_vec(),
                index: i,
            },
        ));
        for ti in outgoing {
            out.push(Diagnostic::error(
                format!(
                    "transition {} leaves final state '{}'",
                    model.transitions[ti].describe(),
                    state.name
                ),
                EntityRef::Transition {
                    scope: scope.to_vec(),
                    index: ti,
                },
            ));
        }
    }
}

/// 4. Every state must be reachable from the initial state.
///
/// Returns the reachable index set (used by the dead-end check). Without
/// an initial state reachability is undefined; everything is treated as
/// reachable so no misleading cascade follows check 2's error.
fn check_reachability(
    model: &FsmModel,
    scope: &[usize],
    out: &mut Vec<Diagnostic>,
) -> BTreeSet<usize> {
    let Some(start) = model.initial_index() else {
        return (0..model.states.len()).collect();
    };

    let mut reachable = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(index) = queue.pop_front() {
        for (_, t) in model.outgoing(index) {
            if t.target_index < model.states.len() && reachable.insert(t.target_index) {
                queue.push_back(t.target_index);
            }
        }
    }

    for (i, state) in model.states.iter().enumerate() {
        if !reachable.contains(&i) {
            out.push(Diagnostic::error(
                format!(
                    "state '{}' is unreachable from initial state '{}'",
                    state.name, model.states[start].name
                ),
                EntityRef::State {
                    scope: scope.to_vec(),
                    index: i,
                },
            ));
        }
    }
    reachable
}

/// 5. A reachable non-final state with no way out is a dead end, unless it
///    hosts a non-empty nested machine.
fn check_dead_ends(
    model: &FsmModel,
    reachable: &BTreeSet<usize>,
    scope: &[usize],
    out: &mut Vec<Diagnostic>,
) {
    for (i, state) in model.states.iter().enumerate() {
        if state.is_final || !reachable.contains(&i) || state.has_sub_machine() {
            continue;
        }
        if model.outgoing(i).next().is_none() {
            out.push(Diagnostic::error(
                format!(
                    "state '{}' is a dead end: not final and no outgoing transitions",
                    state.name
                ),
                EntityRef::State {
                    scope: scope.to_vec(),
                    index: i,
                },
            ));
        }
    }
}

/// 6. Transition endpoints must resolve by name within the scope.
fn check_endpoints(model: &FsmModel, scope: &[usize], out: &mut Vec<Diagnostic>) {
    for (i, t) in model.transitions.iter().enumerate() {
        for (label, name) in [("source", &t.source), ("target", &t.target)] {
            if model.state_index(name).is_none() {
                out.push(Diagnostic::error(
                    format!("transition {} {label} '{}' does not resolve", t.describe(), name),
                    EntityRef::Transition {
                        scope: scope.to_vec(),
                        index: i,
                    },
                ));
            }
        }
    }
}

/// 7. Every identifier used by an action or condition must be declared in
///    the Data Dictionary (built-ins excepted). Only the generic dialect is
///    scanned; foreign dialects pass through to code generation untouched.
fn check_variables(model: &FsmModel, scope: &[usize], out: &mut Vec<Diagnostic>) {
    for (i, state) in model.states.iter().enumerate() {
        if !expr::is_generic_dialect(&state.action_language) {
            continue;
        }
        let location = EntityRef::State {
            scope: scope.to_vec(),
            index: i,
        };
        for (what, text) in [
            ("entry action", &state.entry_action),
            ("during action", &state.during_action),
            ("exit action", &state.exit_action),
        ] {
            check_expression(model, text, what, &state.name, false, &location, out);
        }
    }

    for (i, t) in model.transitions.iter().enumerate() {
        if !expr::is_generic_dialect(&t.action_language) {
            continue;
        }
        let location = EntityRef::Transition {
            scope: scope.to_vec(),
            index: i,
        };
        let site = t.describe();
        check_expression(model, &t.condition, "condition", &site, true, &location, out);
        check_expression(model, &t.action, "action", &site, false, &location, out);
    }
}

fn check_expression(
    model: &FsmModel,
    text: &str,
    what: &str,
    site: &str,
    is_condition: bool,
    location: &EntityRef,
    out: &mut Vec<Diagnostic>,
) {
    if text.is_empty() {
        return;
    }
    let scanned = if is_condition {
        scan_condition(text)
    } else {
        scan_action(text)
    };
    let usage = match scanned {
        Ok(usage) => usage,
        Err(err) => {
            out.push(Diagnostic::error(
                format!("invalid {what} of {site}: {err}"),
                location.clone(),
            ));
            return;
        }
    };

    let undeclared: Vec<String> = usage
        .all()
        .into_iter()
        .filter(|name| !expr::is_builtin(name) && model.variable(name).is_none())
        .collect();
    if !undeclared.is_empty() {
        out.push(Diagnostic::error(
            format!(
                "{what} of {site} uses undeclared variable(s): {}",
                undeclared.iter().join(", ")
            ),
            location.clone(),
        ));
    }

    for builtin in usage.writes.iter().filter(|w| expr::is_builtin(w)) {
        out.push(Diagnostic::error(
            format!("{what} of {site} assigns to read-only built-in '{builtin}'"),
            location.clone(),
        ));
    }
}

/// 8. Warn when a state has several transitions on the same event whose
///    guards overlap syntactically (identical, or trivially true).
fn check_overlap(model: &FsmModel, scope: &[usize], out: &mut Vec<Diagnostic>) {
    for (i, state) in model.states.iter().enumerate() {
        // Group outgoing transitions by event, preserving declaration order.
        let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
        for (ti, t) in model.outgoing(i) {
            match groups.iter_mut().find(|(ev, _)| *ev == t.event.as_str()) {
                Some((_, members)) => members.push(ti),
                None => groups.push((t.event.as_str(), vec![ti])),
            }
        }

        for (event, members) in groups {
            if members.len() < 2 {
                continue;
            }
            let conflicting = overlapping_members(model, &members);
            if conflicting.len() < 2 {
                continue;
            }
            let listed = conflicting
                .iter()
                .map(|ti| model.transitions[*ti].describe())
                .join("; ");
            let event_label = if event.is_empty() { "<any>" } else { event };
            out.push(Diagnostic::warning(
                format!(
                    "state '{}' has overlapping transitions on event '{}': {}",
                    state.name, event_label, listed
                ),
                EntityRef::State {
                    scope: scope.to_vec(),
                    index: i,
                },
            ));
        }
    }
}

/// A trivially-true guard overlaps every sibling; otherwise only textually
/// identical guards overlap.
fn overlapping_members(model: &FsmModel, members: &[usize]) -> Vec<usize> {
    let trivially_true =
        |ti: &usize| matches!(model.transitions[*ti].condition.trim(), "" | "true" | "1");

    if members.iter().any(trivially_true) {
        return members.to_vec();
    }

    let mut conflicting = Vec::new();
    for (pos, ti) in members.iter().enumerate() {
        let cond = model.transitions[*ti].condition.trim();
        let duplicated = members
            .iter()
            .enumerate()
            .any(|(other_pos, other)| {
                other_pos != pos && model.transitions[*other].condition.trim() == cond
            });
        if duplicated {
            conflicting.push(*ti);
        }
    }
    conflicting
}
