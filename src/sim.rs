//! The step-driven simulation engine.
//!
//! The host owns the pacing: each [`Simulator::step`] call performs exactly
//! one macro-step (to transition completion or to a breakpoint) and returns
//! a [`StepOutcome`] describing what happened. There is no internal
//! scheduler and no suspension point; between calls the host has exclusive
//! access.
//!
//! # The Macro-Step
//!
//! ```md
//! Situation                        | Effect
//! ---------------------------------|------------------------------------------
//! halted                           | no-op outcome
//! inside a superstate              | event forwarded to the nested machine
//!                                  | first; if it consumes, the outer scope
//!                                  | does not scan its own transitions
//! no eligible transition           | during(current), tick advances
//! transition fires                 | exit(source), action(transition),
//!                                  | entry(target), nested machine start,
//!                                  | during(target), tick advances
//! transition breakpoint armed      | pause before any effect; an identical
//!                                  | re-step resumes past it once
//! fatal action error               | simulator halts, error in the outcome
//! ```
//!
//! Transitions are scanned in declaration order; guard evaluation errors
//! are logged and treated as guard-false, never fatal.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::{debug, trace};

use crate::error::{EvalError, SimulationError};
use crate::expr::{self, env::VarEnv};
use crate::model::{FsmModel, State, Transition};
use crate::{impl_add_primitive, impl_from_primitive};

// ================================================================================================
// Outcome Types
// ================================================================================================

/// Macro-step counter. Advances once per completed step; breakpoint pauses
/// and fatal aborts do not count.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Tick(pub u64);
impl_from_primitive!(Tick, u64);
impl_add_primitive!(Tick, u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
pub enum ActionKind {
    Entry,
    During,
    Exit,
    Transition,
}

/// One executed (or failed) action within a macro-step.
#[derive(Debug, Clone, Serialize)]
pub struct ActionLogEntry {
    pub kind: ActionKind,
    /// State name, or a rendered transition (`A --go--> B`).
    pub site: String,
    /// The action or condition source text.
    pub text: String,
    /// Present when evaluation failed. For guard failures the entry is the
    /// only trace; the step itself continues.
    pub error: Option<EvalError>,
}

/// What one `step` call did. Logs are per-step; the simulator keeps no
/// history of its own.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    /// Current state name after the step.
    pub state: String,
    pub tick: Tick,
    pub log: Vec<ActionLogEntry>,
    pub paused_on_breakpoint: bool,
    pub halted: bool,
    /// Fatal action failure, if one aborted the step.
    pub error: Option<SimulationError>,
}

// ================================================================================================
// The Simulator
// ================================================================================================

type TransitionKey = (String, String, String);

/// Owns the complete mutable state of one running machine: current state,
/// variable bindings, tick counter, breakpoints, and the nested simulator
/// stack for superstates.
#[derive(Debug, Clone)]
pub struct Simulator {
    model: Arc<FsmModel>,
    initial: usize,
    current: usize,
    env: VarEnv,
    tick: Tick,
    halted: bool,
    breakpoints_state: BTreeSet<String>,
    breakpoints_transition: BTreeSet<TransitionKey>,
    /// One-shot: set when a transition breakpoint pauses, consumed by the
    /// next step so the identical call resumes past the breakpoint.
    resume: Option<TransitionKey>,
    /// Innermost machines receive events first.
    sub: Option<Box<Simulator>>,
}

impl Simulator {
    /// Builds a simulator positioned at the initial state, with variables
    /// at their declared initial values. Construction runs no actions.
    pub fn new(model: Arc<FsmModel>) -> Result<Self, SimulationError> {
        let initial = model
            .initial_index()
            .ok_or_else(|| SimulationError::NoInitialState {
                scope: model.name.clone(),
            })?;
        let env = VarEnv::from_dictionary(&model.variables);
        let mut sim = Self {
            model,
            initial,
            current: initial,
            env,
            tick: Tick::default(),
            halted: false,
            breakpoints_state: BTreeSet::new(),
            breakpoints_transition: BTreeSet::new(),
            resume: None,
            sub: None,
        };
        sim.init_sub_chain()?;
        Ok(sim)
    }

    /// When the initial state is a superstate, the nested simulator stack
    /// must exist before the first step so innermost-first dispatch holds
    /// from the start. Construction never runs actions; entry actions only
    /// execute when a superstate is *entered* by a firing transition.
    fn init_sub_chain(&mut self) -> Result<(), SimulationError> {
        let state = &self.model.states[self.current];
        if let Some(sub_model) = state.sub_fsm.clone()
            && state.has_sub_machine()
        {
            let mut sub = Simulator::new(sub_model)?;
            sub.inherit_breakpoints(&self.breakpoints_state, &self.breakpoints_transition);
            self.sub = Some(Box::new(sub));
        }
        Ok(())
    }

    fn inherit_breakpoints(
        &mut self,
        states: &BTreeSet<String>,
        transitions: &BTreeSet<TransitionKey>,
    ) {
        self.breakpoints_state = states.clone();
        self.breakpoints_transition = transitions.clone();
        if let Some(sub) = self.sub.as_mut() {
            sub.inherit_breakpoints(states, transitions);
        }
    }

    /// Performs one macro-step. `None` is a plain tick; a name dispatches
    /// that event.
    #[tracing::instrument(skip(self), fields(tick = self.tick.0, state = %self.current_state()))]
    pub fn step(&mut self, event: Option<&str>) -> StepOutcome {
        let (outcome, _) = self.step_inner(event);
        outcome
    }

    /// Returns the simulator to its initial configuration. Breakpoints are
    /// host debugging state and survive the reset.
    pub fn reset(&mut self) {
        debug!(scope = %self.model.name, "simulator reset");
        self.current = self.initial;
        self.env.reset(&self.model.variables);
        self.tick = Tick::default();
        self.halted = false;
        self.resume = None;
        self.sub = None;
        // Infallible here: construction already proved the chain is sound.
        let _ = self.init_sub_chain();
    }

    pub fn set_breakpoint_state(&mut self, name: &str, enabled: bool) {
        if enabled {
            self.breakpoints_state.insert(name.to_string());
        } else {
            self.breakpoints_state.remove(name);
        }
        if let Some(sub) = self.sub.as_mut() {
            sub.set_breakpoint_state(name, enabled);
        }
    }

    pub fn set_breakpoint_transition(
        &mut self,
        source: &str,
        target: &str,
        event: &str,
        enabled: bool,
    ) {
        let key = (source.to_string(), target.to_string(), event.to_string());
        if enabled {
            self.breakpoints_transition.insert(key);
        } else {
            self.breakpoints_transition.remove(&key);
        }
        if let Some(sub) = self.sub.as_mut() {
            sub.set_breakpoint_transition(source, target, event, enabled);
        }
    }

    pub fn current_state(&self) -> &str {
        &self.model.states[self.current].name
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Read-only view of the variable bindings.
    pub fn variables(&self) -> &VarEnv {
        &self.env
    }

    /// Active state names, outermost first. More than one entry only while
    /// a superstate's nested machine is running.
    pub fn active_path(&self) -> Vec<String> {
        let mut path = vec![self.current_state().to_string()];
        if let Some(sub) = &self.sub {
            path.extend(sub.active_path());
        }
        path
    }

    // ============================================================================================
    // Core Macro-Step Logic
    // ============================================================================================

    /// The bool is the "consumed" signal for hierarchical dispatch: true
    /// when a transition fired, paused on its breakpoint, or died fatally
    /// at this level or deeper.
    fn step_inner(&mut self, event: Option<&str>) -> (StepOutcome, bool) {
        let mut log = Vec::new();
        let resume = self.resume.take();

        if self.halted {
            return (self.outcome(log, false, None), false);
        }

        let model = Arc::clone(&self.model);

        // Nested precedence: the innermost machine sees the event first.
        if let Some(sub) = self.sub.as_mut() {
            let (sub_outcome, consumed) = sub.step_inner(event);
            let paused = sub_outcome.paused_on_breakpoint;
            let error = sub_outcome.error.clone();
            log.extend(sub_outcome.log);
            if let Some(error) = error {
                // A fatal error anywhere in the hierarchy halts the whole
                // machine; the host only observes the root.
                self.halted = true;
                return (self.outcome(log, paused, Some(error)), true);
            }
            if consumed {
                if !paused {
                    self.tick += 1;
                }
                return (self.outcome(log, paused, None), true);
            }
            // The nested machine idled; the outer scope now gets its turn.
        }

        let fired = self.select_transition(event, &mut log);

        let Some(index) = fired else {
            if let Err(err) = self.run_state_action(self.current, ActionKind::During, &mut log) {
                return (self.outcome(log, false, Some(err)), false);
            }
            self.tick += 1;
            return (self.outcome(log, false, None), false);
        };

        let transition = model.transitions[index].clone();
        trace!(transition = %transition.describe(), "transition fires");

        // Pause before any effect. The one-shot `resume` token lets the
        // identical follow-up call pass the breakpoint.
        let key = (
            transition.source.clone(),
            transition.target.clone(),
            transition.event.clone(),
        );
        if self.breakpoints_transition.contains(&key) && resume.as_ref() != Some(&key) {
            self.resume = Some(key);
            return (self.outcome(log, true, None), true);
        }

        if let Err(err) = self.run_state_action(self.current, ActionKind::Exit, &mut log) {
            return (self.outcome(log, false, Some(err)), true);
        }
        if let Err(err) = self.run_transition_action(&transition, &mut log) {
            return (self.outcome(log, false, Some(err)), true);
        }

        // Leaving a superstate drops its nested machine.
        self.sub = None;
        self.current = transition.target_index;
        let target = &model.states[self.current];

        if target.is_final {
            self.halted = true;
        }

        if let Err(err) = self.run_state_action(self.current, ActionKind::Entry, &mut log) {
            return (self.outcome(log, false, Some(err)), true);
        }

        let paused = self.breakpoints_state.contains(&target.name);

        if !self.halted && target.has_sub_machine() {
            if let Err(err) = self.spawn_sub(target, &mut log) {
                self.halted = true;
                return (self.outcome(log, paused, Some(err)), true);
            }
        }

        // The entered state settles with its during action in the same
        // macro-step; the exited state's during was skipped.
        if !self.halted
            && let Err(err) = self.run_state_action(self.current, ActionKind::During, &mut log)
        {
            return (self.outcome(log, paused, Some(err)), true);
        }

        self.tick += 1;
        (self.outcome(log, paused, None), true)
    }

    /// Scans the current state's outgoing transitions in declaration order
    /// and returns the first eligible one whose guard holds. Guard errors
    /// are logged and treated as guard-false.
    fn select_transition(
        &self,
        event: Option<&str>,
        log: &mut Vec<ActionLogEntry>,
    ) -> Option<usize> {
        for (index, t) in self.model.outgoing(self.current) {
            if !t.matches_event(event) {
                continue;
            }
            if t.condition.is_empty() {
                return Some(index);
            }
            if !expr::is_generic_dialect(&t.action_language) {
                // Foreign-dialect guards are not executable here.
                continue;
            }
            match expr::eval_condition(&t.condition, &self.env, self.tick.0) {
                Ok(true) => return Some(index),
                Ok(false) => {}
                Err(err) => {
                    trace!(guard = %t.condition, %err, "guard evaluation failed");
                    log.push(ActionLogEntry {
                        kind: ActionKind::Transition,
                        site: t.describe(),
                        text: t.condition.clone(),
                        error: Some(err),
                    });
                }
            }
        }
        None
    }

    fn run_state_action(
        &mut self,
        index: usize,
        kind: ActionKind,
        log: &mut Vec<ActionLogEntry>,
    ) -> Result<(), SimulationError> {
        let model = Arc::clone(&self.model);
        let state = &model.states[index];
        let text = match kind {
            ActionKind::Entry => &state.entry_action,
            ActionKind::During => &state.during_action,
            ActionKind::Exit => &state.exit_action,
            ActionKind::Transition => unreachable!("transition actions have their own runner"),
        };
        if text.is_empty() || !expr::is_generic_dialect(&state.action_language) {
            return Ok(());
        }
        self.execute(kind, &state.name, text, log)
    }

    fn run_transition_action(
        &mut self,
        transition: &Transition,
        log: &mut Vec<ActionLogEntry>,
    ) -> Result<(), SimulationError> {
        if transition.action.is_empty() || !expr::is_generic_dialect(&transition.action_language) {
            return Ok(());
        }
        self.execute(
            ActionKind::Transition,
            &transition.describe(),
            &transition.action,
            log,
        )
    }

    fn execute(
        &mut self,
        kind: ActionKind,
        site: &str,
        text: &str,
        log: &mut Vec<ActionLogEntry>,
    ) -> Result<(), SimulationError> {
        match expr::run_action(text, &mut self.env, self.tick.0) {
            Ok(()) => {
                log.push(ActionLogEntry {
                    kind,
                    site: site.to_string(),
                    text: text.to_string(),
                    error: None,
                });
                Ok(())
            }
            Err(err) => {
                log.push(ActionLogEntry {
                    kind,
                    site: site.to_string(),
                    text: text.to_string(),
                    error: Some(err.clone()),
                });
                self.halted = true;
                Err(SimulationError::FatalAction {
                    kind,
                    site: site.to_string(),
                    source: err,
                })
            }
        }
    }

    /// Starts the nested machine of a freshly entered superstate: runs its
    /// initial state's entry action and recurses if that state is itself a
    /// superstate.
    fn spawn_sub(
        &mut self,
        state: &State,
        log: &mut Vec<ActionLogEntry>,
    ) -> Result<(), SimulationError> {
        let Some(sub_model) = state.sub_fsm.clone() else {
            return Ok(());
        };
        let mut sub = Simulator::new(sub_model)?;
        sub.inherit_breakpoints(&self.breakpoints_state, &self.breakpoints_transition);
        sub.enter_initial(log)?;
        self.sub = Some(Box::new(sub));
        Ok(())
    }

    /// Runs the entry action of the initial state, recursing down the
    /// already-constructed nested chain.
    fn enter_initial(&mut self, log: &mut Vec<ActionLogEntry>) -> Result<(), SimulationError> {
        self.run_state_action(self.current, ActionKind::Entry, log)?;
        if self.model.states[self.current].is_final {
            self.halted = true;
            return Ok(());
        }
        if let Some(sub) = self.sub.as_mut() {
            sub.enter_initial(log)?;
        }
        Ok(())
    }

    fn outcome(
        &self,
        log: Vec<ActionLogEntry>,
        paused_on_breakpoint: bool,
        error: Option<SimulationError>,
    ) -> StepOutcome {
        StepOutcome {
            state: self.current_state().to_string(),
            tick: self.tick,
            log,
            paused_on_breakpoint,
            halted: self.halted,
            error,
        }
    }
}
