//! Compiled path patterns and the [`Matcher`] automaton.
//!
//! A [`Step`] tree describes which edge sequences a pattern accepts. It is
//! compiled into a [`Pattern`], a nondeterministic automaton whose states
//! are linked by epsilon moves and by edge-consuming transitions. A
//! [`Matcher`] is an immutable frontier over that automaton: a list of
//! threads, each one a state index plus the bindings accumulated on the
//! way there. Advancing a matcher never mutates it; sibling edges explored
//! from the same node all start from the same frontier.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{GraphError, Result};
use crate::graph::edge::Edge;
use crate::graph::value::{Fields, PropValue};
use crate::matching::binding::{Binding, ResultSet};
use crate::matching::expr::{Overlay, Predicate};

/// Name under which guards see the edge currently being consumed.
///
/// The variable exists only while a guard is evaluated and never appears in
/// results.
pub const EDGE_VAR: &str = "@edge";

/// Largest `min` or `max` a repeat may declare.
pub const MAX_REPEAT: u32 = 64;

/// Upper bound on the size of a compiled automaton.
const MAX_STATES: usize = 1 << 16;

/// Binds a pattern variable to the consumed edge or to a value inside it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Capture {
    /// Variable name.
    pub var: String,
    /// Payload path to capture; empty captures the edge itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
}

impl Capture {
    /// The captured value, or `None` when the final field of the path is
    /// absent and the variable stays unassigned.
    fn resolve(&self, edge: &Edge) -> Result<Option<PropValue>> {
        let Some((last, parents)) = self.path.split_last() else {
            return Ok(Some(PropValue::from(edge.clone())));
        };
        let mut current = PropValue::Record(edge.payload.clone());
        for name in parents {
            current = current
                .field(name)
                .ok_or_else(|| GraphError::MissingProperty {
                    path: format!("{} <- {}", self.var, self.path.join(".")),
                    field: name.clone(),
                })?;
        }
        Ok(current.field(last))
    }
}

/// Consumption of exactly one edge.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeStep {
    /// Variable bound when the edge is consumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<Capture>,
    /// Condition the edge must satisfy, evaluated after the capture.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<Predicate>,
}

impl EdgeStep {
    /// A step accepting any edge and binding nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `var` to the payload value at `path` (the edge itself when
    /// `path` is empty).
    pub fn capture(mut self, var: impl Into<String>, path: &[&str]) -> Self {
        self.capture = Some(Capture {
            var: var.into(),
            path: path.iter().map(|s| (*s).to_owned()).collect(),
        });
        self
    }

    /// Only consume edges for which `guard` holds.
    pub fn guard(mut self, guard: Predicate) -> Self {
        self.guard = Some(guard);
        self
    }
}

/// Pattern syntax tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// One edge.
    Edge(EdgeStep),
    /// Each step in order.
    Seq(Vec<Step>),
    /// Any one of the alternatives.
    Alt(Vec<Step>),
    /// The inner step or nothing.
    Optional(Box<Step>),
    /// Between `min` and `max` repetitions; unbounded when `max` is absent.
    Repeat {
        /// Repeated step.
        step: Box<Step>,
        /// Minimum number of repetitions.
        #[serde(default)]
        min: u32,
        /// Maximum number of repetitions.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<u32>,
    },
}

impl Step {
    /// Any single edge.
    pub fn any() -> Self {
        Step::Edge(EdgeStep::new())
    }

    /// `steps` in sequence.
    pub fn seq(steps: impl IntoIterator<Item = Step>) -> Self {
        Step::Seq(steps.into_iter().collect())
    }

    /// One of `steps`.
    pub fn alt(steps: impl IntoIterator<Item = Step>) -> Self {
        Step::Alt(steps.into_iter().collect())
    }

    /// `step` zero or one time.
    pub fn optional(step: Step) -> Self {
        Step::Optional(Box::new(step))
    }

    /// `step` repeated `min..=max` times.
    pub fn repeat(step: Step, min: u32, max: Option<u32>) -> Self {
        Step::Repeat {
            step: Box::new(step),
            min,
            max,
        }
    }

    /// Returns `true` when the step can match without consuming an edge.
    fn nullable(&self) -> bool {
        match self {
            Step::Edge(_) => false,
            Step::Seq(steps) => steps.iter().all(Step::nullable),
            Step::Alt(steps) => steps.iter().any(Step::nullable),
            Step::Optional(_) => true,
            Step::Repeat { step, min, .. } => *min == 0 || step.nullable(),
        }
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Step::Edge(edge) => {
                if let Some(capture) = &edge.capture {
                    if !out.contains(&capture.var) {
                        out.push(capture.var.clone());
                    }
                }
            }
            Step::Seq(steps) | Step::Alt(steps) => {
                steps.iter().for_each(|s| s.collect_variables(out));
            }
            Step::Optional(step) | Step::Repeat { step, .. } => step.collect_variables(out),
        }
    }
}

impl From<EdgeStep> for Step {
    fn from(step: EdgeStep) -> Self {
        Step::Edge(step)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct State {
    accepting: bool,
    epsilon: SmallVec<[usize; 2]>,
    steps: Vec<Transition>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Transition {
    capture: Option<Capture>,
    guard: Option<Predicate>,
    target: usize,
}

/// Compiled automaton for a [`Step`] tree.
///
/// Decoding checks every state index, so a malformed frame is rejected
/// instead of reaching the matcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "PatternFrame")]
pub struct Pattern {
    states: Vec<State>,
    start: usize,
    variables: Vec<String>,
}

#[derive(Deserialize)]
struct PatternFrame {
    states: Vec<State>,
    start: usize,
    variables: Vec<String>,
}

impl TryFrom<PatternFrame> for Pattern {
    type Error = GraphError;

    fn try_from(frame: PatternFrame) -> Result<Self> {
        let count = frame.states.len();
        let in_range = |id: usize| id < count;
        let links_ok = frame.states.iter().all(|state| {
            state.epsilon.iter().copied().all(in_range)
                && state.steps.iter().all(|t| in_range(t.target))
        });
        if !in_range(frame.start) || !links_ok {
            return Err(GraphError::Serialization(format!(
                "pattern refers to a state outside 0..{count}"
            )));
        }
        Ok(Self {
            states: frame.states,
            start: frame.start,
            variables: frame.variables,
        })
    }
}

impl Pattern {
    /// Compiles `step` into an automaton.
    pub fn compile(step: &Step) -> Result<Self> {
        let mut asm = Assembler::default();
        let start = asm.state();
        let end = asm.emit(step, start)?;
        asm.states[end].accepting = true;

        let mut variables = Vec::new();
        step.collect_variables(&mut variables);
        if let Some(reserved) = variables.iter().find(|v| v.as_str() == EDGE_VAR) {
            return Err(GraphError::InvalidArgument(format!(
                "'{reserved}' is reserved and cannot be captured"
            )));
        }

        Ok(Self {
            states: asm.states,
            start,
            variables,
        })
    }

    /// Variables captured anywhere in the pattern, in first-seen order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Number of automaton states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Expands every thread through epsilon moves, keeping only states that
    /// accept or can consume an edge.
    fn close(&self, threads: Vec<Thread>) -> Vec<Thread> {
        let mut closed = Vec::with_capacity(threads.len());
        let mut seen = FxHashSet::default();
        let mut stack = Vec::new();
        for thread in threads {
            seen.clear();
            stack.push(thread.state);
            while let Some(id) = stack.pop() {
                if !seen.insert(id) {
                    continue;
                }
                let state = &self.states[id];
                if state.accepting || !state.steps.is_empty() {
                    closed.push(Thread {
                        state: id,
                        env: thread.env.clone(),
                    });
                }
                stack.extend(state.epsilon.iter().rev().copied());
            }
        }
        closed
    }
}

#[derive(Default)]
struct Assembler {
    states: Vec<State>,
}

impl Assembler {
    fn state(&mut self) -> usize {
        self.states.push(State::default());
        self.states.len() - 1
    }

    fn epsilon(&mut self, from: usize, to: usize) {
        self.states[from].epsilon.push(to);
    }

    /// Emits `step` starting at `from` and returns its exit state.
    fn emit(&mut self, step: &Step, from: usize) -> Result<usize> {
        match step {
            Step::Edge(edge) => {
                if self.states.len() >= MAX_STATES {
                    return Err(GraphError::InvalidArgument(format!(
                        "pattern expands to more than {MAX_STATES} states"
                    )));
                }
                let target = self.state();
                self.states[from].steps.push(Transition {
                    capture: edge.capture.clone(),
                    guard: edge.guard.clone(),
                    target,
                });
                Ok(target)
            }
            Step::Seq(steps) => steps.iter().try_fold(from, |cur, s| self.emit(s, cur)),
            Step::Alt(branches) => {
                if branches.is_empty() {
                    return Err(GraphError::InvalidArgument(
                        "alternation needs at least one branch".into(),
                    ));
                }
                let out = self.state();
                for branch in branches {
                    let entry = self.state();
                    self.epsilon(from, entry);
                    let end = self.emit(branch, entry)?;
                    self.epsilon(end, out);
                }
                Ok(out)
            }
            Step::Optional(inner) => {
                let entry = self.state();
                let out = self.state();
                self.epsilon(from, entry);
                self.epsilon(from, out);
                let end = self.emit(inner, entry)?;
                self.epsilon(end, out);
                Ok(out)
            }
            Step::Repeat { step, min, max } => {
                check_repeat(step, *min, *max)?;
                let mut cur = from;
                for _ in 0..*min {
                    cur = self.emit(step, cur)?;
                }
                match *max {
                    Some(max) => {
                        // Each extra copy is reachable only through the previous
                        // one, so every length has a single derivation.
                        let out = self.state();
                        for _ in *min..max {
                            self.epsilon(cur, out);
                            cur = self.emit(step, cur)?;
                        }
                        self.epsilon(cur, out);
                        Ok(out)
                    }
                    None => {
                        let hub = self.state();
                        self.epsilon(cur, hub);
                        let end = self.emit(step, hub)?;
                        self.epsilon(end, hub);
                        Ok(hub)
                    }
                }
            }
        }
    }
}

fn check_repeat(step: &Step, min: u32, max: Option<u32>) -> Result<()> {
    if let Some(max) = max {
        if max < min {
            return Err(GraphError::InvalidArgument(format!(
                "repeat bounds {min}..{max} are inverted"
            )));
        }
    }
    let bound = max.unwrap_or(min);
    if bound > MAX_REPEAT {
        return Err(GraphError::InvalidArgument(format!(
            "repeat bound {bound} exceeds {MAX_REPEAT}"
        )));
    }
    // A nullable body derives the same path through several copies.
    if step.nullable() {
        return Err(GraphError::InvalidArgument(
            "repeated step must consume at least one edge".into(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Thread {
    state: usize,
    env: Binding,
}

/// Immutable frontier of a [`Pattern`].
///
/// `can_take` and `can_cont` are independent: a frontier with an optional
/// tail both accepts and can continue.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "MatcherFrame")]
pub struct Matcher {
    pattern: Arc<Pattern>,
    frontier: Vec<Thread>,
}

#[derive(Deserialize)]
struct MatcherFrame {
    pattern: Arc<Pattern>,
    frontier: Vec<Thread>,
}

impl TryFrom<MatcherFrame> for Matcher {
    type Error = GraphError;

    fn try_from(frame: MatcherFrame) -> Result<Self> {
        let count = frame.pattern.states.len();
        if let Some(thread) = frame.frontier.iter().find(|t| t.state >= count) {
            return Err(GraphError::Serialization(format!(
                "frontier thread at state {} outside 0..{count}",
                thread.state
            )));
        }
        Ok(Self {
            pattern: frame.pattern,
            frontier: frame.frontier,
        })
    }
}

impl Matcher {
    /// The initial frontier of `pattern`, with every variable unassigned.
    pub fn new(pattern: Arc<Pattern>) -> Self {
        let env = Binding::with_unassigned(pattern.variables.iter().cloned());
        let frontier = pattern.close(vec![Thread {
            state: pattern.start,
            env,
        }]);
        Self { pattern, frontier }
    }

    /// Compiles `step` and returns its initial frontier.
    pub fn from_step(step: &Step) -> Result<Self> {
        Ok(Self::new(Arc::new(Pattern::compile(step)?)))
    }

    /// The automaton this frontier runs over.
    pub fn pattern(&self) -> &Arc<Pattern> {
        &self.pattern
    }

    /// Number of live threads.
    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Returns `true` if some thread sits on an accepting state.
    pub fn can_take(&self) -> bool {
        self.frontier
            .iter()
            .any(|thread| self.pattern.states[thread.state].accepting)
    }

    /// Bindings of every accepting thread.
    ///
    /// Fails with [`GraphError::IllegalState`] when [`Matcher::can_take`] is
    /// false.
    pub fn take(&self) -> Result<ResultSet> {
        if !self.can_take() {
            return Err(GraphError::IllegalState(
                "take() called on a frontier with no accepting state".into(),
            ));
        }
        Ok(self
            .frontier
            .iter()
            .filter(|thread| self.pattern.states[thread.state].accepting)
            .map(|thread| thread.env.clone())
            .collect())
    }

    /// Returns `true` if some thread can consume another edge.
    pub fn can_cont(&self) -> bool {
        self.frontier
            .iter()
            .any(|thread| !self.pattern.states[thread.state].steps.is_empty())
    }

    /// Returns `true` when the frontier can neither accept nor continue.
    pub fn is_dead(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Consumes `edge` from every thread and returns the successor frontier.
    ///
    /// Transitions whose capture conflicts with an existing binding or whose
    /// guard rejects the edge are dropped. Guard evaluation errors abort.
    pub fn cont(&self, edge: &Edge) -> Result<Matcher> {
        let edge_value = PropValue::from(edge.clone());
        let mut next = Vec::new();
        for thread in &self.frontier {
            for transition in &self.pattern.states[thread.state].steps {
                let mut env = thread.env.clone();
                if let Some(capture) = &transition.capture {
                    if let Some(value) = capture.resolve(edge)? {
                        if !env.assign(&capture.var, value) {
                            continue;
                        }
                    }
                }
                if let Some(guard) = &transition.guard {
                    let scope = Overlay {
                        base: &env,
                        name: EDGE_VAR,
                        value: &edge_value,
                    };
                    if !guard.evaluate(&scope)? {
                        continue;
                    }
                }
                next.push(Thread {
                    state: transition.target,
                    env,
                });
            }
        }
        Ok(Matcher {
            frontier: self.pattern.close(next),
            pattern: Arc::clone(&self.pattern),
        })
    }
}
