//! Runtime state machine: an ordered transition table plus the current state.

use crate::core::state::{Event, State};
use crate::core::transition::Transition;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// What a fired event did to the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<S: State> {
    /// No transition is registered for the current state and event.
    NoMatch,

    /// A transition matched but resolved to the current state.
    SameState,

    /// The machine moved to a different state.
    Changed { from: S, to: S },
}

impl<S: State> Outcome<S> {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, Self::NoMatch)
    }
}

/// State machine resolving events by first-match scan over its transitions.
///
/// Transitions are append-only and their insertion order is their priority:
/// when several transitions share a `(from, trigger)` pair, the earliest one
/// wins and the rest are never consulted.
///
/// # Example
///
/// ```rust
/// use fsmkit::core::{StateMachine, Transition};
/// use fsmkit::{event_enum, state_enum};
///
/// state_enum! {
///     enum Light { Green, Yellow, Red }
/// }
/// event_enum! {
///     enum Signal { TimeExpired, ButtonPressed }
/// }
///
/// let mut machine = StateMachine::new(Light::Green);
/// machine.add_transition(Transition::unconditional(Light::Green, Signal::TimeExpired, Light::Yellow));
///
/// assert!(!machine.process_event(Signal::ButtonPressed));
/// assert!(machine.process_event(Signal::TimeExpired));
/// assert_eq!(machine.get_current_state(), Light::Yellow);
/// ```
#[derive(Clone, Debug)]
pub struct StateMachine<S: State, E: Event> {
    initial: S,
    current: S,
    transitions: Vec<Transition<S, E>>,
    states: BTreeSet<S>,
    events: BTreeSet<E>,
}

impl<S: State, E: Event> StateMachine<S, E> {
    /// Create a machine in `initial`, with an empty table.
    pub fn new(initial: S) -> Self {
        let mut states = BTreeSet::new();
        states.insert(initial.clone());
        Self {
            initial: initial.clone(),
            current: initial,
            transitions: Vec::new(),
            states,
            events: BTreeSet::new(),
        }
    }

    pub fn get_current_state(&self) -> S {
        self.current.clone()
    }

    /// The state the machine was created in.
    pub fn initial_state(&self) -> &S {
        &self.initial
    }

    /// Force the current state, bypassing the table.
    pub fn set_state(&mut self, state: S) {
        debug!(from = self.current.name(), to = state.name(), "state forced");
        self.states.insert(state.clone());
        self.current = state;
    }

    /// Register a transition. Never fails and never deduplicates.
    pub fn add_transition(&mut self, transition: Transition<S, E>) {
        self.states.insert(transition.from_state().clone());
        for candidate in transition.candidates() {
            self.states.insert(candidate.clone());
        }
        self.events.insert(transition.trigger().clone());
        self.transitions.push(transition);
    }

    /// First transition matching `(state, event)` in insertion order.
    pub fn find_transition(&self, state: &S, event: &E) -> Option<&Transition<S, E>> {
        self.transitions
            .iter()
            .find(|t| t.can_transition(state, event))
    }

    /// Resolve the destination of `event` fired from `state`.
    ///
    /// Returns `state` unchanged when nothing matches.
    pub fn get_next_state(&self, state: &S, event: &E) -> S {
        match self.find_transition(state, event) {
            Some(transition) => transition.resolve(),
            None => state.clone(),
        }
    }

    /// Fire `event` from the current state and report what happened.
    pub fn fire(&mut self, event: &E) -> Outcome<S> {
        let Some(transition) = self.find_transition(&self.current, event) else {
            trace!(
                state = self.current.name(),
                event = event.name(),
                "no transition matched"
            );
            return Outcome::NoMatch;
        };

        let next = transition.resolve();
        if next == self.current {
            trace!(
                state = self.current.name(),
                event = event.name(),
                "transition resolved to current state"
            );
            return Outcome::SameState;
        }

        let from = std::mem::replace(&mut self.current, next.clone());
        debug!(
            from = from.name(),
            event = event.name(),
            to = next.name(),
            "state changed"
        );
        Outcome::Changed { from, to: next }
    }

    /// Fire `event`; true iff the current state changed.
    ///
    /// False covers both "no transition matched" and "matched but targeted
    /// the current state". Use [`fire`](Self::fire) to tell them apart.
    pub fn process_event(&mut self, event: E) -> bool {
        self.fire(&event).is_changed()
    }

    /// Every state referenced so far, ordered by identity.
    pub fn get_all_states(&self) -> Vec<S> {
        self.states.iter().cloned().collect()
    }

    /// Every event referenced so far, ordered by identity.
    pub fn get_all_events(&self) -> Vec<E> {
        self.events.iter().cloned().collect()
    }

    /// The transition table in insertion order.
    pub fn transitions(&self) -> &[Transition<S, E>] {
        &self.transitions
    }
}
