//! Diagnostics for transition tables.
//!
//! Validation never rejects a table: shadowed rules and unreachable states
//! are legal and keep their first-match semantics. It only reports them, and
//! it reports all of them in one pass using Stillwater's `Validation`.

use crate::core::{Event, State, StateMachine};
use std::collections::BTreeSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// A questionable property of a transition table.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TableIssue<S: State, E: Event> {
    #[error("transition #{index} ({from:?} on {trigger:?}) is shadowed by transition #{shadowed_by}")]
    Shadowed {
        index: usize,
        shadowed_by: usize,
        from: S,
        trigger: E,
    },

    #[error("state {state:?} is never the target of a transition")]
    Unreachable { state: S },
}

/// Check a machine's table, accumulating every issue.
pub fn validate_table<S: State, E: Event>(
    machine: &StateMachine<S, E>,
) -> Validation<(), NonEmptyVec<TableIssue<S, E>>> {
    let mut checks: Vec<Validation<(), NonEmptyVec<TableIssue<S, E>>>> = Vec::new();

    let transitions = machine.transitions();
    for (index, transition) in transitions.iter().enumerate() {
        let earlier = transitions[..index]
            .iter()
            .position(|t| t.can_transition(transition.from_state(), transition.trigger()));

        let check = match earlier {
            Some(shadowed_by) => Validation::fail(TableIssue::Shadowed {
                index,
                shadowed_by,
                from: transition.from_state().clone(),
                trigger: transition.trigger().clone(),
            }),
            None => Validation::success(()),
        };
        checks.push(check);
    }

    let mut reachable: BTreeSet<&S> = BTreeSet::new();
    reachable.insert(machine.initial_state());
    for transition in transitions {
        reachable.extend(transition.candidates());
    }

    for state in machine.get_all_states() {
        let check = if reachable.contains(&state) {
            Validation::success(())
        } else {
            Validation::fail(TableIssue::Unreachable { state })
        };
        checks.push(check);
    }

    Validation::all_vec(checks).map(|_| ())
}

impl<S: State, E: Event> StateMachine<S, E> {
    /// Report shadowed transitions and unreachable states.
    ///
    /// See [`validate_table`].
    pub fn validate(&self) -> Validation<(), NonEmptyVec<TableIssue<S, E>>> {
        validate_table(self)
    }
}
