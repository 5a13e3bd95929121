//! Builder API for ergonomic state machine construction.
//!
//! This module provides fluent builders and macros for creating state machines
//! with minimal boilerplate while maintaining type safety.

pub mod error;
pub mod machine;
pub mod macros;
pub mod transition;

pub use error::BuildError;
pub use machine::StateMachineBuilder;
pub use transition::TransitionBuilder;

use crate::core::{Condition, Event, State, Transition};

/// Create an unconditional transition.
///
/// # Example
///
/// ```
/// use fsmkit::builder::simple_transition;
/// use fsmkit::{event_enum, state_enum};
///
/// state_enum! {
///     enum MyState { Start, End }
/// }
/// event_enum! {
///     enum MyEvent { Go }
/// }
///
/// let transition = simple_transition(MyState::Start, MyEvent::Go, MyState::End);
/// assert_eq!(transition.resolve(), MyState::End);
/// ```
pub fn simple_transition<S: State, E: Event>(from: S, trigger: E, to: S) -> Transition<S, E> {
    Transition::unconditional(from, trigger, to)
}

/// Create a transition whose destination depends on a predicate.
///
/// Leads to `alternate` while `predicate` returns true, `normal` otherwise.
///
/// # Example
///
/// ```
/// use fsmkit::builder::conditional_transition;
/// use fsmkit::{event_enum, state_enum};
///
/// state_enum! {
///     enum MyState { Start, Middle, End }
/// }
/// event_enum! {
///     enum MyEvent { Go }
/// }
///
/// let transition = conditional_transition(
///     MyState::Start,
///     MyEvent::Go,
///     MyState::Middle,
///     MyState::End,
///     || false,
/// );
/// assert_eq!(transition.resolve(), MyState::Middle);
/// ```
pub fn conditional_transition<S, E, F>(
    from: S,
    trigger: E,
    normal: S,
    alternate: S,
    predicate: F,
) -> Transition<S, E>
where
    S: State,
    E: Event,
    F: Fn() -> bool + Send + Sync + 'static,
{
    Transition::conditional(from, trigger, normal, alternate, Condition::new(predicate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    crate::state_enum! {
        enum TestState {
            Start,
            Middle,
            End,
        }
    }

    crate::event_enum! {
        enum TestEvent {
            Go,
        }
    }

    #[test]
    fn simple_transition_builds() {
        let transition = simple_transition(TestState::Start, TestEvent::Go, TestState::Middle);

        assert_eq!(transition.from_state(), &TestState::Start);
        assert!(transition.can_transition(&TestState::Start, &TestEvent::Go));
        assert!(!transition.can_transition(&TestState::End, &TestEvent::Go));
    }

    #[test]
    fn conditional_transition_respects_predicate() {
        let skip = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&skip);
        let transition = conditional_transition(
            TestState::Start,
            TestEvent::Go,
            TestState::Middle,
            TestState::End,
            move || flag.load(Ordering::SeqCst),
        );

        assert_eq!(transition.resolve(), TestState::Middle);
        skip.store(true, Ordering::SeqCst);
        assert_eq!(transition.resolve(), TestState::End);
    }
}
