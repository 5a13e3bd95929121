//! Transition rules.
//!
//! A transition maps a `(from, trigger)` pair to a destination. The
//! destination is either fixed or chosen by a [`Condition`] when the
//! transition resolves.

use crate::core::condition::Condition;
use crate::core::state::{Event, State};

/// Where a matching transition leads.
#[derive(Clone, Debug)]
pub enum Target<S: State> {
    /// Always the same state.
    Fixed(S),

    /// `alternate` while the condition holds, `normal` otherwise.
    Branch {
        normal: S,
        alternate: S,
        condition: Condition,
    },
}

/// A rule mapping `(from, trigger)` to a destination state.
///
/// # Example
///
/// ```rust
/// use fsmkit::core::{Condition, Transition};
/// use fsmkit::{event_enum, state_enum};
///
/// state_enum! {
///     enum Light { Green, Yellow, Red, WalkPrep }
/// }
/// event_enum! {
///     enum Signal { TimeExpired }
/// }
///
/// let plain = Transition::unconditional(Light::Green, Signal::TimeExpired, Light::Yellow);
/// assert_eq!(plain.resolve(), Light::Yellow);
///
/// let branch = Transition::conditional(
///     Light::Yellow,
///     Signal::TimeExpired,
///     Light::Red,
///     Light::WalkPrep,
///     Condition::new(|| true),
/// );
/// assert!(branch.can_transition(&Light::Yellow, &Signal::TimeExpired));
/// assert_eq!(branch.resolve(), Light::WalkPrep);
/// ```
#[derive(Clone, Debug)]
pub struct Transition<S: State, E: Event> {
    from: S,
    trigger: E,
    target: Target<S>,
}

impl<S: State, E: Event> Transition<S, E> {
    /// Transition that always leads to `to`.
    pub fn unconditional(from: S, trigger: E, to: S) -> Self {
        Self {
            from,
            trigger,
            target: Target::Fixed(to),
        }
    }

    /// Transition that leads to `to_alternate` while `condition` holds and to
    /// `to_normal` otherwise.
    pub fn conditional(
        from: S,
        trigger: E,
        to_normal: S,
        to_alternate: S,
        condition: Condition,
    ) -> Self {
        Self {
            from,
            trigger,
            target: Target::Branch {
                normal: to_normal,
                alternate: to_alternate,
                condition,
            },
        }
    }

    pub fn from_state(&self) -> &S {
        &self.from
    }

    pub fn trigger(&self) -> &E {
        &self.trigger
    }

    pub fn target(&self) -> &Target<S> {
        &self.target
    }

    /// Check whether this rule applies to `(state, event)` (pure).
    ///
    /// Only identity is compared; the condition of a conditional transition
    /// plays no part in matching.
    pub fn can_transition(&self, state: &S, event: &E) -> bool {
        self.from == *state && self.trigger == *event
    }

    /// Destination of a transition already known to match.
    ///
    /// A conditional transition evaluates its condition exactly once per call.
    pub fn resolve(&self) -> S {
        match &self.target {
            Target::Fixed(to) => to.clone(),
            Target::Branch {
                normal,
                alternate,
                condition,
            } => {
                if condition.check() {
                    alternate.clone()
                } else {
                    normal.clone()
                }
            }
        }
    }

    /// Every state this transition may lead to.
    pub fn candidates(&self) -> Vec<&S> {
        match &self.target {
            Target::Fixed(to) => vec![to],
            Target::Branch {
                normal, alternate, ..
            } => vec![normal, alternate],
        }
    }

    pub fn is_conditional(&self) -> bool {
        matches!(self.target, Target::Branch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
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
            Stop,
        }
    }

    #[test]
    fn can_transition_matches_from_and_trigger() {
        let transition = Transition::unconditional(TestState::Start, TestEvent::Go, TestState::Middle);

        assert!(transition.can_transition(&TestState::Start, &TestEvent::Go));
        assert!(!transition.can_transition(&TestState::Middle, &TestEvent::Go));
        assert!(!transition.can_transition(&TestState::Start, &TestEvent::Stop));
    }

    #[test]
    fn unconditional_resolves_to_fixed_target() {
        let transition = Transition::unconditional(TestState::Start, TestEvent::Go, TestState::End);

        assert_eq!(transition.resolve(), TestState::End);
        assert_eq!(transition.resolve(), TestState::End);
        assert!(!transition.is_conditional());
    }

    #[test]
    fn conditional_matching_ignores_condition() {
        let transition = Transition::conditional(
            TestState::Start,
            TestEvent::Go,
            TestState::Middle,
            TestState::End,
            Condition::new(|| false),
        );

        assert!(transition.can_transition(&TestState::Start, &TestEvent::Go));
        assert!(transition.is_conditional());
    }

    #[test]
    fn conditional_resolves_at_call_time() {
        let flag = Arc::new(AtomicBool::new(false));
        let transition = Transition::conditional(
            TestState::Start,
            TestEvent::Go,
            TestState::Middle,
            TestState::End,
            Condition::from_flag(Arc::clone(&flag)),
        );

        assert_eq!(transition.resolve(), TestState::Middle);
        flag.store(true, Ordering::SeqCst);
        assert_eq!(transition.resolve(), TestState::End);
    }

    #[test]
    fn conditional_evaluates_condition_once_per_resolve() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let transition = Transition::conditional(
            TestState::Start,
            TestEvent::Go,
            TestState::Middle,
            TestState::End,
            Condition::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            }),
        );

        assert!(transition.can_transition(&TestState::Start, &TestEvent::Go));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        transition.resolve();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn candidates_list_every_target() {
        let fixed = Transition::unconditional(TestState::Start, TestEvent::Go, TestState::End);
        assert_eq!(fixed.candidates(), vec![&TestState::End]);

        let branch = Transition::conditional(
            TestState::Start,
            TestEvent::Go,
            TestState::Middle,
            TestState::End,
            Condition::new(|| true),
        );
        assert_eq!(branch.candidates(), vec![&TestState::Middle, &TestState::End]);
    }
}
