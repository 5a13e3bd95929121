//! Builder for constructing transitions.

use crate::builder::error::BuildError;
use crate::core::{Condition, Event, State, Transition};

/// Builder for constructing transitions with a fluent API.
///
/// `.to()` sets the destination taken when no condition is attached, or
/// when the attached condition is false. `.when()` turns the transition into
/// a branch that goes to `alternate` while the condition holds.
pub struct TransitionBuilder<S: State, E: Event> {
    from: Option<S>,
    trigger: Option<E>,
    to: Option<S>,
    branch: Option<(Condition, S)>,
}

impl<S: State, E: Event> TransitionBuilder<S, E> {
    /// Create a new transition builder.
    pub fn new() -> Self {
        Self {
            from: None,
            trigger: None,
            to: None,
            branch: None,
        }
    }

    /// Set the source state (required).
    pub fn from(mut self, state: S) -> Self {
        self.from = Some(state);
        self
    }

    /// Set the triggering event (required).
    pub fn on(mut self, event: E) -> Self {
        self.trigger = Some(event);
        self
    }

    /// Set the target state (required).
    pub fn to(mut self, state: S) -> Self {
        self.to = Some(state);
        self
    }

    /// Go to `alternate` instead of the `.to()` state while `condition` holds.
    pub fn when(mut self, condition: Condition, alternate: S) -> Self {
        self.branch = Some((condition, alternate));
        self
    }

    /// Like [`when`](Self::when), taking a closure.
    pub fn when_fn<F>(self, predicate: F, alternate: S) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.when(Condition::new(predicate), alternate)
    }

    /// Build the transition.
    pub fn build(self) -> Result<Transition<S, E>, BuildError> {
        let from = self.from.ok_or(BuildError::MissingFromState)?;
        let trigger = self.trigger.ok_or(BuildError::MissingTrigger)?;
        let to = self.to.ok_or(BuildError::MissingToState)?;

        Ok(match self.branch {
            Some((condition, alternate)) => {
                Transition::conditional(from, trigger, to, alternate, condition)
            }
            None => Transition::unconditional(from, trigger, to),
        })
    }
}

impl<S: State, E: Event> Default for TransitionBuilder<S, E> {
    fn default() -> Self {
        Self::new()
    }
}
