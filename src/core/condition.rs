//! Conditions for late-bound transition branching.
//!
//! A condition is a zero-argument predicate handed to a conditional
//! transition. It is evaluated when the transition resolves, never when it is
//! registered, so it can read collaborator state that changes between
//! dispatches.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Predicate consulted by a conditional transition at resolution time.
///
/// The predicate is shared: cloning a `Condition` clones the handle, not the
/// closure, so one domain flag can back several transitions.
///
/// # Example
///
/// ```rust
/// use fsmkit::core::Condition;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let pedestrian = Arc::new(AtomicBool::new(false));
/// let waiting = Condition::from_flag(Arc::clone(&pedestrian));
///
/// assert!(!waiting.check());
/// pedestrian.store(true, Ordering::SeqCst);
/// assert!(waiting.check());
/// ```
#[derive(Clone)]
pub struct Condition {
    predicate: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl Condition {
    /// Create a condition from a closure.
    ///
    /// The closure must be thread-safe (Send + Sync). Any synchronization of
    /// the state it reads is the caller's business.
    ///
    /// The closure runs while the owning machine is being resolved. Under an
    /// [`ObservableController`](crate::controller::ObservableController) that
    /// means inside the machine's write lock, so it must not read that same
    /// [`SharedStateMachine`](crate::controller::SharedStateMachine).
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Condition {
            predicate: Arc::new(predicate),
        }
    }

    /// Condition backed by a shared atomic flag.
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self::new(move || flag.load(Ordering::SeqCst))
    }

    /// Evaluate the predicate once.
    pub fn check(&self) -> bool {
        (self.predicate)()
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").finish_non_exhaustive()
    }
}
