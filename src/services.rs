//! Collaborator contracts consumed by handlers and observers.
//!
//! The core never calls these itself. Action handlers and observers use them
//! to arm timeouts and render state.

use std::fmt::Debug;
use std::sync::Arc;
use tracing::info;

/// Schedules a timeout. Fire-and-forget; there is no cancellation.
pub trait TimerService: Send + Sync {
    fn start_timeout(&self, duration_secs: u32);
}

impl<T: TimerService + ?Sized> TimerService for Arc<T> {
    fn start_timeout(&self, duration_secs: u32) {
        (**self).start_timeout(duration_secs)
    }
}

impl<T: TimerService + ?Sized> TimerService for Box<T> {
    fn start_timeout(&self, duration_secs: u32) {
        (**self).start_timeout(duration_secs)
    }
}

/// Renders a domain context.
pub trait DisplayService<C>: Send + Sync {
    fn show_state(&self, context: &C);
}

impl<C, T: DisplayService<C> + ?Sized> DisplayService<C> for Arc<T> {
    fn show_state(&self, context: &C) {
        (**self).show_state(context)
    }
}

impl<C, T: DisplayService<C> + ?Sized> DisplayService<C> for Box<T> {
    fn show_state(&self, context: &C) {
        (**self).show_state(context)
    }
}

/// Timer service that forwards every request to a closure.
///
/// # Example
///
/// ```rust
/// use fsmkit::services::{FunctionTimerService, TimerService};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let last = Arc::new(AtomicU32::new(0));
/// let sink = Arc::clone(&last);
/// let timer = FunctionTimerService::new(move |secs| sink.store(secs, Ordering::SeqCst));
///
/// timer.start_timeout(10);
/// assert_eq!(last.load(Ordering::SeqCst), 10);
/// ```
pub struct FunctionTimerService {
    timer_fn: Box<dyn Fn(u32) + Send + Sync>,
}

impl FunctionTimerService {
    pub fn new<F>(timer_fn: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        Self {
            timer_fn: Box::new(timer_fn),
        }
    }
}

impl TimerService for FunctionTimerService {
    fn start_timeout(&self, duration_secs: u32) {
        (self.timer_fn)(duration_secs)
    }
}

/// Display service that logs each context at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDisplay;

impl<C: Debug> DisplayService<C> for TracingDisplay {
    fn show_state(&self, context: &C) {
        info!(?context, "display");
    }
}
