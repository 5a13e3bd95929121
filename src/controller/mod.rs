//! Controllers built on top of the state machine.
//!
//! Two disciplines, never mixed in one instance:
//!
//! - [`Controller`]: one exclusively owned [`ActionHandler`] sees every
//!   dispatch and may fail it.
//! - [`ObservableController`]: any number of weakly held [`Observer`]s are
//!   notified of every dispatch; their failures are isolated.
//!
//! Neither is internally synchronized. Drive a controller from one thread,
//! or hand it to an [`EventPump`](crate::pump::EventPump).

mod handler;
mod observable;
mod observer;
mod sync;

pub use handler::{handler_fn, ActionHandler, FnHandler};
pub use observable::{
    DispatchReport, ObservableController, ObserverFailure, SharedStateMachine, SubscriptionId,
};
pub use observer::{HistoryObserver, JournalObserver, LoggerObserver, Observer, ObserverError};
pub use sync::{Controller, Dispatched};

use std::fmt::Debug;

/// The single dispatch entry point shared by every controller.
///
/// Implemented by both disciplines and by domain controllers wrapping them,
/// so an event loop can drive any of them.
pub trait Dispatch<E>: Send + 'static {
    type Output: Debug;

    fn dispatch(&mut self, event: E) -> Self::Output;
}
