//! Action handlers: the single side-effect callback of the synchronous
//! controller.

use crate::core::{Event, State};
use std::marker::PhantomData;

/// Callback invoked after every dispatched event.
///
/// `from` is the state before the event and `to` the state after it; they are
/// equal when the event was rejected or resolved to the current state. The
/// handler decides whether that matters.
///
/// Errors are propagated to the caller of
/// [`Controller::dispatch`](crate::controller::Controller::dispatch)
/// untouched. Handlers that cannot fail use [`std::convert::Infallible`].
pub trait ActionHandler<S: State, E: Event>: Send {
    type Error;

    fn handle(&mut self, from: &S, event: &E, to: &S) -> Result<(), Self::Error>;
}

/// Action handler backed by a closure. Built with [`handler_fn`].
pub struct FnHandler<F, Err> {
    f: F,
    _error: PhantomData<fn() -> Err>,
}

/// Wrap a closure as an [`ActionHandler`].
///
/// # Example
///
/// ```rust
/// use fsmkit::controller::{handler_fn, ActionHandler};
/// use fsmkit::{event_enum, state_enum};
/// use std::convert::Infallible;
///
/// state_enum! {
///     enum Light { Green, Yellow }
/// }
/// event_enum! {
///     enum Signal { TimeExpired }
/// }
///
/// let mut seen = Vec::new();
/// let mut handler = handler_fn(|from: &Light, _: &Signal, to: &Light| {
///     seen.push((*from, *to));
///     Ok::<(), Infallible>(())
/// });
/// handler.handle(&Light::Green, &Signal::TimeExpired, &Light::Yellow).unwrap();
/// drop(handler);
/// assert_eq!(seen, vec![(Light::Green, Light::Yellow)]);
/// ```
pub fn handler_fn<S, E, F, Err>(f: F) -> FnHandler<F, Err>
where
    S: State,
    E: Event,
    F: FnMut(&S, &E, &S) -> Result<(), Err> + Send,
{
    FnHandler {
        f,
        _error: PhantomData,
    }
}

impl<S, E, F, Err> ActionHandler<S, E> for FnHandler<F, Err>
where
    S: State,
    E: Event,
    F: FnMut(&S, &E, &S) -> Result<(), Err> + Send,
{
    type Error = Err;

    fn handle(&mut self, from: &S, event: &E, to: &S) -> Result<(), Err> {
        (self.f)(from, event, to)
    }
}
