//! Synchronous controller: one state machine, one action handler.

use crate::controller::handler::ActionHandler;
use crate::controller::Dispatch;
use crate::core::{Event, State, StateMachine};
use std::fmt::Debug;
use tracing::debug;

/// Result of a successful synchronous dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dispatched<S: State> {
    pub from: S,
    pub to: S,
    pub changed: bool,
}

/// Couples one [`StateMachine`] with one [`ActionHandler`].
///
/// Every event goes through [`dispatch`](Self::dispatch): the machine
/// processes it, then the handler sees `(old, event, new)` whether or not the
/// state changed.
///
/// # Example
///
/// ```rust
/// use fsmkit::controller::{handler_fn, Controller};
/// use fsmkit::core::{StateMachine, Transition};
/// use fsmkit::{event_enum, state_enum};
/// use std::convert::Infallible;
///
/// state_enum! {
///     enum Light { Green, Yellow }
/// }
/// event_enum! {
///     enum Signal { TimeExpired, ButtonPressed }
/// }
///
/// let mut machine = StateMachine::new(Light::Green);
/// machine.add_transition(Transition::unconditional(Light::Green, Signal::TimeExpired, Light::Yellow));
///
/// let mut calls = 0;
/// let handler = handler_fn(|_: &Light, _: &Signal, _: &Light| {
///     calls += 1;
///     Ok::<(), Infallible>(())
/// });
/// let mut controller = Controller::new(machine, handler);
///
/// let rejected = controller.dispatch(Signal::ButtonPressed).unwrap();
/// assert!(!rejected.changed);
/// let moved = controller.dispatch(Signal::TimeExpired).unwrap();
/// assert_eq!(moved.to, Light::Yellow);
/// drop(controller);
/// assert_eq!(calls, 2);
/// ```
pub struct Controller<S: State, E: Event, H: ActionHandler<S, E>> {
    machine: StateMachine<S, E>,
    handler: H,
}

impl<S: State, E: Event, H: ActionHandler<S, E>> Controller<S, E, H> {
    pub fn new(machine: StateMachine<S, E>, handler: H) -> Self {
        Self { machine, handler }
    }

    /// Process `event` and hand `(old, event, new)` to the action handler.
    ///
    /// The state change is committed before the handler runs. A handler
    /// error is returned as is; the machine stays in the new state.
    pub fn dispatch(&mut self, event: E) -> Result<Dispatched<S>, H::Error> {
        let from = self.machine.get_current_state();
        let changed = self.machine.process_event(event.clone());
        let to = if changed {
            self.machine.get_current_state()
        } else {
            from.clone()
        };

        debug!(
            from = from.name(),
            event = event.name(),
            to = to.name(),
            changed,
            "invoking action handler"
        );
        self.handler.handle(&from, &event, &to)?;

        Ok(Dispatched { from, to, changed })
    }

    pub fn current_state(&self) -> S {
        self.machine.get_current_state()
    }

    pub fn state_machine(&self) -> &StateMachine<S, E> {
        &self.machine
    }

    /// Mutable access to the machine, for setup.
    pub fn state_machine_mut(&mut self) -> &mut StateMachine<S, E> {
        &mut self.machine
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_parts(self) -> (StateMachine<S, E>, H) {
        (self.machine, self.handler)
    }
}

impl<S, E, H> Dispatch<E> for Controller<S, E, H>
where
    S: State,
    E: Event,
    H: ActionHandler<S, E> + 'static,
    H::Error: Debug,
{
    type Output = Result<Dispatched<S>, H::Error>;

    fn dispatch(&mut self, event: E) -> Self::Output {
        Controller::dispatch(self, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Condition, Transition};
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    crate::state_enum! {
        enum Door {
            Closed,
            Open,
            Locked,
        }
    }

    crate::event_enum! {
        enum DoorEvent {
            Push,
            Lock,
            Knock,
        }
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(Door, DoorEvent, Door)>,
    }

    impl ActionHandler<Door, DoorEvent> for Recorder {
        type Error = Infallible;

        fn handle(&mut self, from: &Door, event: &DoorEvent, to: &Door) -> Result<(), Infallible> {
            self.calls.push((*from, *event, *to));
            Ok(())
        }
    }

    #[derive(Debug, PartialEq)]
    struct Jammed;

    struct FailingHandler;

    impl ActionHandler<Door, DoorEvent> for FailingHandler {
        type Error = Jammed;

        fn handle(&mut self, _: &Door, _: &DoorEvent, _: &Door) -> Result<(), Jammed> {
            Err(Jammed)
        }
    }

    fn door_machine() -> StateMachine<Door, DoorEvent> {
        let mut machine = StateMachine::new(Door::Closed);
        machine.add_transition(Transition::unconditional(Door::Closed, DoorEvent::Push, Door::Open));
        machine.add_transition(Transition::unconditional(Door::Open, DoorEvent::Push, Door::Closed));
        machine.add_transition(Transition::unconditional(Door::Closed, DoorEvent::Lock, Door::Locked));
        machine
    }

    #[test]
    fn handler_sees_every_dispatch() {
        let mut controller = Controller::new(door_machine(), Recorder::default());

        controller.dispatch(DoorEvent::Knock).unwrap();
        controller.dispatch(DoorEvent::Push).unwrap();
        controller.dispatch(DoorEvent::Lock).unwrap();

        assert_eq!(
            controller.handler().calls,
            vec![
                (Door::Closed, DoorEvent::Knock, Door::Closed),
                (Door::Closed, DoorEvent::Push, Door::Open),
                (Door::Open, DoorEvent::Lock, Door::Open),
            ]
        );
    }

    #[test]
    fn dispatch_reports_change() {
        let mut controller = Controller::new(door_machine(), Recorder::default());

        let result = controller.dispatch(DoorEvent::Push).unwrap();
        assert_eq!(
            result,
            Dispatched {
                from: Door::Closed,
                to: Door::Open,
                changed: true,
            }
        );

        let result = controller.dispatch(DoorEvent::Knock).unwrap();
        assert!(!result.changed);
        assert_eq!(result.from, result.to);
    }

    #[test]
    fn handler_error_propagates_after_commit() {
        let mut controller = Controller::new(door_machine(), FailingHandler);

        let result = controller.dispatch(DoorEvent::Push);

        assert_eq!(result, Err(Jammed));
        assert_eq!(controller.current_state(), Door::Open);
    }

    #[test]
    fn conditional_branch_reads_shared_flag() {
        let bolted = Arc::new(AtomicBool::new(false));
        let mut machine = StateMachine::new(Door::Open);
        machine.add_transition(Transition::conditional(
            Door::Open,
            DoorEvent::Push,
            Door::Closed,
            Door::Locked,
            Condition::from_flag(Arc::clone(&bolted)),
        ));
        let mut controller = Controller::new(machine, Recorder::default());

        bolted.store(true, Ordering::SeqCst);
        controller.dispatch(DoorEvent::Push).unwrap();

        assert_eq!(controller.current_state(), Door::Locked);
    }

    #[test]
    fn into_parts_returns_machine_and_handler() {
        let mut controller = Controller::new(door_machine(), Recorder::default());
        controller.dispatch(DoorEvent::Push).unwrap();

        let (machine, handler) = controller.into_parts();

        assert_eq!(machine.get_current_state(), Door::Open);
        assert_eq!(handler.calls.len(), 1);
    }
}
