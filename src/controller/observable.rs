//! Publish/subscribe controller: one shared state machine, many observers.

use crate::controller::observer::{Observer, ObserverError};
use crate::controller::Dispatch;
use crate::core::{Event, State, StateMachine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Reference-counted handle to a state machine.
///
/// Lets controller-adjacent code read the current state while the
/// controller drives the machine.
#[derive(Debug)]
pub struct SharedStateMachine<S: State, E: Event> {
    inner: Arc<RwLock<StateMachine<S, E>>>,
}

impl<S: State, E: Event> Clone for SharedStateMachine<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: State, E: Event> SharedStateMachine<S, E> {
    pub fn new(machine: StateMachine<S, E>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(machine)),
        }
    }

    pub fn current_state(&self) -> S {
        self.read(|machine| machine.get_current_state())
    }

    /// Run `f` with shared access to the machine.
    pub fn read<R>(&self, f: impl FnOnce(&StateMachine<S, E>) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Run `f` with exclusive access to the machine.
    ///
    /// Conditions evaluated inside `f` must not lock this same machine.
    pub fn write<R>(&self, f: impl FnOnce(&mut StateMachine<S, E>) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

/// Token identifying one subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An observer that returned an error during a notification pass.
#[derive(Debug)]
pub struct ObserverFailure {
    pub subscription: SubscriptionId,
    pub error: ObserverError,
}

/// Summary of one observable dispatch.
#[derive(Debug)]
pub struct DispatchReport<S: State> {
    pub from: S,
    pub to: S,
    pub changed: bool,
    /// Live observers called during this pass, failures included.
    pub notified: usize,
    /// Expired subscriptions dropped before the pass.
    pub pruned: usize,
    pub failures: Vec<ObserverFailure>,
}

impl<S: State> DispatchReport<S> {
    /// True when every notified observer succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Subscription<S: State, E: Event> {
    id: SubscriptionId,
    observer: Weak<dyn Observer<S, E>>,
}

impl<S: State, E: Event> Subscription<S, E> {
    fn points_to(&self, address: *const ()) -> bool {
        self.observer.as_ptr() as *const () == address
    }
}

/// Couples a shared [`StateMachine`] with a list of non-owning observers.
///
/// Observers are held weakly: dropping the last `Arc` to an observer ends
/// its subscription, and the controller prunes it before the next
/// notification pass. Live observers are notified in subscription order,
/// exactly once per dispatch, whether or not the state changed.
///
/// # Example
///
/// ```rust
/// use fsmkit::controller::{HistoryObserver, ObservableController};
/// use fsmkit::core::{StateMachine, Transition};
/// use fsmkit::{event_enum, state_enum};
/// use std::sync::Arc;
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
/// let mut controller = ObservableController::new(machine);
/// let history = Arc::new(HistoryObserver::new());
/// controller.add_observer(&history);
///
/// controller.dispatch(Signal::ButtonPressed);
/// let report = controller.dispatch(Signal::TimeExpired);
///
/// assert!(report.changed);
/// assert_eq!(history.history().len(), 2);
///
/// drop(history);
/// assert_eq!(controller.dispatch(Signal::TimeExpired).pruned, 1);
/// ```
pub struct ObservableController<S: State, E: Event> {
    machine: SharedStateMachine<S, E>,
    observers: Vec<Subscription<S, E>>,
}

impl<S: State, E: Event> ObservableController<S, E> {
    pub fn new(machine: StateMachine<S, E>) -> Self {
        Self::with_shared(SharedStateMachine::new(machine))
    }

    pub fn with_shared(machine: SharedStateMachine<S, E>) -> Self {
        Self {
            machine,
            observers: Vec::new(),
        }
    }

    /// Subscribe `observer` without taking ownership of it.
    pub fn add_observer<O>(&mut self, observer: &Arc<O>) -> SubscriptionId
    where
        O: Observer<S, E> + 'static,
    {
        let shared: Arc<dyn Observer<S, E>> = observer.clone();
        self.subscribe(&shared)
    }

    /// Subscribe an already type-erased observer.
    pub fn subscribe(&mut self, observer: &Arc<dyn Observer<S, E>>) -> SubscriptionId {
        let id = SubscriptionId::generate();
        self.observers.push(Subscription {
            id,
            observer: Arc::downgrade(observer),
        });
        trace!(subscription = %id, "observer subscribed");
        id
    }

    /// Remove every subscription of `observer`, compared by identity.
    ///
    /// Returns false if it was not subscribed.
    pub fn remove_observer<O>(&mut self, observer: &Arc<O>) -> bool
    where
        O: Observer<S, E> + ?Sized,
    {
        let address = Arc::as_ptr(observer) as *const ();
        let before = self.observers.len();
        self.observers.retain(|s| !s.points_to(address));
        before != self.observers.len()
    }

    /// Remove the subscription identified by `id`.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|s| s.id != id);
        before != self.observers.len()
    }

    /// Process `event` and notify every live observer.
    ///
    /// Observer errors are collected in the report and logged; they never
    /// interrupt the pass.
    ///
    /// Conditions are evaluated while the machine's write lock is held. A
    /// condition that reads this controller's [`SharedStateMachine`]
    /// deadlocks; mirror the state it needs into a flag or mutex of its own.
    /// Observers run after the lock is released and may read the machine.
    pub fn dispatch(&mut self, event: E) -> DispatchReport<S> {
        let (from, to, changed) = self.machine.write(|machine| {
            let from = machine.get_current_state();
            let changed = machine.process_event(event.clone());
            let to = if changed {
                machine.get_current_state()
            } else {
                from.clone()
            };
            (from, to, changed)
        });

        let pruned = self.prune_expired();
        let live: Vec<(SubscriptionId, Arc<dyn Observer<S, E>>)> = self
            .observers
            .iter()
            .filter_map(|s| s.observer.upgrade().map(|o| (s.id, o)))
            .collect();

        debug!(
            from = from.name(),
            event = event.name(),
            to = to.name(),
            changed,
            observers = live.len(),
            "notifying observers"
        );

        let mut failures = Vec::new();
        for (subscription, observer) in &live {
            if let Err(error) = observer.on_state_transition(&from, &event, &to) {
                warn!(
                    subscription = %subscription,
                    event = event.name(),
                    error = %error,
                    "observer failed"
                );
                failures.push(ObserverFailure {
                    subscription: *subscription,
                    error,
                });
            }
        }

        DispatchReport {
            from,
            to,
            changed,
            notified: live.len(),
            pruned,
            failures,
        }
    }

    fn prune_expired(&mut self) -> usize {
        let before = self.observers.len();
        self.observers.retain(|s| s.observer.strong_count() > 0);
        let pruned = before - self.observers.len();
        if pruned > 0 {
            trace!(pruned, "dropped expired observers");
        }
        pruned
    }

    pub fn current_state(&self) -> S {
        self.machine.current_state()
    }

    /// Another handle to the machine this controller drives.
    pub fn state_machine(&self) -> SharedStateMachine<S, E> {
        self.machine.clone()
    }

    /// Number of subscriptions whose observer is still alive.
    pub fn observer_count(&self) -> usize {
        self.observers
            .iter()
            .filter(|s| s.observer.strong_count() > 0)
            .count()
    }
}

impl<S: State, E: Event> Dispatch<E> for ObservableController<S, E> {
    type Output = DispatchReport<S>;

    fn dispatch(&mut self, event: E) -> Self::Output {
        ObservableController::dispatch(self, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::HistoryObserver;
    use crate::core::{Condition, Transition};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    crate::state_enum! {
        enum Lamp {
            Off,
            On,
        }
    }

    crate::event_enum! {
        enum Switch {
            Flip,
            Tap,
        }
    }

    fn lamp() -> StateMachine<Lamp, Switch> {
        let mut machine = StateMachine::new(Lamp::Off);
        machine.add_transition(Transition::unconditional(Lamp::Off, Switch::Flip, Lamp::On));
        machine.add_transition(Transition::unconditional(Lamp::On, Switch::Flip, Lamp::Off));
        machine
    }

    #[derive(Default)]
    struct Counter {
        calls: AtomicUsize,
    }

    impl Observer<Lamp, Switch> for Counter {
        fn on_state_transition(&self, _: &Lamp, _: &Switch, _: &Lamp) -> Result<(), ObserverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl Observer<Lamp, Switch> for Failing {
        fn on_state_transition(&self, _: &Lamp, _: &Switch, _: &Lamp) -> Result<(), ObserverError> {
            Err(ObserverError::new("display offline"))
        }
    }

    struct Ordered {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Observer<Lamp, Switch> for Ordered {
        fn on_state_transition(&self, _: &Lamp, _: &Switch, _: &Lamp) -> Result<(), ObserverError> {
            self.log.lock().unwrap().push(self.label);
            Ok(())
        }
    }

    #[test]
    fn observers_notified_even_without_change() {
        let mut controller = ObservableController::new(lamp());
        let counter = Arc::new(Counter::default());
        controller.add_observer(&counter);

        let report = controller.dispatch(Switch::Tap);

        assert!(!report.changed);
        assert_eq!(report.from, Lamp::Off);
        assert_eq!(report.to, Lamp::Off);
        assert_eq!(report.notified, 1);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observers_notified_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::new(Ordered {
            label: "first",
            log: Arc::clone(&log),
        });
        let second = Arc::new(Ordered {
            label: "second",
            log: Arc::clone(&log),
        });
        let mut controller = ObservableController::new(lamp());
        controller.add_observer(&first);
        controller.add_observer(&second);

        controller.dispatch(Switch::Flip);
        controller.dispatch(Switch::Flip);

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "first", "second"]);
    }

    #[test]
    fn remove_observer_takes_effect_immediately() {
        let mut controller = ObservableController::new(lamp());
        let counter = Arc::new(Counter::default());
        controller.add_observer(&counter);

        controller.dispatch(Switch::Flip);
        assert!(controller.remove_observer(&counter));
        controller.dispatch(Switch::Flip);

        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert!(!controller.remove_observer(&counter));
    }

    #[test]
    fn remove_observer_leaves_other_observers() {
        let mut controller = ObservableController::new(lamp());
        let kept = Arc::new(Counter::default());
        let removed = Arc::new(Counter::default());
        controller.add_observer(&kept);
        controller.add_observer(&removed);

        controller.remove_observer(&removed);
        controller.dispatch(Switch::Flip);

        assert_eq!(kept.calls.load(Ordering::SeqCst), 1);
        assert_eq!(removed.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_by_token() {
        let mut controller = ObservableController::new(lamp());
        let counter = Arc::new(Counter::default());
        let id = controller.add_observer(&counter);

        assert!(controller.unsubscribe(id));
        assert!(!controller.unsubscribe(id));
        controller.dispatch(Switch::Flip);

        assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_observer_is_pruned_silently() {
        let mut controller = ObservableController::new(lamp());
        let survivor = Arc::new(Counter::default());
        let doomed = Arc::new(Counter::default());
        controller.add_observer(&survivor);
        controller.add_observer(&doomed);
        assert_eq!(controller.observer_count(), 2);

        drop(doomed);
        let report = controller.dispatch(Switch::Flip);

        assert_eq!(report.pruned, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(controller.observer_count(), 1);
        assert_eq!(survivor.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_observer_does_not_block_others() {
        let mut controller = ObservableController::new(lamp());
        let failing = Arc::new(Failing);
        let counter = Arc::new(Counter::default());
        let failing_id = controller.add_observer(&failing);
        controller.add_observer(&counter);

        let report = controller.dispatch(Switch::Flip);

        assert!(!report.is_clean());
        assert_eq!(report.notified, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].subscription, failing_id);
        assert_eq!(report.failures[0].error.message(), "display offline");
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller.current_state(), Lamp::On);
    }

    #[test]
    fn shared_machine_visible_to_observers_and_callers() {
        let mut controller = ObservableController::new(lamp());
        let shared = controller.state_machine();
        let history = Arc::new(HistoryObserver::new());
        controller.add_observer(&history);

        controller.dispatch(Switch::Flip);

        assert_eq!(shared.current_state(), Lamp::On);
        assert_eq!(shared.read(|m| m.transitions().len()), 2);
        assert_eq!(history.history().get_path(), vec![&Lamp::Off, &Lamp::On]);
    }

    struct Mirror {
        machine: SharedStateMachine<Lamp, Switch>,
        lit: Arc<AtomicBool>,
    }

    impl Observer<Lamp, Switch> for Mirror {
        fn on_state_transition(&self, _: &Lamp, _: &Switch, _: &Lamp) -> Result<(), ObserverError> {
            let lit = self.machine.current_state() == Lamp::On;
            self.lit.store(lit, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn conditions_read_state_mirrored_by_observers() {
        let lit = Arc::new(AtomicBool::new(false));
        let mut machine = lamp();
        machine.add_transition(Transition::conditional(
            Lamp::On,
            Switch::Tap,
            Lamp::On,
            Lamp::Off,
            Condition::from_flag(Arc::clone(&lit)),
        ));
        let mut controller = ObservableController::new(machine);
        let mirror = Arc::new(Mirror {
            machine: controller.state_machine(),
            lit: Arc::clone(&lit),
        });
        controller.add_observer(&mirror);

        controller.dispatch(Switch::Flip);
        assert!(lit.load(Ordering::SeqCst));

        let report = controller.dispatch(Switch::Tap);
        assert_eq!(report.to, Lamp::Off);
        assert!(!lit.load(Ordering::SeqCst));
    }

    #[test]
    fn subscribe_accepts_type_erased_observers() {
        let mut controller = ObservableController::new(lamp());
        let counter = Arc::new(Counter::default());
        let erased: Arc<dyn Observer<Lamp, Switch>> = counter.clone();

        controller.subscribe(&erased);
        controller.dispatch(Switch::Flip);
        assert!(controller.remove_observer(&erased));

        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }
}
