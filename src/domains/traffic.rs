//! Traffic light with a pedestrian crossing.
//!
//! The car cycle is `CarGreen -> CarYellow -> CarRed -> CarRedYellow ->
//! CarGreen`, all on [`TrafficEvent::TimeExpired`]. A pending pedestrian
//! request diverts `CarYellow` into the walk phase instead of `CarRed`.
//!
//! Two controllers are provided:
//!
//! - [`TrafficLightController`]: synchronous, one
//!   [`TrafficLightActionHandler`] does display, timers and request tracking.
//! - [`TrafficController`]: observable, the same work split across
//!   [`PedestrianObserver`], [`TimerObserver`] and [`DisplayObserver`].

use crate::controller::{
    ActionHandler, Controller, Dispatch, DispatchReport, Dispatched, ObservableController,
    Observer, ObserverError, SubscriptionId,
};
use crate::core::{Condition, Event, State, StateMachine, Transition};
use crate::domains::ConfigError;
use crate::services::{DisplayService, TimerService};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info};

crate::state_enum! {
    /// Phases of the crossing.
    pub enum TrafficState {
        CarGreen,
        CarYellow,
        CarRed,
        WalkPrep,
        Walk,
        WalkFinish,
        CarRedYellow,
    }
}

crate::event_enum! {
    pub enum TrafficEvent {
        TimeExpired,
        ButtonPressed,
    }
}

/// Phase durations in seconds.
///
/// Missing fields fall back to the defaults when loaded from JSON.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightTimings {
    pub red: u32,
    pub red_yellow: u32,
    pub green: u32,
    pub yellow: u32,
    pub walk: u32,
    pub walk_prep: u32,
    pub walk_finish: u32,
}

impl Default for LightTimings {
    fn default() -> Self {
        Self {
            red: 8,
            red_yellow: 2,
            green: 10,
            yellow: 2,
            walk: 5,
            walk_prep: 1,
            walk_finish: 2,
        }
    }
}

impl LightTimings {
    /// Parse timings from JSON, e.g. `{"green": 20, "walk": 8}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn duration(&self, state: TrafficState) -> u32 {
        match state {
            TrafficState::CarGreen => self.green,
            TrafficState::CarYellow => self.yellow,
            TrafficState::CarRed => self.red,
            TrafficState::WalkPrep => self.walk_prep,
            TrafficState::Walk => self.walk,
            TrafficState::WalkFinish => self.walk_finish,
            TrafficState::CarRedYellow => self.red_yellow,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarLights {
    pub red: bool,
    pub yellow: bool,
    pub green: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedestrianLights {
    pub red: bool,
    pub green: bool,
}

impl Default for PedestrianLights {
    fn default() -> Self {
        Self {
            red: true,
            green: false,
        }
    }
}

/// What a display shows for one phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficContext {
    pub name: String,
    pub duration: u32,
    pub car: CarLights,
    pub pedestrian: PedestrianLights,
}

impl TrafficContext {
    pub fn for_state(state: TrafficState, timings: &LightTimings) -> Self {
        let (red, yellow, green) = match state {
            TrafficState::CarGreen => (false, false, true),
            TrafficState::CarYellow => (false, true, false),
            TrafficState::CarRedYellow => (true, true, false),
            TrafficState::CarRed
            | TrafficState::WalkPrep
            | TrafficState::Walk
            | TrafficState::WalkFinish => (true, false, false),
        };
        let walking = state == TrafficState::Walk;

        Self {
            name: state.name().to_string(),
            duration: timings.duration(state),
            car: CarLights { red, yellow, green },
            pedestrian: PedestrianLights {
                red: !walking,
                green: walking,
            },
        }
    }
}

/// Which transition table to build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficLightType {
    /// Full cycle with a red-yellow phase before green.
    #[default]
    Standard,
    /// No red-yellow phase; yellow lasts `yellow + red_yellow` instead.
    Simple,
}

/// Shared "a pedestrian is waiting" flag.
///
/// The same flag backs the conditional `CarYellow` transition and whatever
/// component registers button presses, so the machine sees a request the
/// moment it is made.
#[derive(Clone, Debug, Default)]
pub struct PedestrianRequest {
    pending: Arc<AtomicBool>,
}

impl PedestrianRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request. Returns false if one was already pending.
    pub fn register(&self) -> bool {
        !self.pending.swap(true, Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Condition that holds while a request is pending.
    pub fn condition(&self) -> Condition {
        Condition::from_flag(Arc::clone(&self.pending))
    }
}

/// Transition table for `kind`, diverting to the walk phase on `request`.
pub fn transitions(
    kind: TrafficLightType,
    request: &PedestrianRequest,
) -> Vec<Transition<TrafficState, TrafficEvent>> {
    use TrafficEvent::TimeExpired;
    use TrafficState::*;

    let after_red = match kind {
        TrafficLightType::Standard => CarRedYellow,
        TrafficLightType::Simple => CarGreen,
    };

    let mut table = vec![
        Transition::unconditional(CarGreen, TimeExpired, CarYellow),
        Transition::conditional(CarYellow, TimeExpired, CarRed, WalkPrep, request.condition()),
        Transition::unconditional(CarRed, TimeExpired, after_red),
    ];
    if kind == TrafficLightType::Standard {
        table.push(Transition::unconditional(CarRedYellow, TimeExpired, CarGreen));
    }
    table.extend([
        Transition::unconditional(WalkPrep, TimeExpired, Walk),
        Transition::unconditional(Walk, TimeExpired, WalkFinish),
        Transition::unconditional(WalkFinish, TimeExpired, after_red),
    ]);
    table
}

/// A machine starting in `CarGreen` with the table for `kind`.
pub fn build_machine(
    kind: TrafficLightType,
    request: &PedestrianRequest,
) -> StateMachine<TrafficState, TrafficEvent> {
    let mut machine = StateMachine::new(TrafficState::CarGreen);
    for transition in transitions(kind, request) {
        machine.add_transition(transition);
    }
    machine
}

/// Per-state durations, adjusted for `kind`.
fn durations(kind: TrafficLightType, timings: &LightTimings) -> BTreeMap<TrafficState, u32> {
    let mut durations: BTreeMap<TrafficState, u32> = ALL_STATES
        .iter()
        .map(|state| (*state, timings.duration(*state)))
        .collect();
    if kind == TrafficLightType::Simple {
        durations.insert(TrafficState::CarYellow, timings.yellow + timings.red_yellow);
    }
    durations
}

const ALL_STATES: [TrafficState; 7] = [
    TrafficState::CarGreen,
    TrafficState::CarYellow,
    TrafficState::CarRed,
    TrafficState::WalkPrep,
    TrafficState::Walk,
    TrafficState::WalkFinish,
    TrafficState::CarRedYellow,
];

/// Action handler of the synchronous traffic light.
///
/// A button press only registers the pedestrian request. Any other event
/// shows the context of the resulting state and arms the timer with its
/// duration, including when the state did not change.
pub struct TrafficLightActionHandler<D, T> {
    request: PedestrianRequest,
    display: D,
    timer: T,
    contexts: BTreeMap<TrafficState, TrafficContext>,
}

impl<D, T> TrafficLightActionHandler<D, T>
where
    D: DisplayService<TrafficContext>,
    T: TimerService,
{
    pub fn new(request: PedestrianRequest, display: D, timer: T, timings: &LightTimings) -> Self {
        let contexts = ALL_STATES
            .iter()
            .map(|state| (*state, TrafficContext::for_state(*state, timings)))
            .collect();
        Self {
            request,
            display,
            timer,
            contexts,
        }
    }

    pub fn set_state_timeout(&mut self, state: TrafficState, duration_secs: u32) {
        if let Some(context) = self.contexts.get_mut(&state) {
            context.duration = duration_secs;
        }
    }

    pub fn configure_state(&mut self, state: TrafficState, context: TrafficContext) {
        self.contexts.insert(state, context);
    }

    pub fn context(&self, state: TrafficState) -> Option<&TrafficContext> {
        self.contexts.get(&state)
    }

    pub fn has_pedestrian_request(&self) -> bool {
        self.request.is_pending()
    }

    fn button_pressed(&self) {
        if self.request.register() {
            info!("pedestrian request registered");
        } else {
            info!("pedestrian request already waiting");
        }
    }
}

impl<D, T> ActionHandler<TrafficState, TrafficEvent> for TrafficLightActionHandler<D, T>
where
    D: DisplayService<TrafficContext>,
    T: TimerService,
{
    type Error = Infallible;

    fn handle(
        &mut self,
        from: &TrafficState,
        event: &TrafficEvent,
        to: &TrafficState,
    ) -> Result<(), Infallible> {
        if *event == TrafficEvent::ButtonPressed {
            self.button_pressed();
            return Ok(());
        }
        if *to == TrafficState::WalkFinish {
            self.request.clear();
        }

        debug!(from = from.name(), event = event.name(), to = to.name(), "transition");
        if let Some(context) = self.contexts.get(to) {
            self.display.show_state(context);
            self.timer.start_timeout(context.duration);
        }
        Ok(())
    }
}

fn settled<S: crate::core::State>(result: Result<Dispatched<S>, Infallible>) -> Dispatched<S> {
    match result {
        Ok(dispatched) => dispatched,
        Err(never) => match never {},
    }
}

/// Traffic light driven by a single action handler.
///
/// # Example
///
/// ```rust
/// use fsmkit::domains::traffic::{TrafficLightController, TrafficLightType, TrafficState};
/// use fsmkit::services::{FunctionTimerService, TracingDisplay};
///
/// let mut light = TrafficLightController::new(
///     TrafficLightType::Standard,
///     TracingDisplay,
///     FunctionTimerService::new(|_| {}),
/// );
///
/// light.button_pressed();
/// light.timer_expired();
/// light.timer_expired();
/// assert_eq!(light.current_state(), TrafficState::WalkPrep);
/// ```
pub struct TrafficLightController<D, T>
where
    D: DisplayService<TrafficContext>,
    T: TimerService,
{
    inner: Controller<TrafficState, TrafficEvent, TrafficLightActionHandler<D, T>>,
}

impl<D, T> TrafficLightController<D, T>
where
    D: DisplayService<TrafficContext>,
    T: TimerService,
{
    pub fn new(kind: TrafficLightType, display: D, timer: T) -> Self {
        Self::with_timings(kind, LightTimings::default(), display, timer)
    }

    pub fn with_timings(kind: TrafficLightType, timings: LightTimings, display: D, timer: T) -> Self {
        let request = PedestrianRequest::new();
        let machine = build_machine(kind, &request);
        let mut handler = TrafficLightActionHandler::new(request, display, timer, &timings);
        for (state, duration) in durations(kind, &timings) {
            handler.set_state_timeout(state, duration);
        }
        Self {
            inner: Controller::new(machine, handler),
        }
    }

    /// Show the initial state and arm its timer.
    pub fn start(&mut self) {
        let state = self.current_state();
        let handler = self.inner.handler_mut();
        if let Some(context) = handler.contexts.get(&state) {
            handler.display.show_state(context);
            handler.timer.start_timeout(context.duration);
        }
    }

    pub fn button_pressed(&mut self) -> Dispatched<TrafficState> {
        settled(self.inner.dispatch(TrafficEvent::ButtonPressed))
    }

    pub fn timer_expired(&mut self) -> Dispatched<TrafficState> {
        settled(self.inner.dispatch(TrafficEvent::TimeExpired))
    }

    pub fn current_state(&self) -> TrafficState {
        self.inner.current_state()
    }

    pub fn has_pedestrian_request(&self) -> bool {
        self.inner.handler().has_pedestrian_request()
    }

    pub fn handler(&self) -> &TrafficLightActionHandler<D, T> {
        self.inner.handler()
    }

    pub fn state_machine(&self) -> &StateMachine<TrafficState, TrafficEvent> {
        self.inner.state_machine()
    }
}

impl<D, T> Dispatch<TrafficEvent> for TrafficLightController<D, T>
where
    D: DisplayService<TrafficContext> + 'static,
    T: TimerService + 'static,
{
    type Output = Dispatched<TrafficState>;

    fn dispatch(&mut self, event: TrafficEvent) -> Self::Output {
        settled(self.inner.dispatch(event))
    }
}

/// Tracks pedestrian requests for the observable traffic light.
///
/// Registers a request on every button press and clears it when the walk
/// phase ends. Its [`PedestrianRequest`] backs the controller's conditional
/// transition.
#[derive(Debug, Default)]
pub struct PedestrianObserver {
    request: PedestrianRequest,
    requested_at: Mutex<Option<Instant>>,
}

impl PedestrianObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) -> &PedestrianRequest {
        &self.request
    }

    pub fn has_request(&self) -> bool {
        self.request.is_pending()
    }

    pub fn clear_request(&self) {
        self.request.clear();
        *self.requested_at.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn waited_ms(&self) -> u128 {
        self.requested_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|at| at.elapsed().as_millis())
            .unwrap_or_default()
    }
}

impl Observer<TrafficState, TrafficEvent> for PedestrianObserver {
    fn on_state_transition(
        &self,
        from: &TrafficState,
        event: &TrafficEvent,
        to: &TrafficState,
    ) -> Result<(), ObserverError> {
        if *event == TrafficEvent::ButtonPressed {
            if self.request.register() {
                *self.requested_at.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(Instant::now());
                debug!("pedestrian request registered");
            } else {
                debug!(waited_ms = self.waited_ms(), "pedestrian request already pending");
            }
            return Ok(());
        }

        if *from == TrafficState::Walk && *to != TrafficState::Walk && self.has_request() {
            debug!(waited_ms = self.waited_ms(), "walk phase ended, clearing request");
            self.clear_request();
        }
        if from != to && *to == TrafficState::Walk && self.has_request() {
            debug!(waited_ms = self.waited_ms(), "pedestrians may walk");
        }
        Ok(())
    }
}

/// Arms the timer with the new state's duration on every real change.
pub struct TimerObserver<T> {
    timer: T,
    durations: Mutex<BTreeMap<TrafficState, u32>>,
}

impl<T: TimerService> TimerObserver<T> {
    pub fn new(timer: T) -> Self {
        Self::with_timings(timer, &LightTimings::default())
    }

    pub fn with_timings(timer: T, timings: &LightTimings) -> Self {
        Self {
            timer,
            durations: Mutex::new(durations(TrafficLightType::Standard, timings)),
        }
    }

    /// Override one state's duration. Zero disables its timer.
    pub fn set_duration(&self, state: TrafficState, duration_secs: u32) {
        self.durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(state, duration_secs);
    }

    pub fn duration(&self, state: TrafficState) -> Option<u32> {
        self.durations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&state)
            .copied()
    }
}

impl<T: TimerService> Observer<TrafficState, TrafficEvent> for TimerObserver<T> {
    fn on_state_transition(
        &self,
        from: &TrafficState,
        _event: &TrafficEvent,
        to: &TrafficState,
    ) -> Result<(), ObserverError> {
        if from == to {
            return Ok(());
        }
        match self.duration(*to) {
            Some(duration) if duration > 0 => self.timer.start_timeout(duration),
            _ => {}
        }
        Ok(())
    }
}

/// Shows the new state's context on every real change.
pub struct DisplayObserver<D> {
    display: D,
    contexts: BTreeMap<TrafficState, TrafficContext>,
}

impl<D: DisplayService<TrafficContext>> DisplayObserver<D> {
    pub fn new(display: D) -> Self {
        Self::with_timings(display, &LightTimings::default())
    }

    pub fn with_timings(display: D, timings: &LightTimings) -> Self {
        let contexts = ALL_STATES
            .iter()
            .map(|state| (*state, TrafficContext::for_state(*state, timings)))
            .collect();
        Self { display, contexts }
    }
}

impl<D: DisplayService<TrafficContext>> Observer<TrafficState, TrafficEvent> for DisplayObserver<D> {
    fn on_state_transition(
        &self,
        from: &TrafficState,
        _event: &TrafficEvent,
        to: &TrafficState,
    ) -> Result<(), ObserverError> {
        if from != to {
            if let Some(context) = self.contexts.get(to) {
                self.display.show_state(context);
            }
        }
        Ok(())
    }
}

/// Traffic light whose side effects are observers.
///
/// # Example
///
/// ```rust
/// use fsmkit::controller::HistoryObserver;
/// use fsmkit::domains::traffic::{PedestrianObserver, TrafficController, TrafficLightType, TrafficState};
/// use std::sync::Arc;
///
/// let pedestrian = Arc::new(PedestrianObserver::new());
/// let history = Arc::new(HistoryObserver::new());
/// let mut light = TrafficController::new(TrafficLightType::Standard, &pedestrian);
/// light.add_observer(&history);
///
/// light.button_pressed();
/// light.timer_expired();
/// light.timer_expired();
///
/// assert_eq!(light.current_state(), TrafficState::WalkPrep);
/// assert_eq!(history.history().len(), 3);
/// ```
pub struct TrafficController {
    inner: ObservableController<TrafficState, TrafficEvent>,
}

impl TrafficController {
    /// Build the table for `kind` around `pedestrian`'s request flag and
    /// subscribe `pedestrian`.
    pub fn new(kind: TrafficLightType, pedestrian: &Arc<PedestrianObserver>) -> Self {
        let mut controller = Self::with_machine(build_machine(kind, pedestrian.request()));
        controller.add_observer(pedestrian);
        controller
    }

    pub fn with_machine(machine: StateMachine<TrafficState, TrafficEvent>) -> Self {
        Self {
            inner: ObservableController::new(machine),
        }
    }

    pub fn button_pressed(&mut self) -> DispatchReport<TrafficState> {
        self.inner.dispatch(TrafficEvent::ButtonPressed)
    }

    pub fn timer_expired(&mut self) -> DispatchReport<TrafficState> {
        self.inner.dispatch(TrafficEvent::TimeExpired)
    }

    pub fn current_state(&self) -> TrafficState {
        self.inner.current_state()
    }

    pub fn add_observer<O>(&mut self, observer: &Arc<O>) -> SubscriptionId
    where
        O: Observer<TrafficState, TrafficEvent> + 'static,
    {
        self.inner.add_observer(observer)
    }

    pub fn remove_observer<O>(&mut self, observer: &Arc<O>) -> bool
    where
        O: Observer<TrafficState, TrafficEvent> + ?Sized,
    {
        self.inner.remove_observer(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observer_count()
    }
}

impl Dispatch<TrafficEvent> for TrafficController {
    type Output = DispatchReport<TrafficState>;

    fn dispatch(&mut self, event: TrafficEvent) -> Self::Output {
        self.inner.dispatch(event)
    }
}
