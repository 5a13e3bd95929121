//! Single-cabin elevator.
//!
//! The cabin (floors and pending requests) lives behind a shared lock so the
//! conditional transitions can read it while the controller updates it
//! between dispatches. The controller never holds the cabin lock while the
//! machine resolves an event.

use crate::controller::{ActionHandler, Controller, Dispatch, Dispatched};
use crate::core::{Condition, Event, State, StateMachine, Transition};
use crate::domains::ConfigError;
use crate::services::{DisplayService, TimerService};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

crate::state_enum! {
    pub enum ElevatorState {
        /// Standing still, doors closed.
        Idle,
        DoorsOpening,
        DoorsOpen,
        DoorsClosing,
        MovingUp,
        MovingDown,
        EmergencyStop,
    }
}

crate::event_enum! {
    pub enum ElevatorEvent {
        FloorRequested,
        DoorsOpenRequested,
        DoorsCloseRequested,
        TimerExpired,
        FloorReached,
        EmergencyButton,
        ObstacleDetected,
    }
}

/// Phase durations in seconds. Zero means no timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevatorTimings {
    pub doors_opening: u32,
    pub doors_open: u32,
    pub doors_closing: u32,
    pub floor_travel: u32,
    pub emergency: u32,
    pub idle: u32,
    /// Reopening delay after an obstacle.
    pub obstacle_retry: u32,
}

impl Default for ElevatorTimings {
    fn default() -> Self {
        Self {
            doors_opening: 3,
            doors_open: 5,
            doors_closing: 3,
            floor_travel: 4,
            emergency: 30,
            idle: 0,
            obstacle_retry: 2,
        }
    }
}

impl ElevatorTimings {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn duration(&self, state: ElevatorState) -> u32 {
        match state {
            ElevatorState::Idle => self.idle,
            ElevatorState::DoorsOpening => self.doors_opening,
            ElevatorState::DoorsOpen => self.doors_open,
            ElevatorState::DoorsClosing => self.doors_closing,
            ElevatorState::MovingUp | ElevatorState::MovingDown => self.floor_travel,
            ElevatorState::EmergencyStop => self.emergency,
        }
    }
}

/// Floor position and request queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cabin {
    current_floor: i32,
    target_floor: i32,
    pending: BTreeSet<i32>,
    min_floor: i32,
    max_floor: i32,
}

impl Cabin {
    /// Cabin serving `min_floor..=max_floor`, parked at floor 0 or the
    /// nearest served floor.
    pub fn new(min_floor: i32, max_floor: i32) -> Self {
        let (min_floor, max_floor) = if min_floor <= max_floor {
            (min_floor, max_floor)
        } else {
            (max_floor, min_floor)
        };
        let start = 0_i32.clamp(min_floor, max_floor);
        Self {
            current_floor: start,
            target_floor: start,
            pending: BTreeSet::new(),
            min_floor,
            max_floor,
        }
    }

    pub fn current_floor(&self) -> i32 {
        self.current_floor
    }

    pub fn target_floor(&self) -> i32 {
        self.target_floor
    }

    pub fn pending_requests(&self) -> Vec<i32> {
        self.pending.iter().copied().collect()
    }

    pub fn has_pending_requests(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn should_move_up(&self) -> bool {
        self.target_floor > self.current_floor
    }

    pub fn should_move_down(&self) -> bool {
        self.target_floor < self.current_floor
    }

    pub fn serves(&self, floor: i32) -> bool {
        (self.min_floor..=self.max_floor).contains(&floor)
    }

    /// Queue `floor`. Out-of-range floors and the current floor are ignored.
    pub fn request(&mut self, floor: i32) -> bool {
        if !self.serves(floor) || floor == self.current_floor {
            return false;
        }
        self.pending.insert(floor);
        self.retarget();
        true
    }

    /// Arrive at the target floor and pick the next one.
    pub fn arrive(&mut self) {
        self.current_floor = self.target_floor;
        self.pending.remove(&self.current_floor);
        self.retarget();
    }

    pub fn clear_requests(&mut self) {
        self.pending.clear();
        self.target_floor = self.current_floor;
    }

    /// Closest pending floor; the lower one on ties.
    fn retarget(&mut self) {
        let current = self.current_floor;
        self.target_floor = self
            .pending
            .iter()
            .copied()
            .min_by_key(|floor| floor.abs_diff(current))
            .unwrap_or(current);
    }
}

/// Shared handle to a [`Cabin`].
#[derive(Clone, Debug)]
pub struct CabinHandle {
    cabin: Arc<Mutex<Cabin>>,
}

impl CabinHandle {
    pub fn new(cabin: Cabin) -> Self {
        Self {
            cabin: Arc::new(Mutex::new(cabin)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Cabin> {
        self.cabin.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Cabin {
        self.lock().clone()
    }

    /// Condition reading the cabin through `predicate` at resolution time.
    pub fn condition<F>(&self, predicate: F) -> Condition
    where
        F: Fn(&Cabin) -> bool + Send + Sync + 'static,
    {
        let handle = self.clone();
        Condition::new(move || predicate(&handle.lock()))
    }
}

/// Which transition table to build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElevatorType {
    #[default]
    Basic,
    /// Basic plus obstacle handling on the doors.
    Advanced,
}

/// Transition table for `kind`.
///
/// The basic table registers two `DoorsClosing`/`TimerExpired` rules, up
/// first and down second. The first always matches, so the down rule never
/// fires: a cabin whose target is below goes back to `Idle`.
pub fn transitions(
    kind: ElevatorType,
    cabin: &CabinHandle,
) -> Vec<Transition<ElevatorState, ElevatorEvent>> {
    use ElevatorEvent::*;
    use ElevatorState::*;

    let mut table = vec![
        Transition::conditional(
            Idle,
            FloorRequested,
            DoorsOpening,
            DoorsOpening,
            cabin.condition(Cabin::has_pending_requests),
        ),
        Transition::unconditional(DoorsOpening, TimerExpired, DoorsOpen),
        Transition::unconditional(DoorsOpen, TimerExpired, DoorsClosing),
        Transition::unconditional(DoorsOpen, DoorsCloseRequested, DoorsClosing),
        Transition::conditional(
            DoorsClosing,
            TimerExpired,
            Idle,
            MovingUp,
            cabin.condition(Cabin::should_move_up),
        ),
        Transition::conditional(
            DoorsClosing,
            TimerExpired,
            Idle,
            MovingDown,
            cabin.condition(Cabin::should_move_down),
        ),
        Transition::unconditional(MovingUp, FloorReached, DoorsOpening),
        Transition::unconditional(MovingDown, FloorReached, DoorsOpening),
        Transition::unconditional(Idle, EmergencyButton, EmergencyStop),
        Transition::unconditional(EmergencyStop, TimerExpired, Idle),
    ];
    if kind == ElevatorType::Advanced {
        table.extend([
            Transition::unconditional(DoorsClosing, ObstacleDetected, DoorsOpening),
            Transition::unconditional(DoorsOpening, ObstacleDetected, DoorsOpening),
        ]);
    }
    table
}

pub fn build_machine(
    kind: ElevatorType,
    cabin: &CabinHandle,
) -> StateMachine<ElevatorState, ElevatorEvent> {
    let mut machine = StateMachine::new(ElevatorState::Idle);
    for transition in transitions(kind, cabin) {
        machine.add_transition(transition);
    }
    machine
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doors {
    pub open: bool,
    pub opening: bool,
    pub closing: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub up: bool,
    pub down: bool,
    pub stopped: bool,
}

/// What a display shows for the elevator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElevatorContext {
    pub name: String,
    pub duration: u32,
    pub doors: Doors,
    pub movement: Movement,
    pub current_floor: i32,
    pub target_floor: i32,
    pub pending_requests: Vec<i32>,
    pub emergency_active: bool,
    pub obstacle_detected: bool,
}

impl ElevatorContext {
    /// Static part of the context for `state`; live fields are zeroed.
    pub fn template(state: ElevatorState, timings: &ElevatorTimings) -> Self {
        let doors = match state {
            ElevatorState::DoorsOpening => Doors {
                opening: true,
                ..Doors::default()
            },
            ElevatorState::DoorsOpen => Doors {
                open: true,
                ..Doors::default()
            },
            ElevatorState::DoorsClosing => Doors {
                closing: true,
                ..Doors::default()
            },
            _ => Doors::default(),
        };
        let movement = Movement {
            up: state == ElevatorState::MovingUp,
            down: state == ElevatorState::MovingDown,
            stopped: !matches!(state, ElevatorState::MovingUp | ElevatorState::MovingDown),
        };

        Self {
            name: state.name().to_string(),
            duration: timings.duration(state),
            doors,
            movement,
            current_floor: 0,
            target_floor: 0,
            pending_requests: Vec::new(),
            emergency_active: false,
            obstacle_detected: false,
        }
    }
}

const ALL_STATES: [ElevatorState; 7] = [
    ElevatorState::Idle,
    ElevatorState::DoorsOpening,
    ElevatorState::DoorsOpen,
    ElevatorState::DoorsClosing,
    ElevatorState::MovingUp,
    ElevatorState::MovingDown,
    ElevatorState::EmergencyStop,
];

/// Action handler of the elevator.
///
/// Tracks the emergency and obstacle flags, shows the resulting state with
/// live cabin data, and arms the timer when that state has a duration.
pub struct ElevatorActionHandler<D, T> {
    cabin: CabinHandle,
    display: D,
    timer: T,
    templates: BTreeMap<ElevatorState, ElevatorContext>,
    obstacle_retry: u32,
    emergency_active: bool,
    obstacle_present: bool,
}

impl<D, T> ElevatorActionHandler<D, T>
where
    D: DisplayService<ElevatorContext>,
    T: TimerService,
{
    pub fn new(cabin: CabinHandle, display: D, timer: T, timings: &ElevatorTimings) -> Self {
        let templates = ALL_STATES
            .iter()
            .map(|state| (*state, ElevatorContext::template(*state, timings)))
            .collect();
        Self {
            cabin,
            display,
            timer,
            templates,
            obstacle_retry: timings.obstacle_retry,
            emergency_active: false,
            obstacle_present: false,
        }
    }

    pub fn set_state_timeout(&mut self, state: ElevatorState, duration_secs: u32) {
        if let Some(template) = self.templates.get_mut(&state) {
            template.duration = duration_secs;
        }
    }

    pub fn is_emergency_active(&self) -> bool {
        self.emergency_active
    }

    pub fn is_obstacle_present(&self) -> bool {
        self.obstacle_present
    }

    /// Context for `state` filled with the current cabin data.
    pub fn context(&self, state: ElevatorState) -> Option<ElevatorContext> {
        let mut context = self.templates.get(&state)?.clone();
        let cabin = self.cabin.lock();
        context.current_floor = cabin.current_floor();
        context.target_floor = cabin.target_floor();
        context.pending_requests = cabin.pending_requests();
        context.emergency_active = self.emergency_active;
        context.obstacle_detected = self.obstacle_present;
        Some(context)
    }

    fn track_flags(&mut self, from: ElevatorState, event: ElevatorEvent) {
        match event {
            ElevatorEvent::EmergencyButton => self.emergency_active = true,
            ElevatorEvent::ObstacleDetected => self.obstacle_present = true,
            ElevatorEvent::TimerExpired => {
                if from == ElevatorState::EmergencyStop {
                    self.emergency_active = false;
                }
                if matches!(from, ElevatorState::DoorsOpening | ElevatorState::DoorsClosing) {
                    self.obstacle_present = false;
                }
            }
            _ => {}
        }
    }
}

impl<D, T> ActionHandler<ElevatorState, ElevatorEvent> for ElevatorActionHandler<D, T>
where
    D: DisplayService<ElevatorContext>,
    T: TimerService,
{
    type Error = Infallible;

    fn handle(
        &mut self,
        from: &ElevatorState,
        event: &ElevatorEvent,
        to: &ElevatorState,
    ) -> Result<(), Infallible> {
        self.track_flags(*from, *event);

        let Some(context) = self.context(*to) else {
            return Ok(());
        };
        debug!(
            from = from.name(),
            event = event.name(),
            to = to.name(),
            floor = context.current_floor,
            target = context.target_floor,
            "elevator transition"
        );
        self.display.show_state(&context);

        let duration = if *event == ElevatorEvent::ObstacleDetected
            && *to == ElevatorState::DoorsOpening
        {
            self.obstacle_retry
        } else {
            context.duration
        };
        if duration > 0 {
            self.timer.start_timeout(duration);
        }
        Ok(())
    }
}

/// Elevator driven by an [`ElevatorActionHandler`].
///
/// # Example
///
/// ```rust
/// use fsmkit::domains::elevator::{ElevatorController, ElevatorState, ElevatorType};
/// use fsmkit::services::{FunctionTimerService, TracingDisplay};
///
/// let mut elevator = ElevatorController::new(
///     ElevatorType::Basic,
///     0,
///     9,
///     TracingDisplay,
///     FunctionTimerService::new(|_| {}),
/// );
///
/// elevator.request_floor(4);
/// assert_eq!(elevator.current_state(), ElevatorState::DoorsOpening);
/// assert_eq!(elevator.target_floor(), 4);
/// ```
pub struct ElevatorController<D, T>
where
    D: DisplayService<ElevatorContext>,
    T: TimerService,
{
    inner: Controller<ElevatorState, ElevatorEvent, ElevatorActionHandler<D, T>>,
    cabin: CabinHandle,
}

impl<D, T> ElevatorController<D, T>
where
    D: DisplayService<ElevatorContext>,
    T: TimerService,
{
    pub fn new(kind: ElevatorType, min_floor: i32, max_floor: i32, display: D, timer: T) -> Self {
        Self::with_timings(
            kind,
            min_floor,
            max_floor,
            ElevatorTimings::default(),
            display,
            timer,
        )
    }

    pub fn with_timings(
        kind: ElevatorType,
        min_floor: i32,
        max_floor: i32,
        timings: ElevatorTimings,
        display: D,
        timer: T,
    ) -> Self {
        let cabin = CabinHandle::new(Cabin::new(min_floor, max_floor));
        let machine = build_machine(kind, &cabin);
        let handler = ElevatorActionHandler::new(cabin.clone(), display, timer, &timings);
        Self {
            inner: Controller::new(machine, handler),
            cabin,
        }
    }

    /// Queue `floor` and dispatch `FloorRequested`.
    ///
    /// Returns `None` without dispatching when the floor is out of range or
    /// is the current floor.
    pub fn request_floor(&mut self, floor: i32) -> Option<Dispatched<ElevatorState>> {
        let accepted = self.cabin.lock().request(floor);
        if !accepted {
            debug!(floor, "floor request ignored");
            return None;
        }
        Some(self.fire(ElevatorEvent::FloorRequested))
    }

    pub fn open_doors(&mut self) -> Dispatched<ElevatorState> {
        self.fire(ElevatorEvent::DoorsOpenRequested)
    }

    pub fn close_doors(&mut self) -> Dispatched<ElevatorState> {
        self.fire(ElevatorEvent::DoorsCloseRequested)
    }

    /// Drop every pending request, then dispatch `EmergencyButton`.
    pub fn emergency_stop(&mut self) -> Dispatched<ElevatorState> {
        self.cabin.lock().clear_requests();
        self.fire(ElevatorEvent::EmergencyButton)
    }

    pub fn timer_expired(&mut self) -> Dispatched<ElevatorState> {
        self.fire(ElevatorEvent::TimerExpired)
    }

    /// Arrive at the target floor, then dispatch `FloorReached`.
    pub fn floor_reached(&mut self) -> Dispatched<ElevatorState> {
        self.cabin.lock().arrive();
        self.fire(ElevatorEvent::FloorReached)
    }

    pub fn obstacle_detected(&mut self) -> Dispatched<ElevatorState> {
        self.fire(ElevatorEvent::ObstacleDetected)
    }

    pub fn current_state(&self) -> ElevatorState {
        self.inner.current_state()
    }

    pub fn current_floor(&self) -> i32 {
        self.cabin.lock().current_floor()
    }

    pub fn target_floor(&self) -> i32 {
        self.cabin.lock().target_floor()
    }

    pub fn pending_requests(&self) -> Vec<i32> {
        self.cabin.lock().pending_requests()
    }

    pub fn has_pending_requests(&self) -> bool {
        self.cabin.lock().has_pending_requests()
    }

    pub fn cabin(&self) -> Cabin {
        self.cabin.snapshot()
    }

    pub fn handler(&self) -> &ElevatorActionHandler<D, T> {
        self.inner.handler()
    }

    pub fn state_machine(&self) -> &StateMachine<ElevatorState, ElevatorEvent> {
        self.inner.state_machine()
    }

    fn fire(&mut self, event: ElevatorEvent) -> Dispatched<ElevatorState> {
        match self.inner.dispatch(event) {
            Ok(dispatched) => dispatched,
            Err(never) => match never {},
        }
    }
}

/// Raw `FloorReached` and `EmergencyButton` events update the cabin as
/// their named entry points do. Other events are dispatched as they are.
impl<D, T> Dispatch<ElevatorEvent> for ElevatorController<D, T>
where
    D: DisplayService<ElevatorContext> + 'static,
    T: TimerService + 'static,
{
    type Output = Dispatched<ElevatorState>;

    fn dispatch(&mut self, event: ElevatorEvent) -> Self::Output {
        match event {
            ElevatorEvent::FloorReached => self.floor_reached(),
            ElevatorEvent::EmergencyButton => self.emergency_stop(),
            other => self.fire(other),
        }
    }
}
