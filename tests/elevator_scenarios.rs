//! End-to-end elevator scenarios.

use fsmkit::domains::elevator::{
    build_machine, Cabin, CabinHandle, ElevatorContext, ElevatorController, ElevatorEvent,
    ElevatorState, ElevatorTimings, ElevatorType,
};
use fsmkit::pump::{event_channel, ChannelTimer};
use fsmkit::services::{DisplayService, FunctionTimerService, TracingDisplay};
use fsmkit::TableIssue;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stillwater::validation::Validation;

#[derive(Clone, Default)]
struct Panel {
    contexts: Arc<Mutex<Vec<ElevatorContext>>>,
}

impl DisplayService<ElevatorContext> for Panel {
    fn show_state(&self, context: &ElevatorContext) {
        self.contexts.lock().unwrap().push(context.clone());
    }
}

fn basic() -> ElevatorController<TracingDisplay, FunctionTimerService> {
    ElevatorController::new(
        ElevatorType::Basic,
        0,
        9,
        TracingDisplay,
        FunctionTimerService::new(|_| {}),
    )
}

#[test]
fn floor_request_while_idle_opens_doors() {
    let mut elevator = basic();

    let dispatched = elevator.request_floor(7).unwrap();

    assert_eq!(dispatched.from, ElevatorState::Idle);
    assert_eq!(dispatched.to, ElevatorState::DoorsOpening);
    assert!(elevator.has_pending_requests());
}

#[test]
fn serves_several_upward_requests_closest_first() {
    let mut elevator = basic();
    elevator.request_floor(6);
    elevator.request_floor(2);
    assert_eq!(elevator.target_floor(), 2);

    let mut visited = Vec::new();
    for _ in 0..2 {
        elevator.timer_expired();
        elevator.timer_expired();
        assert_eq!(elevator.timer_expired().to, ElevatorState::MovingUp);
        elevator.floor_reached();
        visited.push(elevator.current_floor());
    }

    assert_eq!(visited, vec![2, 6]);
    assert!(elevator.pending_requests().is_empty());
    assert_eq!(elevator.current_state(), ElevatorState::DoorsOpening);
}

#[test]
fn downward_trip_is_lost_to_the_first_closing_rule() {
    let mut elevator = basic();
    elevator.request_floor(5);
    for _ in 0..3 {
        elevator.timer_expired();
    }
    elevator.floor_reached();
    elevator.request_floor(3);

    elevator.timer_expired();
    elevator.timer_expired();
    let closing = elevator.timer_expired();

    assert_eq!(closing.to, ElevatorState::Idle);
    assert_eq!(elevator.current_floor(), 5);
    assert_eq!(elevator.pending_requests(), vec![3]);
}

#[test]
fn validation_flags_only_the_down_rule() {
    let cabin = CabinHandle::new(Cabin::new(0, 9));

    for kind in [ElevatorType::Basic, ElevatorType::Advanced] {
        let machine = build_machine(kind, &cabin);
        let Validation::Failure(issues) = machine.validate() else {
            panic!("expected a shadowed rule");
        };
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            issues.iter().next(),
            Some(TableIssue::Shadowed {
                from: ElevatorState::DoorsClosing,
                trigger: ElevatorEvent::TimerExpired,
                ..
            })
        ));
    }
}

#[test]
fn display_sees_live_cabin_data() {
    let panel = Panel::default();
    let mut elevator = ElevatorController::new(
        ElevatorType::Basic,
        -1,
        4,
        panel.clone(),
        FunctionTimerService::new(|_| {}),
    );

    elevator.request_floor(3);
    elevator.request_floor(-1);

    let contexts = panel.contexts.lock().unwrap();
    assert_eq!(contexts.len(), 2);
    assert_eq!(contexts[1].name, "DoorsOpening");
    assert_eq!(contexts[1].pending_requests, vec![-1, 3]);
    assert_eq!(contexts[1].target_floor, -1);
    assert!(contexts[1].movement.stopped);
}

#[test]
fn custom_timings_reach_the_timer() {
    let requested = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&requested);
    let timings = ElevatorTimings::from_json(r#"{"doors_opening": 1, "doors_open": 10}"#).unwrap();
    let mut elevator = ElevatorController::with_timings(
        ElevatorType::Advanced,
        0,
        3,
        timings,
        TracingDisplay,
        FunctionTimerService::new(move |secs| sink.lock().unwrap().push(secs)),
    );

    elevator.request_floor(1);
    elevator.timer_expired();

    assert_eq!(*requested.lock().unwrap(), vec![1, 10]);
}

#[tokio::test(start_paused = true)]
async fn pumped_elevator_completes_a_trip() {
    let (sender, queue) = event_channel();
    let timer = ChannelTimer::new(sender.clone(), ElevatorEvent::TimerExpired).unwrap();
    let mut elevator =
        ElevatorController::new(ElevatorType::Basic, 0, 9, TracingDisplay, timer);
    elevator.request_floor(4);

    let pump = queue.spawn(elevator).unwrap();
    // Opening 3s, open 5s, closing 3s: moving by t=11.
    tokio::time::sleep(Duration::from_secs(12)).await;
    sender.send(ElevatorEvent::FloorReached).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let elevator = pump.shutdown().await.unwrap();
    assert_eq!(elevator.current_floor(), 4);
    assert_eq!(elevator.current_state(), ElevatorState::DoorsOpening);
    assert!(!elevator.has_pending_requests());
}
