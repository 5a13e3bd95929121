//! Elevator Controller
//!
//! This example walks an elevator through a trip, an obstacle and an
//! emergency stop.
//!
//! Key concepts:
//! - Conditions reading shared cabin state (pending requests, direction)
//! - Closest-floor request scheduling
//! - Table diagnostics: the shadowed move-down rule
//!
//! Run with: cargo run --example elevator

use fsmkit::domains::elevator::{
    build_machine, Cabin, CabinHandle, ElevatorContext, ElevatorController, ElevatorType,
};
use fsmkit::services::{DisplayService, FunctionTimerService};
use stillwater::validation::Validation;

struct Panel;

impl DisplayService<ElevatorContext> for Panel {
    fn show_state(&self, context: &ElevatorContext) {
        println!(
            "  {:<14} floor {:>2} -> {:>2}  pending {:?}{}{}",
            context.name,
            context.current_floor,
            context.target_floor,
            context.pending_requests,
            if context.emergency_active { "  EMERGENCY" } else { "" },
            if context.obstacle_detected { "  OBSTACLE" } else { "" },
        );
    }
}

fn main() {
    println!("=== Elevator Controller ===\n");

    let timer = FunctionTimerService::new(|secs| println!("    (timer armed for {secs}s)"));
    let mut elevator = ElevatorController::new(ElevatorType::Advanced, 0, 9, Panel, timer);

    println!("Requests for floors 3 and 7:");
    elevator.request_floor(3);
    elevator.request_floor(7);
    elevator.timer_expired();
    elevator.timer_expired();

    println!("\nObstacle while the doors close:");
    elevator.obstacle_detected();
    elevator.timer_expired();
    elevator.timer_expired();
    elevator.timer_expired();

    println!("\nTravel:");
    elevator.floor_reached();

    println!("\nOut-of-range request is ignored: {:?}", elevator.request_floor(42));

    println!("\nOn to floor 7:");
    for _ in 0..3 {
        elevator.timer_expired();
    }
    elevator.floor_reached();

    println!("\nBack to idle, then emergency:");
    for _ in 0..3 {
        elevator.timer_expired();
    }
    elevator.emergency_stop();
    elevator.timer_expired();

    println!("\nFinal state: {:?}", elevator.current_state());

    println!("\nTable diagnostics:");
    let machine = build_machine(ElevatorType::Basic, &CabinHandle::new(Cabin::new(0, 9)));
    match machine.validate() {
        Validation::Success(_) => println!("  no issues"),
        Validation::Failure(issues) => {
            for issue in issues.iter() {
                println!("  {issue}");
            }
        }
    }

    println!("\n=== Example Complete ===");
}
