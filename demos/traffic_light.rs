//! Traffic Light Controller
//!
//! This example drives the synchronous traffic light by hand.
//!
//! Key concepts:
//! - One action handler owns display, timers and the pedestrian request
//! - The pedestrian request diverts yellow into the walk phase
//! - Timers are simulated: every armed timeout is printed, then expired
//!
//! Run with: cargo run --example traffic_light

use fsmkit::domains::traffic::{TrafficContext, TrafficLightController, TrafficLightType};
use fsmkit::services::{DisplayService, FunctionTimerService};

struct ConsoleDisplay;

impl DisplayService<TrafficContext> for ConsoleDisplay {
    fn show_state(&self, context: &TrafficContext) {
        let lamp = |on: bool| if on { "●" } else { "○" };
        println!(
            "  {:<13} car [{} {} {}]  walk [{} {}]  {}s",
            context.name,
            lamp(context.car.red),
            lamp(context.car.yellow),
            lamp(context.car.green),
            lamp(context.pedestrian.red),
            lamp(context.pedestrian.green),
            context.duration,
        );
    }
}

fn main() {
    println!("=== Traffic Light Controller ===\n");

    let timer = FunctionTimerService::new(|secs| println!("    (timer armed for {secs}s)"));
    let mut light = TrafficLightController::new(TrafficLightType::Standard, ConsoleDisplay, timer);
    light.start();

    println!("\nOne car cycle:");
    for _ in 0..4 {
        light.timer_expired();
    }

    println!("\nPedestrian presses the button during green:");
    light.button_pressed();
    light.button_pressed();
    for _ in 0..6 {
        light.timer_expired();
    }

    println!("\nFinal state: {:?}", light.current_state());
    println!("Pedestrian waiting: {}", light.has_pedestrian_request());

    println!("\n=== Example Complete ===");
}
