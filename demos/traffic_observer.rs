//! Observable Traffic Light on an Event Pump
//!
//! This example runs the observable traffic light on tokio. Timeouts come
//! back as events through the pump, and a simulated pedestrian presses the
//! button from another task.
//!
//! Key concepts:
//! - Observers split the side effects (timer, display, logging, journal)
//! - One serialized dispatch loop fed by several producers
//! - Structured logging via tracing
//!
//! Run with: RUST_LOG=debug cargo run --example traffic_observer

use fsmkit::controller::{JournalObserver, LoggerObserver};
use fsmkit::domains::traffic::{
    DisplayObserver, LightTimings, PedestrianObserver, TimerObserver, TrafficController,
    TrafficEvent, TrafficLightType,
};
use fsmkit::pump::{event_channel, ChannelTimer};
use fsmkit::services::TracingDisplay;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Fast timings so the demo finishes in a few seconds.
    let timings = LightTimings::from_json(
        r#"{"red": 1, "red_yellow": 1, "green": 2, "yellow": 1, "walk": 2, "walk_prep": 1, "walk_finish": 1}"#,
    )?;

    let (sender, queue) = event_channel();
    let timer = ChannelTimer::new(sender.clone(), TrafficEvent::TimeExpired)?;

    let pedestrian = Arc::new(PedestrianObserver::new());
    let timers = Arc::new(TimerObserver::with_timings(timer, &timings));
    let display = Arc::new(DisplayObserver::with_timings(TracingDisplay, &timings));
    let logger = Arc::new(LoggerObserver::with_prefix("crossing"));
    let journal = Arc::new(JournalObserver::new(std::io::stdout()));
    journal.mark("SESSION_START")?;

    let mut light = TrafficController::new(TrafficLightType::Standard, &pedestrian);
    light.add_observer(&timers);
    light.add_observer(&display);
    light.add_observer(&logger);
    light.add_observer(&journal);

    let pump = queue.spawn(light)?;
    pump.send(TrafficEvent::TimeExpired)?;

    let button = pump.sender();
    let walker = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        button.send(TrafficEvent::ButtonPressed)
    });
    walker.await??;

    tokio::time::sleep(Duration::from_secs(10)).await;
    let light = pump.shutdown().await?;
    journal.mark("SESSION_END")?;

    println!("Final state: {:?}", light.current_state());
    Ok(())
}
