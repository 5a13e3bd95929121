//! fsmkit: a generic event-driven finite state machine engine
//!
//! A state machine holds a current state and an ordered table of transitions.
//! Events are resolved by first match over `(state, event)`; a conditional
//! transition picks its destination from a predicate evaluated at that
//! moment. Side effects live outside the machine, in one of two controller
//! disciplines.
//!
//! # Core Concepts
//!
//! - **State / Event**: identity traits, usually derived with
//!   [`state_enum!`] and [`event_enum!`]
//! - **Transition**: fixed or condition-dependent rule, see [`core::Target`]
//! - **Controller**: machine plus one exclusively owned action handler
//! - **ObservableController**: machine plus any number of weakly held
//!   observers
//! - **Pump**: serialized dispatch loop fed from many producers
//!
//! # Example
//!
//! ```rust
//! use fsmkit::builder::{StateMachineBuilder, TransitionBuilder};
//! use fsmkit::controller::{HistoryObserver, ObservableController};
//! use fsmkit::core::Condition;
//! use fsmkit::{event_enum, state_enum};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! state_enum! {
//!     enum Light { Green, Yellow, Red, WalkPrep }
//! }
//! event_enum! {
//!     enum Signal { TimeExpired }
//! }
//!
//! let pedestrian = Arc::new(AtomicBool::new(false));
//! let machine = StateMachineBuilder::new()
//!     .initial(Light::Green)
//!     .transition(TransitionBuilder::new().from(Light::Green).on(Signal::TimeExpired).to(Light::Yellow))?
//!     .transition(
//!         TransitionBuilder::new()
//!             .from(Light::Yellow)
//!             .on(Signal::TimeExpired)
//!             .to(Light::Red)
//!             .when(Condition::from_flag(Arc::clone(&pedestrian)), Light::WalkPrep),
//!     )?
//!     .build()?;
//!
//! let mut controller = ObservableController::new(machine);
//! let history = Arc::new(HistoryObserver::new());
//! controller.add_observer(&history);
//!
//! controller.dispatch(Signal::TimeExpired);
//! pedestrian.store(true, Ordering::SeqCst);
//! controller.dispatch(Signal::TimeExpired);
//!
//! assert_eq!(controller.current_state(), Light::WalkPrep);
//! assert_eq!(
//!     history.history().get_path(),
//!     vec![&Light::Green, &Light::Yellow, &Light::WalkPrep]
//! );
//! # Ok::<(), fsmkit::builder::BuildError>(())
//! ```

// Lets macro-generated serde derives name this crate the same way inside and
// outside of it.
extern crate self as fsmkit;

pub mod builder;
pub mod controller;
pub mod core;
pub mod domains;
pub mod pump;
pub mod services;
pub mod validation;

// Re-export commonly used types
pub use builder::{BuildError, StateMachineBuilder, TransitionBuilder};
pub use controller::{ActionHandler, Controller, Dispatch, ObservableController, Observer};
pub use core::{Condition, Event, Outcome, State, StateMachine, Transition};
pub use validation::TableIssue;

#[doc(hidden)]
pub use serde as __serde;
