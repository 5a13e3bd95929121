//! Core state machine types and logic.
//!
//! This module contains the engine itself:
//! - State and event identity traits
//! - Conditions for late-bound branching
//! - Transitions and the runtime state machine
//! - Dispatch history records
//!
//! Nothing here blocks or performs I/O.

mod condition;
mod history;
mod machine;
mod state;
mod transition;

pub use condition::Condition;
pub use history::{History, TransitionRecord};
pub use machine::{Outcome, StateMachine};
pub use state::{Event, State};
pub use transition::{Target, Transition};
