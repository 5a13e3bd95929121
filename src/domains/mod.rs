//! Reference consumers of the engine.
//!
//! - [`traffic`]: a pedestrian-aware traffic light, in both controller
//!   disciplines.
//! - [`elevator`]: a single-cabin elevator with a floor request queue.

pub mod elevator;
pub mod traffic;

use thiserror::Error;

/// Errors raised when loading a domain timing table.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid timing configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
