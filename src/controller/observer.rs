//! Observers: the publish/subscribe side-effect callbacks.

use crate::controller::handler::ActionHandler;
use crate::core::{Event, History, State, TransitionRecord};
use chrono::Utc;
use std::convert::Infallible;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// Failure reported by an observer.
///
/// The observable controller isolates these: one failing observer never
/// stops the others from being notified.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ObserverError {
    message: String,
}

impl ObserverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for ObserverError {
    fn from(err: std::io::Error) -> Self {
        Self::new(format!("I/O error: {err}"))
    }
}

/// Subscriber notified of every dispatch of an
/// [`ObservableController`](crate::controller::ObservableController).
///
/// Observers are shared (`&self`); implementations keep their mutable state
/// behind atomics or locks.
pub trait Observer<S: State, E: Event>: Send + Sync {
    fn on_state_transition(&self, from: &S, event: &E, to: &S) -> Result<(), ObserverError>;
}

/// Collects a [`History`] of every dispatch it sees.
///
/// Works both as an observer and as an action handler.
#[derive(Debug)]
pub struct HistoryObserver<S, E> {
    history: Mutex<History<S, E>>,
}

impl<S: State, E: Event> Default for HistoryObserver<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State, E: Event> HistoryObserver<S, E> {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(History::new()),
        }
    }

    /// Snapshot of the history so far.
    pub fn history(&self) -> History<S, E> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, from: &S, event: &E, to: &S) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TransitionRecord::new(from.clone(), event.clone(), to.clone()));
    }
}

impl<S: State, E: Event> Observer<S, E> for HistoryObserver<S, E> {
    fn on_state_transition(&self, from: &S, event: &E, to: &S) -> Result<(), ObserverError> {
        self.record(from, event, to);
        Ok(())
    }
}

impl<S: State, E: Event> ActionHandler<S, E> for HistoryObserver<S, E> {
    type Error = Infallible;

    fn handle(&mut self, from: &S, event: &E, to: &S) -> Result<(), Infallible> {
        self.record(from, event, to);
        Ok(())
    }
}

/// Logs every dispatch through `tracing`: changes at `info`, no-ops at
/// `debug`.
#[derive(Debug, Clone, Default)]
pub struct LoggerObserver {
    prefix: String,
}

impl LoggerObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag attached to every log line, to tell several machines apart.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl<S: State, E: Event> Observer<S, E> for LoggerObserver {
    fn on_state_transition(&self, from: &S, event: &E, to: &S) -> Result<(), ObserverError> {
        if from != to {
            info!(
                prefix = %self.prefix,
                from = from.name(),
                event = event.name(),
                to = to.name(),
                "state changed"
            );
        } else {
            debug!(
                prefix = %self.prefix,
                state = from.name(),
                event = event.name(),
                "event left state unchanged"
            );
        }
        Ok(())
    }
}

/// Appends one line per dispatch to a writer.
///
/// Lines look like
/// `2024-05-01 12:00:00.000 | CarGreen --[TimeExpired]--> CarYellow`, with
/// ` (no change)` appended for no-ops. Write errors surface as
/// [`ObserverError`].
pub struct JournalObserver<W> {
    out: Mutex<W>,
    auto_flush: bool,
}

impl<W: Write + Send> JournalObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            auto_flush: true,
        }
    }

    /// Skip the flush after every line.
    pub fn buffered(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            auto_flush: false,
        }
    }

    /// Write a session marker line framed by separators.
    pub fn mark(&self, marker: &str) -> Result<(), ObserverError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let rule = "=".repeat(60);
        writeln!(out, "{rule}")?;
        writeln!(out, "{} | {marker}", timestamp())?;
        writeln!(out, "{rule}")?;
        if self.auto_flush {
            out.flush()?;
        }
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

fn timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

impl<S: State, E: Event, W: Write + Send> Observer<S, E> for JournalObserver<W> {
    fn on_state_transition(&self, from: &S, event: &E, to: &S) -> Result<(), ObserverError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let suffix = if from == to { " (no change)" } else { "" };
        writeln!(
            out,
            "{} | {} --[{}]--> {}{suffix}",
            timestamp(),
            from.name(),
            event.name(),
            to.name()
        )?;
        if self.auto_flush {
            out.flush()?;
        }
        Ok(())
    }
}
