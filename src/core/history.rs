//! Transition history tracking.
//!
//! Records one entry per dispatched event, including dispatches that left
//! the state unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single dispatch.
///
/// # Example
///
/// ```rust
/// use fsmkit::core::TransitionRecord;
/// use fsmkit::{event_enum, state_enum};
///
/// state_enum! {
///     enum TaskState { Pending, Running }
/// }
/// event_enum! {
///     enum TaskEvent { Start }
/// }
///
/// let record = TransitionRecord::new(TaskState::Pending, TaskEvent::Start, TaskState::Running);
/// assert!(record.changed);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord<S, E> {
    /// The state the event was fired from
    pub from: S,
    /// The event that was fired
    pub event: E,
    /// The state after the event
    pub to: S,
    /// Whether the state actually changed
    pub changed: bool,
    /// When the dispatch happened
    pub timestamp: DateTime<Utc>,
}

impl<S: PartialEq, E> TransitionRecord<S, E> {
    /// Record stamped with the current time.
    pub fn new(from: S, event: E, to: S) -> Self {
        Self::at(from, event, to, Utc::now())
    }

    pub fn at(from: S, event: E, to: S, timestamp: DateTime<Utc>) -> Self {
        let changed = from != to;
        Self {
            from,
            event,
            to,
            changed,
            timestamp,
        }
    }
}

/// Ordered history of dispatches.
///
/// # Example
///
/// ```rust
/// use fsmkit::core::{History, TransitionRecord};
/// use fsmkit::{event_enum, state_enum};
///
/// state_enum! {
///     enum WorkState { Start, Middle, End }
/// }
/// event_enum! {
///     enum Step { Next, Nudge }
/// }
///
/// let mut history = History::new();
/// history.push(TransitionRecord::new(WorkState::Start, Step::Next, WorkState::Middle));
/// history.push(TransitionRecord::new(WorkState::Middle, Step::Nudge, WorkState::Middle));
/// history.push(TransitionRecord::new(WorkState::Middle, Step::Next, WorkState::End));
///
/// let path = history.get_path();
/// assert_eq!(path, vec![&WorkState::Start, &WorkState::Middle, &WorkState::End]);
/// assert_eq!(history.changes().count(), 2);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct History<S, E> {
    records: Vec<TransitionRecord<S, E>>,
}

impl<S, E> Default for History<S, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, E> History<S, E> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: TransitionRecord<S, E>) {
        self.records.push(record);
    }

    /// States traversed: the first record's origin, then every state the
    /// machine actually moved to. No-op dispatches are skipped.
    pub fn get_path(&self) -> Vec<&S> {
        let mut path = Vec::new();
        if let Some(first) = self.records.first() {
            path.push(&first.from);
        }
        for record in self.changes() {
            path.push(&record.to);
        }
        path
    }

    /// Records whose dispatch changed the state.
    pub fn changes(&self) -> impl Iterator<Item = &TransitionRecord<S, E>> {
        self.records.iter().filter(|r| r.changed)
    }

    /// Time between the first and the last record.
    ///
    /// Returns `None` if there are no records.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.records.first(), self.records.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn records(&self) -> &[TransitionRecord<S, E>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::state_enum! {
        enum TestState {
            Initial,
            Processing,
            Complete,
        }
    }

    crate::event_enum! {
        enum TestEvent {
            Advance,
            Wait,
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history: History<TestState, TestEvent> = History::new();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
    }

    #[test]
    fn record_marks_unchanged_dispatch() {
        let record = TransitionRecord::new(TestState::Processing, TestEvent::Wait, TestState::Processing);
        assert!(!record.changed);
    }

    #[test]
    fn get_path_skips_no_op_records() {
        let mut history = History::new();
        history.push(TransitionRecord::new(
            TestState::Initial,
            TestEvent::Wait,
            TestState::Initial,
        ));
        history.push(TransitionRecord::new(
            TestState::Initial,
            TestEvent::Advance,
            TestState::Processing,
        ));
        history.push(TransitionRecord::new(
            TestState::Processing,
            TestEvent::Advance,
            TestState::Complete,
        ));

        assert_eq!(history.len(), 3);
        assert_eq!(
            history.get_path(),
            vec![
                &TestState::Initial,
                &TestState::Processing,
                &TestState::Complete
            ]
        );
    }

    #[test]
    fn duration_calculates_elapsed_time() {
        let start = Utc::now();
        let mut history = History::new();
        history.push(TransitionRecord::at(
            TestState::Initial,
            TestEvent::Advance,
            TestState::Processing,
            start,
        ));
        history.push(TransitionRecord::at(
            TestState::Processing,
            TestEvent::Advance,
            TestState::Complete,
            start + chrono::Duration::milliseconds(250),
        ));

        assert_eq!(history.duration(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn single_record_has_duration_zero() {
        let mut history = History::new();
        history.push(TransitionRecord::new(
            TestState::Initial,
            TestEvent::Advance,
            TestState::Processing,
        ));

        assert_eq!(history.duration(), Some(Duration::from_secs(0)));
    }

    #[test]
    fn history_serializes_correctly() {
        let mut history = History::new();
        history.push(TransitionRecord::new(
            TestState::Initial,
            TestEvent::Advance,
            TestState::Processing,
        ));

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: History<TestState, TestEvent> = serde_json::from_str(&json).unwrap();

        assert_eq!(history.records(), deserialized.records());
    }
}
