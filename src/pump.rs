//! Serialized event loop for controllers driven by several producers.
//!
//! Producers (input readers, timers, other tasks) send events through an
//! [`EventSender`]. One tokio task owns the controller and dispatches events
//! one at a time in arrival order, so the controller itself never needs a
//! lock.
//!
//! # Example
//!
//! ```rust
//! use fsmkit::controller::{HistoryObserver, ObservableController};
//! use fsmkit::core::{StateMachine, Transition};
//! use fsmkit::pump::event_channel;
//! use fsmkit::{event_enum, state_enum};
//! use std::sync::Arc;
//!
//! state_enum! {
//!     enum Light { Green, Yellow }
//! }
//! event_enum! {
//!     enum Signal { TimeExpired }
//! }
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let mut machine = StateMachine::new(Light::Green);
//! machine.add_transition(Transition::unconditional(Light::Green, Signal::TimeExpired, Light::Yellow));
//! let mut controller = ObservableController::new(machine);
//! let history = Arc::new(HistoryObserver::new());
//! controller.add_observer(&history);
//!
//! let (sender, queue) = event_channel();
//! let pump = queue.spawn(controller).unwrap();
//! sender.send(Signal::TimeExpired).unwrap();
//!
//! let controller = pump.shutdown().await.unwrap();
//! assert_eq!(controller.current_state(), Light::Yellow);
//! assert_eq!(history.history().len(), 1);
//! # }
//! ```

use crate::controller::Dispatch;
use crate::services::TimerService;
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Errors raised by the event pump and its timer.
#[derive(Debug, Error)]
pub enum PumpError {
    #[error("event pump has stopped")]
    Closed,

    #[error("no tokio runtime is available on this thread")]
    NoRuntime,

    #[error("event pump task failed: {0}")]
    Crashed(#[from] tokio::task::JoinError),
}

enum Message<E> {
    Event(E),
    Shutdown,
}

/// Producer side of the event channel. Cheap to clone.
pub struct EventSender<E> {
    tx: mpsc::UnboundedSender<Message<E>>,
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> EventSender<E> {
    /// Queue `event` for dispatch. Never blocks.
    pub fn send(&self, event: E) -> Result<(), PumpError> {
        self.tx
            .send(Message::Event(event))
            .map_err(|_| PumpError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side of the event channel, waiting for a controller.
pub struct EventQueue<E> {
    rx: mpsc::UnboundedReceiver<Message<E>>,
    tx: mpsc::UnboundedSender<Message<E>>,
}

/// Create a connected sender/queue pair.
///
/// The sender can be handed to timers and input sources before the
/// controller exists; events sent early wait in the queue.
pub fn event_channel<E>() -> (EventSender<E>, EventQueue<E>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx: tx.clone() }, EventQueue { rx, tx })
}

impl<E: Send + 'static> EventQueue<E> {
    /// Move `dispatcher` into a task on the current tokio runtime and start
    /// dispatching queued events.
    pub fn spawn<D>(self, dispatcher: D) -> Result<EventPump<D, E>, PumpError>
    where
        D: Dispatch<E>,
    {
        let handle = Handle::try_current().map_err(|_| PumpError::NoRuntime)?;
        let task = handle.spawn(run(dispatcher, self.rx));
        Ok(EventPump {
            sender: EventSender { tx: self.tx },
            task: Some(task),
        })
    }
}

async fn run<D, E>(mut dispatcher: D, mut rx: mpsc::UnboundedReceiver<Message<E>>) -> D
where
    D: Dispatch<E>,
{
    let mut dispatched = 0usize;
    while let Some(message) = rx.recv().await {
        match message {
            Message::Event(event) => {
                let output = dispatcher.dispatch(event);
                dispatched += 1;
                trace!(?output, "event dispatched");
            }
            Message::Shutdown => break,
        }
    }
    debug!(dispatched, "event pump stopped");
    dispatcher
}

/// A running dispatch loop that owns a controller.
///
/// Dropping the pump without [`shutdown`](EventPump::shutdown) still stops
/// the loop once queued events are dispatched, and the controller is dropped
/// with the task. Senders held by the controller itself (a [`ChannelTimer`])
/// would otherwise keep the channel open forever.
pub struct EventPump<D, E> {
    sender: EventSender<E>,
    task: Option<JoinHandle<D>>,
}

impl<D, E> EventPump<D, E>
where
    D: Dispatch<E>,
    E: Send + 'static,
{
    pub fn sender(&self) -> EventSender<E> {
        self.sender.clone()
    }

    pub fn send(&self, event: E) -> Result<(), PumpError> {
        self.sender.send(event)
    }

    /// Stop the loop and get the controller back.
    ///
    /// Events queued before this call are dispatched first; later ones are
    /// dropped.
    pub async fn shutdown(mut self) -> Result<D, PumpError> {
        // A closed channel means the task is already gone; joining reports why.
        let _ = self.sender.tx.send(Message::Shutdown);
        let task = self.task.take().ok_or(PumpError::Closed)?;
        Ok(task.await?)
    }
}

impl<D, E> Drop for EventPump<D, E> {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.sender.tx.send(Message::Shutdown);
        }
    }
}

/// Timer service that feeds a timeout event back into a pump.
///
/// Each request spawns a sleeping task on the runtime captured at
/// construction. Requests are independent: arming a new timeout does not
/// cancel an earlier one.
pub struct ChannelTimer<E> {
    sender: EventSender<E>,
    event: E,
    runtime: Handle,
}

impl<E: Clone + Send + Sync + Debug + 'static> ChannelTimer<E> {
    /// Timer sending `event` through `sender` when a timeout elapses.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(sender: EventSender<E>, event: E) -> Result<Self, PumpError> {
        let runtime = Handle::try_current().map_err(|_| PumpError::NoRuntime)?;
        Ok(Self {
            sender,
            event,
            runtime,
        })
    }
}

impl<E: Clone + Send + Sync + Debug + 'static> TimerService for ChannelTimer<E> {
    fn start_timeout(&self, duration_secs: u32) {
        let sender = self.sender.clone();
        let event = self.event.clone();
        trace!(duration_secs, ?event, "timeout armed");
        self.runtime.spawn(async move {
            tokio::time::sleep(Duration::from_secs(u64::from(duration_secs))).await;
            if sender.send(event).is_err() {
                debug!("timeout fired after the event pump stopped");
            }
        });
    }
}
