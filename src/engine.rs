//! Async driver: single-control-thread discipline for the controller.
//!
//! All mutation of the windowing state happens inside one tokio task that
//! owns the [`WindowController`] and selects over three sources: consumer
//! commands, backing-store events, and the debounce deadline. The control
//! task never waits on the store; ordering derives solely from arrival
//! order. Consumers talk to the task through a cloneable [`ViewportHandle`]
//! and listen on the [`ViewEvent`](crate::protocol::ViewEvent) receiver.
//!
//! Time is read from the tokio clock, so tests drive the debounce window
//! deterministically with a paused runtime.

use crate::config::ViewportConfig;
use crate::controller::WindowController;
use crate::error::EngineError;
use crate::protocol::{BackingStore, StoreEvent, ViewEvent};
use crate::record::RowKey;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::debug;

/// A consumer request to the engine task.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// The visible grid range changed.
    SetRange {
        /// First visible grid position.
        start: usize,
        /// One past the last visible grid position.
        end: usize,
    },
    /// Expand a group row.
    Expand {
        /// Key of the group row.
        key: RowKey,
    },
    /// Collapse a group row.
    Collapse {
        /// Key of the group row.
        key: RowKey,
    },
}

/// Cloneable front door to a running [`ViewportEngine`].
#[derive(Debug, Clone)]
pub struct ViewportHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ViewportHandle {
    /// Request a new visible grid range.
    pub fn set_range(&self, start: usize, end: usize) -> Result<(), EngineError> {
        self.send(Command::SetRange { start, end })
    }

    /// Expand a group row.
    pub fn expand(&self, key: impl Into<RowKey>) -> Result<(), EngineError> {
        self.send(Command::Expand { key: key.into() })
    }

    /// Collapse a group row.
    pub fn collapse(&self, key: impl Into<RowKey>) -> Result<(), EngineError> {
        self.send(Command::Collapse { key: key.into() })
    }

    fn send(&self, command: Command) -> Result<(), EngineError> {
        self.commands.send(command).map_err(|_| EngineError::Shutdown)
    }
}

/// The engine task: owns the controller and pumps it with commands, store
/// events, and debounce deadlines.
pub struct ViewportEngine {
    controller: WindowController,
    commands: mpsc::UnboundedReceiver<Command>,
    store_events: mpsc::UnboundedReceiver<StoreEvent>,
}

impl ViewportEngine {
    /// Wire up an engine around `store`, which delivers its responses and
    /// pushes on `store_events`. Returns the engine (to be run), the
    /// consumer handle, and the view-event receiver.
    pub fn new(
        store: Box<dyn BackingStore>,
        store_events: mpsc::UnboundedReceiver<StoreEvent>,
        config: ViewportConfig,
    ) -> (
        Self,
        ViewportHandle,
        mpsc::UnboundedReceiver<ViewEvent>,
    ) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let engine = Self {
            controller: WindowController::new(store, event_tx, config),
            commands: command_rx,
            store_events,
        };
        (engine, ViewportHandle { commands: command_tx }, event_rx)
    }

    /// Drive the controller until every consumer handle is dropped (clean
    /// shutdown) or the store closes its event stream (permanent stall).
    pub async fn run(mut self) -> Result<(), EngineError> {
        debug!("viewport engine running");
        loop {
            let deadline = self.controller.debounce_deadline();
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        debug!("all handles dropped; viewport engine stopping");
                        return Ok(());
                    }
                },
                event = self.store_events.recv() => match event {
                    Some(event) => {
                        let now = Self::now();
                        self.controller.on_store_event(event, now);
                    }
                    None => {
                        debug!("store event stream closed");
                        return Err(EngineError::StoreDisconnected);
                    }
                },
                _ = Self::sleep_until(deadline), if deadline.is_some() => {
                    self.controller.on_debounce_elapsed(Self::now());
                }
            }
        }
    }

    fn apply(&mut self, command: Command) {
        let now = Self::now();
        match command {
            Command::SetRange { start, end } => self.controller.set_range(start, end, now),
            Command::Expand { key } => self.controller.expand(&key),
            Command::Collapse { key } => self.controller.collapse(&key, now),
        }
    }

    /// The tokio clock, as a std instant. Keeping every reading on the same
    /// clock makes the debounce window testable under a paused runtime.
    fn now() -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep_until(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => {
                tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
