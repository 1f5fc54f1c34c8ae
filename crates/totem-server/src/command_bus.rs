//! Command Bus: a bounded, priority-aware queue carrying commands from
//! connection handlers to the Lobby Controller. Priority 0 (lobby) drains
//! before priority 1 (gameplay). Room Buses reuse the same envelope type
//! but are plain single-band channels, since only gameplay-priority
//! traffic (plus the occasional forwarded lobby command) ever reaches one.

use thiserror::Error;
use tokio::sync::mpsc;

use totem_core::{ClientHandle, Command, Priority};

/// One in-flight command together with the client that issued it.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub sender: ClientHandle,
    pub command: Command,
}

#[derive(Debug, Error)]
#[error("command bus is closed")]
pub struct SendError;

/// The producer side of the global Command Bus. Cheaply cloneable -- every
/// Connection Handler holds one.
#[derive(Clone)]
pub struct CommandBusHandle {
    lobby_tx: mpsc::Sender<Envelope>,
    gameplay_tx: mpsc::Sender<Envelope>,
}

impl CommandBusHandle {
    /// Enqueues `command` on the priority band its kind belongs to.
    /// `List` has no bus priority and must never be passed here.
    pub async fn send(&self, sender: ClientHandle, command: Command) -> Result<(), SendError> {
        let envelope = Envelope { sender, command };
        let tx = match command.priority() {
            Some(Priority::Lobby) => &self.lobby_tx,
            Some(Priority::Gameplay) => &self.gameplay_tx,
            None => return Err(SendError),
        };
        tx.send(envelope).await.map_err(|_| SendError)
    }
}

/// The single-consumer side of the global Command Bus. Owned solely by the
/// Lobby Controller.
pub struct CommandBusConsumer {
    lobby_rx: mpsc::Receiver<Envelope>,
    gameplay_rx: mpsc::Receiver<Envelope>,
}

impl CommandBusConsumer {
    /// Non-blocking receive. Drains the lobby band fully before ever
    /// looking at the gameplay band.
    pub fn try_receive(&mut self) -> Option<Envelope> {
        match self.lobby_rx.try_recv() {
            Ok(envelope) => return Some(envelope),
            Err(mpsc::error::TryRecvError::Empty) => {},
            Err(mpsc::error::TryRecvError::Disconnected) => return None,
        }
        match self.gameplay_rx.try_recv() {
            Ok(envelope) => Some(envelope),
            Err(_) => None,
        }
    }
}

/// Builds a fresh Command Bus with `capacity` slots per priority band.
pub fn command_bus(capacity: usize) -> (CommandBusHandle, CommandBusConsumer) {
    let (lobby_tx, lobby_rx) = mpsc::channel(capacity);
    let (gameplay_tx, gameplay_rx) = mpsc::channel(capacity);
    (CommandBusHandle { lobby_tx, gameplay_tx }, CommandBusConsumer { lobby_rx, gameplay_rx })
}

/// Builds a fresh Room Bus: a single bounded channel of `capacity` used at
/// priority 1 for the lifetime of one in-progress room.
pub fn room_bus(capacity: usize) -> (mpsc::Sender<Envelope>, mpsc::Receiver<Envelope>) {
    mpsc::channel(capacity)
}
