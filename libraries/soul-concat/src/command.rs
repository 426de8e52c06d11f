//! Command relay between the client context and the engine context
//!
//! ```text
//! App threads                    Engine context
//!     │                               │
//!     │  PlaylistMirror::insert()     │
//!     │──── Command::Add ────────────>│ apply, correct offsets
//!     │                               │──┐ NotifyListeners (queued once)
//! Child sources                       │<─┘ publish snapshot
//!     │                               │──┐ RunCompletions
//!     │──── Command::ChildRefreshed ─>│<─┘ run callbacks
//! ```
//!
//! The queue is unbounded so enqueuing never blocks. Commands are applied in
//! the order they were sent; dropping the queue discards everything pending
//! and turns later sends into no-ops.

use crate::holder::Holder;
use crate::shuffle::ShuffleOrder;
use crate::timeline::Timeline;
use crate::types::HolderUid;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Callback run once a mutation is visible in a published timeline
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Work item for the engine
pub enum Command {
    /// Insert `holders` at `index`
    Add {
        index: usize,
        holders: Vec<Holder>,
        on_done: Option<Completion>,
    },

    /// Remove holders in `from..to`
    Remove {
        from: usize,
        to: usize,
        on_done: Option<Completion>,
    },

    /// Move the holder at `from` to `to`
    Move {
        from: usize,
        to: usize,
        on_done: Option<Completion>,
    },

    /// Replace the shuffle order
    SetShuffleOrder {
        order: ShuffleOrder,
        on_done: Option<Completion>,
    },

    /// Publish a new concatenated timeline
    NotifyListeners,

    /// Run callbacks of mutations that are now published
    RunCompletions(Vec<Completion>),

    /// A child reported a new timeline
    ChildRefreshed {
        holder: HolderUid,
        timeline: Arc<dyn Timeline>,
    },
}

impl Command {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "Add",
            Self::Remove { .. } => "Remove",
            Self::Move { .. } => "Move",
            Self::SetShuffleOrder { .. } => "SetShuffleOrder",
            Self::NotifyListeners => "NotifyListeners",
            Self::RunCompletions(_) => "RunCompletions",
            Self::ChildRefreshed { .. } => "ChildRefreshed",
        }
    }

    /// Completion carried by a mutation command
    pub(crate) fn into_completion(self) -> Option<Completion> {
        match self {
            Self::Add { on_done, .. }
            | Self::Remove { on_done, .. }
            | Self::Move { on_done, .. }
            | Self::SetShuffleOrder { on_done, .. } => on_done,
            _ => None,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { index, holders, .. } => f
                .debug_struct("Add")
                .field("index", index)
                .field("count", &holders.len())
                .finish(),
            Self::Remove { from, to, .. } => f
                .debug_struct("Remove")
                .field("from", from)
                .field("to", to)
                .finish(),
            Self::Move { from, to, .. } => f
                .debug_struct("Move")
                .field("from", from)
                .field("to", to)
                .finish(),
            Self::SetShuffleOrder { order, .. } => f
                .debug_struct("SetShuffleOrder")
                .field("len", &order.len())
                .finish(),
            Self::NotifyListeners => f.write_str("NotifyListeners"),
            Self::RunCompletions(completions) => f
                .debug_tuple("RunCompletions")
                .field(&completions.len())
                .finish(),
            Self::ChildRefreshed { holder, timeline } => f
                .debug_struct("ChildRefreshed")
                .field("holder", holder)
                .field("windows", &timeline.window_count())
                .finish(),
        }
    }
}

/// Sending half of a command queue
#[derive(Clone)]
pub struct CommandSender {
    tx: Sender<Command>,
}

impl CommandSender {
    /// Enqueue a command (never blocks)
    ///
    /// Returns the command if the queue has been dropped.
    pub fn send(&self, command: Command) -> Result<(), Command> {
        self.tx.send(command).map_err(|error| {
            let command = error.into_inner();
            debug!("Command queue closed, dropping {}", command.name());
            command
        })
    }
}

/// FIFO command queue owned by the engine
pub struct CommandQueue {
    tx: Sender<Command>,
    rx: Receiver<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// New sending handle
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            tx: self.tx.clone(),
        }
    }

    /// Enqueue from the engine side
    pub fn push(&self, command: Command) {
        // The queue owns a receiver, so the channel cannot be disconnected here
        let _ = self.tx.send(command);
    }

    /// Next command, without waiting
    pub fn try_next(&self) -> Option<Command> {
        match self.rx.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Next command, waiting up to `timeout`
    pub fn next_timeout(&self, timeout: Duration) -> Option<Command> {
        match self.rx.recv_timeout(timeout) {
            Ok(command) => Some(command),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of pending commands
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
