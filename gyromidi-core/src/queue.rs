//! Command queue: bounded multi-producer, single-consumer mailbox between
//! the device listeners and the scheduler thread.
//!
//! A [`CommandQueue`] is the one context object shared by every producer
//! and the consumer. Producers hold cloned [`CommandSender`]s and block when
//! the queue is full; the scheduler holds the [`CommandReceiver`] and
//! drains pending commands in batches.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use gyromidi_types::Command;

/// Number of commands that may be pending before producers block.
pub const QUEUE_CAPACITY: usize = 100;

/// The consumer side has gone away; the command was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

impl fmt::Display for QueueClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command queue closed")
    }
}

impl std::error::Error for QueueClosed {}

/// Owner of the channel pair and the shared terminate flag.
pub struct CommandQueue {
    tx: Sender<Command>,
    rx: Receiver<Command>,
    terminate: Arc<AtomicBool>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        Self {
            tx,
            rx,
            terminate: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Producer handle. Clone freely, one per listener thread.
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            tx: self.tx.clone(),
            terminate: Arc::clone(&self.terminate),
        }
    }

    /// Consumer handle for the scheduler thread.
    pub fn receiver(&self) -> CommandReceiver {
        CommandReceiver {
            rx: self.rx.clone(),
            terminate: Arc::clone(&self.terminate),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    /// Number of commands currently waiting.
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

/// Cloneable producer handle.
#[derive(Clone)]
pub struct CommandSender {
    tx: Sender<Command>,
    terminate: Arc<AtomicBool>,
}

impl CommandSender {
    /// Push a command, blocking while the queue is full.
    pub fn enqueue(&self, cmd: Command) -> Result<(), QueueClosed> {
        if !cmd.is_continuous() {
            log::debug!(target: "queue", "send command {}", cmd.name());
        }
        self.tx.send(cmd).map_err(|_| QueueClosed)
    }

    /// Fire-and-forget: enqueue and log if the scheduler is gone.
    pub fn send(&self, cmd: Command) {
        let name = cmd.name();
        if let Err(e) = self.enqueue(cmd) {
            log::warn!(target: "queue", "command {} dropped: {}", name, e);
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    /// Ask every loop to stop. The scheduler is woken with an implied
    /// trigger release followed by `Shutdown`, so output ends silent.
    pub fn request_terminate(&self) {
        self.terminate.store(true, Ordering::Release);
        // Either may fail if the scheduler already exited; nothing to do then.
        let _ = self.tx.send(Command::TriggerOff);
        let _ = self.tx.send(Command::Shutdown);
    }
}

/// Scheduler-side handle.
pub struct CommandReceiver {
    rx: Receiver<Command>,
    terminate: Arc<AtomicBool>,
}

impl CommandReceiver {
    /// Block until at least one command is pending, then move every pending
    /// command into `batch`. Returns `false` once all senders are gone and
    /// the queue is empty.
    pub fn wait_batch(&self, batch: &mut Vec<Command>) -> bool {
        match self.rx.recv() {
            Ok(cmd) => batch.push(cmd),
            Err(_) => return false,
        }
        loop {
            match self.rx.try_recv() {
                Ok(cmd) => batch.push(cmd),
                Err(TryRecvError::Empty) => return true,
                // Keep what was drained; the next wait reports the disconnect.
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }
}
