//! Clocks and cancellable one-shot timers.
//!
//! Timers never touch scheduler state: when one expires it only enqueues
//! its command, so the scheduler thread stays the single writer.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};

use gyromidi_types::Command;

use crate::queue::CommandSender;

/// Monotonic time source.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *lock(&self.now) += by;
    }

    pub fn set(&self, to: Duration) {
        *lock(&self.now) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *lock(&self.now)
    }
}

/// Handle to a scheduled timer.
pub trait TimerHandle: Send {
    /// Prevent the timer from firing. A timer that already fired (or is
    /// firing concurrently) may still deliver its command.
    fn cancel(self: Box<Self>);
}

/// Facility that delivers a command after a delay.
pub trait TimerFacility: Send {
    fn schedule(&mut self, delay: Duration, command: Command) -> Box<dyn TimerHandle>;
}

/// Timer facility that parks one short-lived thread per pending timer.
pub struct ThreadTimer {
    queue: CommandSender,
}

impl ThreadTimer {
    pub fn new(queue: CommandSender) -> Self {
        Self { queue }
    }
}

impl TimerFacility for ThreadTimer {
    fn schedule(&mut self, delay: Duration, command: Command) -> Box<dyn TimerHandle> {
        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(1);
        let queue = self.queue.clone();

        let spawned = thread::Builder::new()
            .name("gyromidi-timer".to_string())
            .spawn(move || {
                // A cancel message or a dropped handle both end the wait
                if let Err(RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(delay) {
                    if queue.is_terminated() {
                        return;
                    }
                    queue.send(command);
                }
            });
        if let Err(e) = spawned {
            log::error!(target: "timer", "could not spawn timer thread: {}", e);
        }

        Box::new(ThreadTimerHandle { cancel: cancel_tx })
    }
}

struct ThreadTimerHandle {
    cancel: Sender<()>,
}

impl TimerHandle for ThreadTimerHandle {
    fn cancel(self: Box<Self>) {
        let _ = self.cancel.try_send(());
    }
}

/// A timer recorded by [`ManualTimer`].
#[derive(Debug, Clone, PartialEq)]
pub struct ManualEntry {
    pub id: u64,
    pub delay: Duration,
    pub command: Command,
    pub cancelled: bool,
    pub fired: bool,
}

impl ManualEntry {
    pub fn is_outstanding(&self) -> bool {
        !self.cancelled && !self.fired
    }
}

#[derive(Debug, Default)]
struct ManualTimerState {
    entries: Vec<ManualEntry>,
    next_id: u64,
    max_outstanding: usize,
}

impl ManualTimerState {
    fn outstanding(&self) -> usize {
        self.entries.iter().filter(|e| e.is_outstanding()).count()
    }
}

/// Deterministic timer facility: records every scheduled timer and fires
/// only on request. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<ManualTimerState>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers neither cancelled nor fired.
    pub fn outstanding(&self) -> usize {
        lock(&self.state).outstanding()
    }

    /// Highest number of outstanding timers ever observed.
    pub fn max_outstanding(&self) -> usize {
        lock(&self.state).max_outstanding
    }

    /// Every timer scheduled so far, in scheduling order.
    pub fn entries(&self) -> Vec<ManualEntry> {
        lock(&self.state).entries.clone()
    }

    /// Delay of the most recently scheduled timer that is still outstanding.
    pub fn pending_delay(&self) -> Option<Duration> {
        lock(&self.state)
            .entries
            .iter()
            .rev()
            .find(|e| e.is_outstanding())
            .map(|e| e.delay)
    }

    /// Mark the oldest outstanding timer as fired and hand back its command
    /// for delivery to the scheduler.
    pub fn fire_next(&self) -> Option<Command> {
        let mut state = lock(&self.state);
        let entry = state.entries.iter_mut().find(|e| e.is_outstanding())?;
        entry.fired = true;
        Some(entry.command.clone())
    }
}

impl TimerFacility for ManualTimer {
    fn schedule(&mut self, delay: Duration, command: Command) -> Box<dyn TimerHandle> {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.entries.push(ManualEntry {
            id,
            delay,
            command,
            cancelled: false,
            fired: false,
        });
        let outstanding = state.outstanding();
        state.max_outstanding = state.max_outstanding.max(outstanding);
        Box::new(ManualTimerHandle {
            id,
            state: Arc::clone(&self.state),
        })
    }
}

struct ManualTimerHandle {
    id: u64,
    state: Arc<Mutex<ManualTimerState>>,
}

impl TimerHandle for ManualTimerHandle {
    fn cancel(self: Box<Self>) {
        let mut state = lock(&self.state);
        if let Some(entry) = state.entries.iter_mut().find(|e| e.id == self.id) {
            entry.cancelled = true;
        }
    }
}

/// Poisoning only means another test thread panicked; the data is still
/// usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
