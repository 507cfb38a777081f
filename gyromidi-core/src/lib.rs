//! # gyromidi-core
//!
//! Real-time scheduling engine that turns gesture input and clock events
//! into MIDI performance events. Device listeners push [`Command`]s into a
//! bounded [`queue::CommandQueue`]; a single scheduler thread owns all
//! performance state and emits [`OutputEvent`]s to an [`sink::EventSink`].

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod interp;
pub mod midi;
pub mod note_set;
pub mod queue;
pub mod scale;
pub mod scheduler;
pub mod sink;
pub mod timer;
pub mod waveform;

pub use config::Config;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use queue::{CommandQueue, CommandReceiver, CommandSender, QueueClosed};
pub use scheduler::{PerformanceState, Scheduler};
pub use sink::{ChannelSink, EventSink};

pub use gyromidi_types::{Command, OutputEvent};
