//! # gyromidi-types
//!
//! Shared type definitions for the gyromidi performance engine.
//! Commands flow in from device listeners, output events flow out to a MIDI
//! sink, and the settings types describe the immutable configuration the
//! engine is constructed with.

pub mod arp;
pub mod command;
pub mod controller;
pub mod event;
pub mod music;
pub mod settings;
pub mod waveform;

pub use arp::ArpPattern;
pub use command::Command;
pub use controller::{Axis, ControllerBinding, RecenterMode};
pub use event::{Note, OutputEvent, BEND_CENTER, BEND_MAX, MIDI_MAX};
pub use music::{Key, Scale, Tonality};
pub use settings::{Mode, ModeBindings, PerformanceSettings};
pub use waveform::{Waveform, WaveformBinding};
