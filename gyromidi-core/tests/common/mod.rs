#![allow(dead_code)]
//! Test harness for gyromidi-core integration tests: a scheduler wired to
//! a channel sink, a manual timer and a manual clock.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;

use gyromidi_core::timer::{ManualClock, ManualTimer};
use gyromidi_core::{ChannelSink, Scheduler};
use gyromidi_types::{Command, OutputEvent, PerformanceSettings};

pub struct Harness {
    pub scheduler: Scheduler,
    pub events: Receiver<OutputEvent>,
    pub timer: ManualTimer,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new(settings: PerformanceSettings) -> Self {
        let (sink, events) = ChannelSink::new();
        let timer = ManualTimer::new();
        let clock = ManualClock::new();
        let scheduler = Scheduler::new(
            settings,
            Arc::new(sink),
            Box::new(timer.clone()),
            Arc::new(clock.clone()),
        );
        Self {
            scheduler,
            events,
            timer,
            clock,
        }
    }

    /// Apply commands in order, as one drained batch would.
    pub fn send(&mut self, cmds: &[Command]) {
        for cmd in cmds {
            assert!(!self.scheduler.handle_cmd(cmd.clone()), "unexpected stop on {:?}", cmd);
        }
    }

    pub fn push_notes(&mut self, pitches: &[u8]) {
        for &pitch in pitches {
            self.send(&[Command::PushNote { pitch }]);
        }
    }

    pub fn axes(&mut self, x: f32, y: f32, z: f32) {
        self.send(&[Command::SetAxes { x, y, z }]);
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.send(&[Command::TransportTick]);
        }
    }

    /// Advance the clock by `by` and deliver the pending timer, if any.
    pub fn fire_timer(&mut self, by: Duration) -> bool {
        self.clock.advance(by);
        match self.timer.fire_next() {
            Some(cmd) => {
                self.send(&[cmd]);
                true
            }
            None => false,
        }
    }

    pub fn drain(&self) -> Vec<OutputEvent> {
        self.events.try_iter().collect()
    }

    /// Only NoteOn/NoteOff events.
    pub fn drain_notes(&self) -> Vec<OutputEvent> {
        self.drain().into_iter().filter(is_note).collect()
    }
}

pub fn is_note(event: &OutputEvent) -> bool {
    matches!(event, OutputEvent::NoteOn { .. } | OutputEvent::NoteOff { .. })
}

pub fn note_on(pitch: u8) -> OutputEvent {
    OutputEvent::NoteOn {
        channel: 0,
        note: pitch,
        velocity: 127,
    }
}

pub fn note_off(pitch: u8) -> OutputEvent {
    OutputEvent::NoteOff {
        channel: 0,
        note: pitch,
        velocity: 127,
    }
}

pub fn bends(events: &[OutputEvent]) -> Vec<u16> {
    events
        .iter()
        .filter_map(|e| match e {
            OutputEvent::PitchBend { value, .. } => Some(*value),
            _ => None,
        })
        .collect()
}
