use serde::{Deserialize, Serialize};

/// Highest value of a 7-bit MIDI data byte.
pub const MIDI_MAX: u8 = 127;
/// Largest 14-bit pitch bend value.
pub const BEND_MAX: u16 = 16383;
/// Pitch bend value meaning "no bend".
pub const BEND_CENTER: u16 = 8192;

/// A pitch/velocity pair. Only constructible with a pitch inside the MIDI
/// range, so an emitted note is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
}

impl Note {
    /// Returns `None` when `pitch` falls outside [0, 127].
    pub fn new(pitch: i32, velocity: u8) -> Option<Note> {
        if (0..=MIDI_MAX as i32).contains(&pitch) {
            Some(Note {
                pitch: pitch as u8,
                velocity: velocity.min(MIDI_MAX),
            })
        } else {
            None
        }
    }
}

/// Performance events emitted by the scheduler and the waveform bank.
/// Channels are 0-based (0..=15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputEvent {
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    PitchBend {
        channel: u8,
        /// 0 (full down) to 16383 (full up), 8192 = center
        value: u16,
    },
}

impl OutputEvent {
    pub fn note_on(channel: u8, note: Note) -> Self {
        OutputEvent::NoteOn {
            channel,
            note: note.pitch,
            velocity: note.velocity,
        }
    }

    pub fn note_off(channel: u8, note: Note) -> Self {
        OutputEvent::NoteOff {
            channel,
            note: note.pitch,
            velocity: note.velocity,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            OutputEvent::NoteOn { channel, .. }
            | OutputEvent::NoteOff { channel, .. }
            | OutputEvent::ControlChange { channel, .. }
            | OutputEvent::PitchBend { channel, .. } => channel,
        }
    }
}
