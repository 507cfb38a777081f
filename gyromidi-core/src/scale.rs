//! Index-to-pitch mapping for the one-shot pitch window.

use gyromidi_types::{Scale, Tonality};

/// Maps signed scale indices onto MIDI pitches around a tonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchMap {
    tonic: i32,
    scale: Scale,
}

impl PitchMap {
    /// Without a tonality the base note itself is the tonic and indices
    /// step chromatically. With one, the tonic is the key's pitch class in
    /// the base note's octave.
    pub fn new(base_note: u8, tonality: Option<Tonality>) -> Self {
        let base = base_note as i32;
        match tonality {
            Some(t) if t.scale != Scale::Chromatic => Self {
                tonic: base - base.rem_euclid(12) + t.key.semitone(),
                scale: t.scale,
            },
            _ => Self {
                tonic: base,
                scale: Scale::Chromatic,
            },
        }
    }

    pub fn tonic(&self) -> i32 {
        self.tonic
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Number of indices covered by the ±90° window.
    pub fn window(&self, octaves: u8) -> i32 {
        self.scale.len() as i32 * octaves.max(1) as i32
    }

    /// Pitch for scale index `n`. Chromatic pitches are not clamped and may
    /// fall outside the MIDI range; scaled pitches are clamped to [1, 127].
    pub fn pitch(&self, n: i32) -> i32 {
        if self.scale == Scale::Chromatic {
            return self.tonic + n;
        }
        let intervals = self.scale.intervals();
        let len = intervals.len() as i32;
        let pitch = self.tonic + 12 * n.div_euclid(len) + intervals[n.rem_euclid(len) as usize];
        pitch.clamp(1, 127)
    }
}
