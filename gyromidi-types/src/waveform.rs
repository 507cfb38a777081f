use serde::{Deserialize, Serialize};

use crate::Axis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
    Square,
    /// Sine whose depth follows the bound input, silent until moved.
    AutoWah,
}

impl Waveform {
    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "Sine",
            Waveform::Triangle => "Triangle",
            Waveform::Sawtooth => "Sawtooth",
            Waveform::Square => "Square",
            Waveform::AutoWah => "AutoWah",
        }
    }

    pub fn all() -> Vec<Waveform> {
        vec![
            Waveform::Sine,
            Waveform::Triangle,
            Waveform::Sawtooth,
            Waveform::Square,
            Waveform::AutoWah,
        ]
    }

    pub fn from_name(name: &str) -> Option<Waveform> {
        match name.to_ascii_lowercase().as_str() {
            "sine" | "sin" => Some(Waveform::Sine),
            "triangle" | "tri" => Some(Waveform::Triangle),
            "sawtooth" | "saw" => Some(Waveform::Sawtooth),
            "square" | "sqr" => Some(Waveform::Square),
            "autowah" | "wah" => Some(Waveform::AutoWah),
            _ => None,
        }
    }
}

/// A periodic controller generator and the inputs that modulate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformBinding {
    pub cc: u8,
    pub shape: Waveform,
    /// Axis driving the frequency, between `min_hz` and `max_hz`.
    pub rate: Option<Axis>,
    /// Axis driving the amplitude, between 0 and 1.
    pub depth: Option<Axis>,
    /// Frequency used until the rate axis moves.
    pub frequency: f32,
    pub min_hz: f32,
    pub max_hz: f32,
}

impl WaveformBinding {
    pub fn new(cc: u8, shape: Waveform) -> Self {
        Self {
            cc,
            shape,
            rate: None,
            depth: None,
            frequency: 1.0,
            min_hz: 0.1,
            max_hz: 10.0,
        }
    }
}
