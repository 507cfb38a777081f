use serde::{Deserialize, Serialize};

use crate::{ArpPattern, Axis, ControllerBinding, Tonality, WaveformBinding};

/// Playback mode toggled by ModeOn/ModeOff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// One note per trigger press, pitch follows the bound axis.
    #[default]
    OneShot,
    /// Repeating playback through the held note set.
    Arp,
}

/// Behaviours bound to axes while a given mode is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeBindings {
    /// Pitch axis in one-shot mode; note-set shift axis in arp mode.
    pub note: Option<Axis>,
    pub bend: Option<Axis>,
    pub velocity: Option<Axis>,
    pub controllers: Vec<ControllerBinding>,
}

/// Immutable configuration the scheduler is constructed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSettings {
    /// Output channel, 0-based.
    pub channel: u8,
    /// Velocity used when no velocity axis is bound.
    pub velocity: u8,
    /// Fixed pitch without a note axis, and tonic of the index window.
    pub base_note: u8,
    pub tonality: Option<Tonality>,
    /// Octaves spanned by the ±90° pitch window.
    pub octaves: u8,
    pub gliss: bool,
    pub legato: bool,
    pub quantize: bool,
    /// Exponent applied to normalised potentiometer readings.
    pub gamma: f32,
    pub pattern: ArpPattern,
    /// Controllers sent 127 with every note-on.
    pub gate_controllers: Vec<u8>,
    pub one_shot: ModeBindings,
    pub arp: ModeBindings,
    /// Tempo (free-running) or clock divisor (quantized) source.
    pub speed: Option<Axis>,
    pub waveforms: Vec<WaveformBinding>,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            channel: 0,
            velocity: 127,
            base_note: 48,
            tonality: None,
            octaves: 1,
            gliss: false,
            legato: false,
            quantize: false,
            gamma: 1.0,
            pattern: ArpPattern::Up,
            gate_controllers: Vec::new(),
            one_shot: ModeBindings::default(),
            arp: ModeBindings::default(),
            speed: None,
            waveforms: Vec::new(),
        }
    }
}

impl PerformanceSettings {
    pub fn bindings(&self, mode: Mode) -> &ModeBindings {
        match mode {
            Mode::OneShot => &self.one_shot,
            Mode::Arp => &self.arp,
        }
    }
}
