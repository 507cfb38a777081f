//! Axis-to-CC mapping with recentering.

use gyromidi_types::{Axis, ControllerBinding, RecenterMode, MIDI_MAX};

use crate::interp::{interp, map_angle, reframe, ANGLE_RANGE};

/// Runtime state of one bound continuous controller.
#[derive(Debug, Clone)]
pub struct Controller {
    binding: ControllerBinding,
    center: f32,
    /// Last value sent, before inversion.
    value: Option<u8>,
}

impl Controller {
    pub fn new(binding: ControllerBinding) -> Self {
        Self {
            binding,
            center: 0.0,
            value: None,
        }
    }

    pub fn axis(&self) -> Axis {
        self.binding.axis
    }

    pub fn binding(&self) -> &ControllerBinding {
        &self.binding
    }

    pub fn center(&self) -> f32 {
        self.center
    }

    pub fn value(&self) -> Option<u8> {
        self.value
    }

    /// Map `position` and return `(controller, value)` to send, or `None`
    /// when the mapped value did not change.
    pub fn update(&mut self, position: f32) -> Option<(u8, u8)> {
        let angle = match self.binding.recenter {
            RecenterMode::Free => reframe(position, &mut self.center),
            RecenterMode::Center | RecenterMode::Drag => position - self.center,
        };
        let value = map_angle(angle, 0.0, MIDI_MAX as f32).round() as u8;
        if self.value == Some(value) {
            return None;
        }
        self.value = Some(value);
        let wire = if self.binding.is_inverted() {
            MIDI_MAX - value
        } else {
            value
        };
        Some((self.binding.controller(), wire))
    }

    /// Re-anchor against `position` according to the recenter mode.
    pub fn recenter(&mut self, position: f32) {
        match self.binding.recenter {
            RecenterMode::Free => {}
            RecenterMode::Center => self.center = position,
            RecenterMode::Drag => {
                let shown = match self.value {
                    Some(v) => interp(v as f32, &[0.0, MIDI_MAX as f32], &ANGLE_RANGE),
                    None => 0.0,
                };
                self.center = position - shown;
            }
        }
    }
}
