use serde::{Deserialize, Serialize};

/// One of the three orientation axes. A potentiometer drives `X`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn from_name(name: &str) -> Option<Axis> {
        match name.to_ascii_lowercase().as_str() {
            "x" | "pot" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        }
    }
}

/// How a controller reacts when the trigger (or a mode switch) recenters it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecenterMode {
    /// Never recentered explicitly; slides its window when the input
    /// leaves ±90°.
    #[default]
    Free,
    /// The current position becomes the middle of the range.
    Center,
    /// The current position keeps producing the value last displayed.
    Drag,
}

/// Maps one axis onto a MIDI continuous controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerBinding {
    pub axis: Axis,
    /// Controller number; a negative id inverts the emitted value.
    pub cc: i16,
    #[serde(default)]
    pub recenter: RecenterMode,
}

impl ControllerBinding {
    pub fn new(axis: Axis, cc: i16, recenter: RecenterMode) -> Self {
        Self { axis, cc, recenter }
    }

    /// Controller number actually addressed on the wire.
    pub fn controller(&self) -> u8 {
        self.cc.unsigned_abs().min(127) as u8
    }

    pub fn is_inverted(&self) -> bool {
        self.cc < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_lookup() {
        assert_eq!(Axis::from_name("Y"), Some(Axis::Y));
        assert_eq!(Axis::from_name("pot"), Some(Axis::X));
        assert_eq!(Axis::from_name("w"), None);
        assert_eq!(Axis::Z.index(), 2);
    }

    #[test]
    fn negative_cc_inverts() {
        let binding = ControllerBinding::new(Axis::Y, -7, RecenterMode::Free);
        assert_eq!(binding.controller(), 7);
        assert!(binding.is_inverted());
        assert!(!ControllerBinding::new(Axis::Y, 7, RecenterMode::Free).is_inverted());
    }
}
