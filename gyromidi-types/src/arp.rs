use serde::{Deserialize, Serialize};

/// Playback policy of the arpeggiator's note set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArpPattern {
    #[default]
    Up,
    Down,
    Random,
    /// Signed positions into the note set, played in order. Negative
    /// positions count from the top of the set.
    Sequence(Vec<i32>),
}

impl ArpPattern {
    pub fn name(&self) -> &'static str {
        match self {
            ArpPattern::Up => "Up",
            ArpPattern::Down => "Down",
            ArpPattern::Random => "Random",
            ArpPattern::Sequence(_) => "Pattern",
        }
    }
}
