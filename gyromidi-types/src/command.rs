use serde::{Deserialize, Serialize};

/// Commands consumed by the scheduler thread.
///
/// Producers (device listeners, the MIDI clock listener, timers) create a
/// command when something happens and push it into the command queue; the
/// scheduler consumes each command exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    // ── Trigger & mode ────────────────────────────────────────────
    TriggerOn,
    TriggerOff,
    /// Enable rapid-fire / arpeggiated playback.
    ModeOn,
    /// Back to one-shot playback.
    ModeOff,

    // ── Continuous input ──────────────────────────────────────────
    /// Orientation in degrees, nominally within [-90, 90] per axis.
    SetAxes {
        x: f32,
        y: f32,
        z: f32,
    },
    /// Raw potentiometer reading in [0, 1023].
    SetPot {
        value: u16,
    },

    // ── Note set ──────────────────────────────────────────────────
    PushNote {
        pitch: u8,
    },
    PopNote {
        pitch: u8,
    },

    // ── External transport ────────────────────────────────────────
    TransportStart,
    TransportStop,
    TransportTick,

    // ── Internal ──────────────────────────────────────────────────
    /// Enqueued by the deferred-note timer when it expires. Only the
    /// generation of the most recently scheduled timer is honoured.
    DeferredNote {
        generation: u64,
    },
    Shutdown,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::TriggerOn => "TriggerOn",
            Command::TriggerOff => "TriggerOff",
            Command::ModeOn => "ModeOn",
            Command::ModeOff => "ModeOff",
            Command::SetAxes { .. } => "SetAxes",
            Command::SetPot { .. } => "SetPot",
            Command::PushNote { .. } => "PushNote",
            Command::PopNote { .. } => "PopNote",
            Command::TransportStart => "TransportStart",
            Command::TransportStop => "TransportStop",
            Command::TransportTick => "TransportTick",
            Command::DeferredNote { .. } => "DeferredNote",
            Command::Shutdown => "Shutdown",
        }
    }

    /// High-rate commands that would flood a debug log.
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            Command::SetAxes { .. } | Command::SetPot { .. } | Command::TransportTick
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names() {
        assert_eq!(Command::TriggerOn.name(), "TriggerOn");
        assert_eq!(Command::SetPot { value: 3 }.name(), "SetPot");
        assert_eq!(Command::DeferredNote { generation: 1 }.name(), "DeferredNote");
    }

    #[test]
    fn continuous_commands() {
        assert!(Command::SetAxes { x: 0.0, y: 0.0, z: 0.0 }.is_continuous());
        assert!(Command::TransportTick.is_continuous());
        assert!(!Command::TriggerOff.is_continuous());
        assert!(!Command::PushNote { pitch: 60 }.is_continuous());
    }
}
