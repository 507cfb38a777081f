//! MIDI output over midir.

use std::sync::Mutex;

use midir::{MidiOutput, MidiOutputConnection};

use gyromidi_types::OutputEvent;

use super::{select_port, MidiPortInfo, CLIENT_NAME};
use crate::error::{EngineError, EngineResult};
use crate::sink::EventSink;

/// Output ports currently visible to the MIDI backend.
pub fn list_output_ports() -> Vec<MidiPortInfo> {
    let Ok(midi_out) = MidiOutput::new(CLIENT_NAME) else {
        return Vec::new();
    };
    midi_out
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_out
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect()
}

/// Raw channel-voice bytes for an event.
pub fn encode_event(event: &OutputEvent) -> [u8; 3] {
    match *event {
        OutputEvent::NoteOn { channel, note, velocity } => {
            [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
        }
        OutputEvent::NoteOff { channel, note, velocity } => {
            [0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
        }
        OutputEvent::ControlChange { channel, controller, value } => {
            [0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F]
        }
        OutputEvent::PitchBend { channel, value } => {
            let value = value.min(0x3FFF);
            [0xE0 | (channel & 0x0F), (value & 0x7F) as u8, (value >> 7) as u8]
        }
    }
}

/// Event sink writing to one MIDI output port. The connection is shared by
/// the scheduler and the waveform workers.
pub struct MidiOutSink {
    connection: Mutex<MidiOutputConnection>,
    port_name: String,
}

impl MidiOutSink {
    /// Connect to the first port whose name contains `selector` (or whose
    /// index it names), or to the first port when `selector` is `None`.
    pub fn connect(selector: Option<&str>) -> EngineResult<Self> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| e.to_string())?;
        let ports = midi_out.ports();
        let infos: Vec<MidiPortInfo> = ports
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                midi_out
                    .port_name(port)
                    .ok()
                    .map(|name| MidiPortInfo { index, name })
            })
            .collect();
        let index = select_port(&infos, selector).ok_or_else(|| {
            EngineError(format!(
                "no MIDI output port matching {}",
                selector.unwrap_or("<any>")
            ))
        })?;
        let port = &ports[index];
        let port_name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());
        let connection = midi_out
            .connect(port, "gyromidi-output")
            .map_err(|e| e.to_string())?;

        log::info!(target: "midi", "sending to {}", port_name);
        Ok(Self {
            connection: Mutex::new(connection),
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl EventSink for MidiOutSink {
    fn send(&self, event: OutputEvent) {
        let bytes = encode_event(&event);
        let mut conn = match self.connection.lock() {
            Ok(conn) => conn,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = conn.send(&bytes) {
            log::warn!(target: "midi", "send failed for {:?}: {}", event, e);
        }
    }
}
