//! MIDI plumbing around the engine: an input listener that turns note and
//! clock messages into commands, and an output sink over a midir port.

pub mod output;

pub use output::{encode_event, list_output_ports, MidiOutSink};

use midir::{Ignore, MidiInput, MidiInputConnection};

use gyromidi_types::Command;

use crate::error::{EngineError, EngineResult};
use crate::queue::CommandSender;

const CLIENT_NAME: &str = "gyromidi";

/// Information about an available MIDI port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPortInfo {
    pub index: usize,
    pub name: String,
}

/// Input ports currently visible to the MIDI backend.
pub fn list_input_ports() -> Vec<MidiPortInfo> {
    let Ok(midi_in) = MidiInput::new(CLIENT_NAME) else {
        return Vec::new();
    };
    midi_in
        .ports()
        .iter()
        .enumerate()
        .filter_map(|(index, port)| {
            midi_in
                .port_name(port)
                .ok()
                .map(|name| MidiPortInfo { index, name })
        })
        .collect()
}

/// Pick a port: none selected means the first one; otherwise the first
/// whose name contains `selector`, or the one at that index if it parses
/// as a number.
pub(crate) fn select_port(ports: &[MidiPortInfo], selector: Option<&str>) -> Option<usize> {
    match selector {
        None => ports.first().map(|p| p.index),
        Some(sel) => {
            if let Ok(index) = sel.trim().parse::<usize>() {
                return ports.iter().find(|p| p.index == index).map(|p| p.index);
            }
            let needle = sel.to_lowercase();
            ports
                .iter()
                .find(|p| p.name.to_lowercase().contains(&needle))
                .map(|p| p.index)
        }
    }
}

/// Feeds note and transport messages from one input port into the
/// command queue, from midir's callback thread.
pub struct MidiInputListener {
    connection: Option<MidiInputConnection<()>>,
    port_name: String,
}

impl MidiInputListener {
    pub fn connect(selector: Option<&str>, queue: CommandSender) -> EngineResult<Self> {
        let mut midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| e.to_string())?;
        // Clock and start/stop are realtime messages; keep them
        midi_in.ignore(Ignore::SysexAndActiveSense);

        let ports = midi_in.ports();
        let infos: Vec<MidiPortInfo> = ports
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                midi_in
                    .port_name(port)
                    .ok()
                    .map(|name| MidiPortInfo { index, name })
            })
            .collect();
        let index = select_port(&infos, selector).ok_or_else(|| {
            EngineError(format!(
                "no MIDI input port matching {}",
                selector.unwrap_or("<any>")
            ))
        })?;
        let port = &ports[index];
        let port_name = midi_in
            .port_name(port)
            .unwrap_or_else(|_| "Unknown".to_string());

        let connection = midi_in
            .connect(
                port,
                "gyromidi-input",
                move |_timestamp, message, _| {
                    if queue.is_terminated() {
                        return;
                    }
                    if let Some(cmd) = parse_midi_message(message) {
                        queue.send(cmd);
                    }
                },
                (),
            )
            .map_err(|e| e.to_string())?;

        log::info!(target: "midi", "listening on {}", port_name);
        Ok(Self {
            connection: Some(connection),
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close();
            log::info!(target: "midi", "closed {}", self.port_name);
        }
    }
}

impl Drop for MidiInputListener {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Translate a raw MIDI message into a scheduler command. Notes on any
/// channel feed the note set; only the transport realtime messages are
/// kept from the system range.
pub fn parse_midi_message(data: &[u8]) -> Option<Command> {
    let (&status, rest) = data.split_first()?;

    match status {
        0xF8 => return Some(Command::TransportTick),
        0xFA | 0xFB => return Some(Command::TransportStart),
        0xFC => return Some(Command::TransportStop),
        _ => {}
    }

    match status & 0xF0 {
        0x80 => {
            // Note Off
            let &[pitch, _velocity, ..] = rest else {
                return None;
            };
            Some(Command::PopNote { pitch })
        }
        0x90 => {
            // Note On (velocity 0 = note off)
            let &[pitch, velocity, ..] = rest else {
                return None;
            };
            if velocity == 0 {
                Some(Command::PopNote { pitch })
            } else {
                Some(Command::PushNote { pitch })
            }
        }
        _ => None,
    }
}
