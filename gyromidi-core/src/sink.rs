//! Output side: where emitted performance events go.

use crossbeam_channel::{Receiver, Sender};

use gyromidi_types::OutputEvent;

/// Consumer of performance events. Shared by the scheduler and every
/// waveform worker, so implementations must tolerate concurrent calls.
pub trait EventSink: Send + Sync {
    fn send(&self, event: OutputEvent);
}

/// Forwards events into a channel; the other end is handed to whoever
/// drives the real output (or inspects it in tests).
pub struct ChannelSink {
    tx: Sender<OutputEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<OutputEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn send(&self, event: OutputEvent) {
        if let Err(e) = self.tx.send(event) {
            log::warn!(target: "engine", "output event dropped: {:?}", e.into_inner());
        }
    }
}

/// Discards everything. Handy when only the side effects on state matter.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn send(&self, _event: OutputEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_forwards_in_order() {
        let (sink, rx) = ChannelSink::new();
        sink.send(OutputEvent::PitchBend { channel: 0, value: 8192 });
        sink.send(OutputEvent::ControlChange { channel: 0, controller: 3, value: 10 });
        let events: Vec<OutputEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], OutputEvent::PitchBend { value: 8192, .. }));
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.send(OutputEvent::PitchBend { channel: 0, value: 0 });
    }
}
