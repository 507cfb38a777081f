//! End-to-end checks with real threads: the engine's scheduler thread,
//! thread timers and waveform workers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gyromidi_core::{ChannelSink, Engine};
use gyromidi_types::{Command, OutputEvent, PerformanceSettings, Waveform, WaveformBinding};

fn wait_for<F>(events: &crossbeam_channel::Receiver<OutputEvent>, timeout: Duration, pred: F) -> bool
where
    F: Fn(&OutputEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    while let Ok(event) = events.recv_deadline(deadline) {
        if pred(&event) {
            return true;
        }
    }
    false
}

#[test]
fn free_running_arp_advances_on_its_own() {
    let (sink, events) = ChannelSink::new();
    let mut engine = Engine::start(PerformanceSettings::default(), Arc::new(sink)).unwrap();
    let sender = engine.sender();
    for cmd in [
        Command::PushNote { pitch: 60 },
        Command::PushNote { pitch: 64 },
        Command::ModeOn,
        Command::TriggerOn,
    ] {
        sender.enqueue(cmd).unwrap();
    }

    assert!(wait_for(&events, Duration::from_secs(2), |e| {
        matches!(e, OutputEvent::NoteOn { note: 60, .. })
    }));
    // 120 bpm: the next note arrives half a second later from the timer
    assert!(wait_for(&events, Duration::from_secs(2), |e| {
        matches!(e, OutputEvent::NoteOn { note: 64, .. })
    }));

    engine.shutdown();
    let rest: Vec<OutputEvent> = events.try_iter().collect();
    assert!(matches!(rest.last(), Some(OutputEvent::NoteOff { .. })));
    assert!(sender.is_terminated());
}

#[test]
fn waveforms_run_without_trigger() {
    let (sink, events) = ChannelSink::new();
    let mut binding = WaveformBinding::new(20, Waveform::Square);
    binding.frequency = 10.0;
    let settings = PerformanceSettings {
        waveforms: vec![binding],
        ..PerformanceSettings::default()
    };
    let mut engine = Engine::start(settings, Arc::new(sink)).unwrap();

    assert!(wait_for(&events, Duration::from_secs(2), |e| {
        matches!(e, OutputEvent::ControlChange { controller: 20, value: 0, .. })
    }));
    engine.shutdown();
}

#[test]
fn dropping_engine_releases_held_note() {
    let (sink, events) = ChannelSink::new();
    {
        let engine = Engine::start(PerformanceSettings::default(), Arc::new(sink)).unwrap();
        engine.send(Command::TriggerOn);
        assert!(wait_for(&events, Duration::from_secs(2), |e| {
            matches!(e, OutputEvent::NoteOn { note: 48, .. })
        }));
    }
    let rest: Vec<OutputEvent> = events.try_iter().collect();
    assert!(rest.contains(&OutputEvent::NoteOff { channel: 0, note: 48, velocity: 127 }));
}
