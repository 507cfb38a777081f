//! Waveform generator bank: free-running periodic controller emitters.
//!
//! Each generator runs on its own worker thread and owns its timing. The
//! scheduler only forwards axis positions as messages; generators read no
//! performance state.

use std::f32::consts::PI;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use gyromidi_types::{OutputEvent, Waveform, WaveformBinding, MIDI_MAX};

use crate::interp::{interp, map_angle};
use crate::sink::EventSink;

/// Samples per waveform cycle.
pub const TABLE_SIZE: usize = 256;
/// Interval between two samples of a running generator.
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(10);

const MIDPOINT: f32 = 64.0;

/// Precompute one cycle of `shape`, values in [0, 127].
pub fn table(shape: Waveform) -> [f32; TABLE_SIZE] {
    let mut table = [0.0; TABLE_SIZE];
    let size = TABLE_SIZE as f32;
    for (i, slot) in table.iter_mut().enumerate() {
        let x = i as f32;
        *slot = match shape {
            Waveform::Sine | Waveform::AutoWah => MIDPOINT + 63.0 * (2.0 * PI * x / size).sin(),
            Waveform::Triangle => interp(
                x,
                &[0.0, size / 4.0, 3.0 * size / 4.0, size],
                &[MIDPOINT, 127.0, 0.0, MIDPOINT],
            ),
            Waveform::Sawtooth => ((64 + i * 128 / TABLE_SIZE) % 128) as f32,
            Waveform::Square => {
                if i < TABLE_SIZE / 2 {
                    127.0
                } else {
                    0.0
                }
            }
        };
    }
    table
}

/// One generator's oscillator state.
#[derive(Debug, Clone)]
pub struct WaveformGenerator {
    binding: WaveformBinding,
    table: [f32; TABLE_SIZE],
    frequency: f32,
    amplitude: f32,
    phase: f32,
    last: Option<u8>,
}

impl WaveformGenerator {
    pub fn new(binding: WaveformBinding) -> Self {
        let amplitude = match binding.shape {
            Waveform::AutoWah => 0.0,
            _ => 1.0,
        };
        Self {
            table: table(binding.shape),
            frequency: binding.frequency.max(0.0),
            amplitude,
            phase: 0.0,
            last: None,
            binding,
        }
    }

    pub fn controller(&self) -> u8 {
        self.binding.cc.min(MIDI_MAX)
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    /// Follow the bound rate and depth axes.
    pub fn set_position(&mut self, position: [f32; 3]) {
        if let Some(axis) = self.binding.rate {
            self.frequency =
                map_angle(position[axis.index()], self.binding.min_hz, self.binding.max_hz).max(0.0);
        }
        if let Some(axis) = self.binding.depth {
            self.amplitude = map_angle(position[axis.index()], 0.0, 1.0);
        }
    }

    /// Advance by one sample period. Returns the new controller value, or
    /// `None` if it equals the last one returned.
    pub fn sample(&mut self, period: Duration) -> Option<u8> {
        let size = TABLE_SIZE as f32;
        self.phase = (self.phase + period.as_secs_f32() * size * self.frequency).rem_euclid(size);
        let raw = self.table[(self.phase as usize).min(TABLE_SIZE - 1)];
        let value = (MIDPOINT + self.amplitude * (raw - MIDPOINT))
            .round()
            .clamp(0.0, MIDI_MAX as f32) as u8;
        if self.last == Some(value) {
            return None;
        }
        self.last = Some(value);
        Some(value)
    }
}

enum WaveformMsg {
    Position([f32; 3]),
    Stop,
}

/// Scheduler-side fan-out of axis positions to every generator.
#[derive(Clone, Default)]
pub struct WaveformInputs {
    txs: Vec<Sender<WaveformMsg>>,
}

impl WaveformInputs {
    pub fn update(&self, position: [f32; 3]) {
        for tx in &self.txs {
            // A stopped worker simply stops listening
            let _ = tx.send(WaveformMsg::Position(position));
        }
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}

struct Worker {
    tx: Sender<WaveformMsg>,
    join_handle: Option<JoinHandle<()>>,
}

/// The running generators, one worker thread each.
pub struct WaveformBank {
    workers: Vec<Worker>,
}

impl WaveformBank {
    pub fn start(bindings: &[WaveformBinding], channel: u8, sink: Arc<dyn EventSink>) -> Self {
        Self::with_period(bindings, channel, sink, SAMPLE_PERIOD)
    }

    pub fn with_period(
        bindings: &[WaveformBinding],
        channel: u8,
        sink: Arc<dyn EventSink>,
        period: Duration,
    ) -> Self {
        let mut workers = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let (tx, rx) = crossbeam_channel::unbounded();
            let generator = WaveformGenerator::new(binding.clone());
            let sink = Arc::clone(&sink);
            let shape = binding.shape.name();
            let spawned = thread::Builder::new()
                .name(format!("gyromidi-waveform-{}", binding.cc))
                .spawn(move || run_generator(generator, rx, channel, sink, period));
            match spawned {
                Ok(handle) => {
                    log::info!(target: "waveform", "started {} generator on cc{}", shape, binding.cc);
                    workers.push(Worker {
                        tx,
                        join_handle: Some(handle),
                    });
                }
                Err(e) => {
                    log::error!(target: "waveform", "could not start generator on cc{}: {}", binding.cc, e)
                }
            }
        }
        Self { workers }
    }

    pub fn inputs(&self) -> WaveformInputs {
        WaveformInputs {
            txs: self.workers.iter().map(|w| w.tx.clone()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Stop every worker and wait for it to exit.
    pub fn stop(&mut self) {
        for worker in &self.workers {
            let _ = worker.tx.send(WaveformMsg::Stop);
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.join_handle.take() {
                if handle.join().is_err() {
                    log::warn!(target: "waveform", "generator thread panicked");
                }
            }
        }
        self.workers.clear();
    }
}

impl Drop for WaveformBank {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_generator(
    mut generator: WaveformGenerator,
    rx: Receiver<WaveformMsg>,
    channel: u8,
    sink: Arc<dyn EventSink>,
    period: Duration,
) {
    let mut deadline = Instant::now() + period;
    loop {
        match rx.recv_deadline(deadline) {
            Ok(WaveformMsg::Position(position)) => generator.set_position(position),
            Ok(WaveformMsg::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if let Some(value) = generator.sample(period) {
                    sink.send(OutputEvent::ControlChange {
                        channel,
                        controller: generator.controller(),
                        value,
                    });
                }
                deadline += period;
                // Skip missed samples instead of bursting to catch up
                let now = Instant::now();
                if deadline < now {
                    deadline = now + period;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use gyromidi_types::Axis;

    #[test]
    fn tables_stay_in_midi_range() {
        for shape in Waveform::all() {
            let t = table(shape);
            assert!(t.iter().all(|v| (0.0..=127.0).contains(v)), "{}", shape.name());
        }
    }

    #[test]
    fn table_shapes() {
        let sine = table(Waveform::Sine);
        assert_eq!(sine[0], 64.0);
        assert!((sine[64] - 127.0).abs() < 0.01);
        assert!((sine[192] - 1.0).abs() < 0.01);

        let triangle = table(Waveform::Triangle);
        assert_eq!(triangle[0], 64.0);
        assert_eq!(triangle[64], 127.0);
        assert_eq!(triangle[192], 0.0);

        let saw = table(Waveform::Sawtooth);
        assert_eq!(saw[0], 64.0);
        assert_eq!(saw[127], 127.0);
        assert_eq!(saw[128], 0.0);

        let square = table(Waveform::Square);
        assert_eq!(square[127], 127.0);
        assert_eq!(square[128], 0.0);
    }

    #[test]
    fn square_wave_alternates() {
        let mut binding = WaveformBinding::new(20, Waveform::Square);
        binding.frequency = 1.0;
        let mut generator = WaveformGenerator::new(binding);
        // A quarter cycle per sample
        let period = Duration::from_millis(250);
        assert_eq!(generator.sample(period), Some(127));
        assert_eq!(generator.sample(period), Some(0));
        assert_eq!(generator.sample(period), None);
        assert_eq!(generator.sample(period), Some(127));
    }

    #[test]
    fn auto_wah_is_silent_until_depth_moves() {
        let mut binding = WaveformBinding::new(74, Waveform::AutoWah);
        binding.depth = Some(Axis::Z);
        let mut generator = WaveformGenerator::new(binding);
        assert_eq!(generator.amplitude(), 0.0);
        assert_eq!(generator.sample(SAMPLE_PERIOD), Some(64));
        assert_eq!(generator.sample(SAMPLE_PERIOD), None);

        generator.set_position([0.0, 0.0, 90.0]);
        assert_eq!(generator.amplitude(), 1.0);
        assert!(generator.sample(Duration::from_millis(250)).is_some());
    }

    #[test]
    fn rate_axis_sets_frequency() {
        let mut binding = WaveformBinding::new(1, Waveform::Sine);
        binding.rate = Some(Axis::X);
        binding.min_hz = 1.0;
        binding.max_hz = 5.0;
        let mut generator = WaveformGenerator::new(binding);
        generator.set_position([0.0, 0.0, 0.0]);
        assert_eq!(generator.frequency(), 3.0);
        generator.set_position([-120.0, 0.0, 0.0]);
        assert_eq!(generator.frequency(), 1.0);
    }

    #[test]
    fn bank_emits_control_changes_and_stops() {
        let (sink, rx) = ChannelSink::new();
        let mut binding = WaveformBinding::new(11, Waveform::Square);
        binding.frequency = 20.0;
        let mut bank =
            WaveformBank::with_period(&[binding], 3, Arc::new(sink), Duration::from_millis(5));
        assert_eq!(bank.len(), 1);
        bank.inputs().update([0.0, 0.0, 0.0]);

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(
            event,
            OutputEvent::ControlChange { channel: 3, controller: 11, .. }
        ));

        bank.stop();
        assert!(bank.is_empty());
        while rx.try_recv().is_ok() {}
        std::thread::sleep(Duration::from_millis(30));
        assert!(rx.try_recv().is_err());
    }
}
