//! The scheduler: single consumer of the command queue and sole owner of
//! the performance state.
//!
//! Three timing regimes meet here. In one-shot mode notes follow the
//! trigger (and, with glissando, the pitch axis). In free-running arp mode a
//! deferred-note timer re-arms itself every beat. In quantized arp mode
//! notes land on every n-th external clock tick. Timers never call back
//! into the scheduler; they enqueue [`Command::DeferredNote`] and the
//! scheduler ignores any generation but the latest.

use std::sync::Arc;
use std::time::Duration;

use gyromidi_types::{
    Axis, Command, Mode, ModeBindings, Note, OutputEvent, PerformanceSettings, BEND_CENTER,
    BEND_MAX, MIDI_MAX,
};

use crate::controller::Controller;
use crate::interp::{interp, map_angle, reframe, ANGLE_RANGE, MAX_ANGLE};
use crate::note_set::NoteSet;
use crate::queue::CommandReceiver;
use crate::scale::PitchMap;
use crate::sink::EventSink;
use crate::timer::{Clock, TimerFacility, TimerHandle};
use crate::waveform::WaveformInputs;

/// Clock divisors selectable by the speed axis in quantized mode, coarse to
/// fine. At 24 ticks per quarter note, 24 plays quarters and 6 sixteenths.
pub const TICK_DIVISORS: [u32; 12] = [48, 36, 24, 18, 16, 12, 9, 8, 6, 4, 3, 2];
pub const DEFAULT_TICK_MODULUS: u32 = 24;
pub const DEFAULT_BPM: u32 = 120;

const BPM_BREAKPOINTS: [f32; 3] = [-MAX_ANGLE, 0.0, MAX_ANGLE];
const BPM_VALUES: [f32; 3] = [30.0, 120.0, 480.0];
/// Largest note-set shift reachable from the arp note axis.
const MAX_SHIFT: f32 = 8.0;
/// Full-scale potentiometer reading.
const POT_MAX: f32 = 1023.0;

/// Everything the scheduler tracks between commands.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceState {
    pub position: [f32; 3],        // Latest axis angles (the pot drives X)
    pub center: [f32; 3],          // Position captured at the last trigger-on
    pub trigger: bool,
    pub mode: Mode,
    pub quantized: bool,           // Arp notes follow the external clock
    pub last_note: Option<Note>,   // Currently sounding note
    pub pitch_offset: f32,         // Sliding window origin for the note axis
    pub bend_offset: f32,          // Bend axis angle that means "no bend"
    pub bend: u16,                 // Last pitch bend sent
    pub bpm: u32,                  // Free-running arp tempo
    pub tick_modulus: u32,         // Quantized arp: clock ticks per note
    pub tick_count: u64,           // Clock ticks since transport start
    pub running: bool,             // External transport running
    pub last_strike: Option<Duration>, // Clock time of the last playNote
}

impl PerformanceState {
    fn new(quantized: bool) -> Self {
        Self {
            position: [0.0; 3],
            center: [0.0; 3],
            trigger: false,
            mode: Mode::OneShot,
            quantized,
            last_note: None,
            pitch_offset: 0.0,
            bend_offset: 0.0,
            bend: BEND_CENTER,
            bpm: DEFAULT_BPM,
            tick_modulus: DEFAULT_TICK_MODULUS,
            tick_count: 0,
            running: false,
            last_strike: None,
        }
    }
}

/// Interprets commands, owns the note set and controllers, emits events.
pub struct Scheduler {
    settings: PerformanceSettings,
    state: PerformanceState,
    notes: NoteSet,
    pitch_map: PitchMap,
    one_shot_controllers: Vec<Controller>,
    arp_controllers: Vec<Controller>,
    sink: Arc<dyn EventSink>,
    timer: Box<dyn TimerFacility>,
    clock: Arc<dyn Clock>,
    pending: Option<Box<dyn TimerHandle>>,
    generation: u64,
    waveforms: WaveformInputs,
}

impl Scheduler {
    pub fn new(
        settings: PerformanceSettings,
        sink: Arc<dyn EventSink>,
        timer: Box<dyn TimerFacility>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let controllers = |bindings: &ModeBindings| {
            bindings
                .controllers
                .iter()
                .cloned()
                .map(Controller::new)
                .collect::<Vec<_>>()
        };
        Self {
            state: PerformanceState::new(settings.quantize),
            notes: NoteSet::new(settings.pattern.clone()),
            pitch_map: PitchMap::new(settings.base_note, settings.tonality),
            one_shot_controllers: controllers(&settings.one_shot),
            arp_controllers: controllers(&settings.arp),
            settings,
            sink,
            timer,
            clock,
            pending: None,
            generation: 0,
            waveforms: WaveformInputs::default(),
        }
    }

    /// Forward every position update to the waveform bank.
    pub fn with_waveform_inputs(mut self, inputs: WaveformInputs) -> Self {
        self.waveforms = inputs;
        self
    }

    pub fn state(&self) -> &PerformanceState {
        &self.state
    }

    pub fn notes(&self) -> &NoteSet {
        &self.notes
    }

    pub fn settings(&self) -> &PerformanceSettings {
        &self.settings
    }

    /// Whether a deferred-note timer is outstanding.
    pub fn has_pending_note(&self) -> bool {
        self.pending.is_some()
    }

    /// Consume commands until `Shutdown` arrives or every sender is gone.
    pub fn run(mut self, rx: CommandReceiver) {
        log::info!(target: "scheduler", "scheduler started");
        let mut batch = Vec::new();
        'outer: while rx.wait_batch(&mut batch) {
            for cmd in batch.drain(..) {
                if self.handle_cmd(cmd) {
                    break 'outer;
                }
            }
        }
        self.shutdown();
        log::info!(target: "scheduler", "scheduler stopped");
    }

    /// Apply one command. Returns true when the loop should stop.
    pub fn handle_cmd(&mut self, cmd: Command) -> bool {
        if cmd.is_continuous() {
            log::trace!(target: "scheduler", "{:?}", cmd);
        } else {
            log::debug!(target: "scheduler", "{:?}", cmd);
        }
        match cmd {
            Command::TriggerOn => self.trigger_on(),
            Command::TriggerOff => self.trigger_off(),
            Command::ModeOn => self.set_mode(Mode::Arp),
            Command::ModeOff => self.set_mode(Mode::OneShot),
            Command::SetAxes { x, y, z } => self.set_position([x, y, z]),
            Command::SetPot { value } => {
                let [_, y, z] = self.state.position;
                self.set_position([pot_to_angle(value, self.settings.gamma), y, z]);
            }
            Command::PushNote { pitch } => self.notes.push(pitch),
            Command::PopNote { pitch } => {
                if !self.notes.pop(pitch) {
                    log::trace!(target: "scheduler", "pop of absent pitch {}", pitch);
                }
            }
            Command::TransportStart => self.transport_start(),
            Command::TransportStop => self.state.running = false,
            Command::TransportTick => self.transport_tick(),
            Command::DeferredNote { generation } => self.deferred_note(generation),
            Command::Shutdown => return true,
        }
        false
    }

    /// Cancel the pending timer and leave the output silent.
    pub fn shutdown(&mut self) {
        self.cancel_pending();
        self.release();
        self.state.trigger = false;
    }

    // ── Trigger & mode ────────────────────────────────────────────

    fn trigger_on(&mut self) {
        if self.state.trigger {
            return;
        }
        self.state.trigger = true;
        self.reset_bend(true);
        self.state.center = self.state.position;
        // Speed is read relative to the new center
        self.state.bpm = self.bpm();
        self.state.tick_modulus = self.tick_modulus();
        self.recenter_controllers();
        self.notes.reset();
        self.play_note();
    }

    fn trigger_off(&mut self) {
        if !self.state.trigger {
            return;
        }
        self.state.trigger = false;
        self.cancel_pending();
        self.release();
    }

    fn set_mode(&mut self, mode: Mode) {
        self.state.mode = mode;
        // The note axis means something else now; start its window here
        if let Some(axis) = self.bindings().note {
            self.state.pitch_offset = self.state.position[axis.index()];
        }
        if !self.state.trigger {
            return;
        }
        self.recenter_controllers();
        if mode == Mode::OneShot {
            self.cancel_pending();
        }
        self.restart_sequence();
    }

    // ── Continuous input ──────────────────────────────────────────

    fn set_position(&mut self, position: [f32; 3]) {
        self.state.position = position;
        self.waveforms.update(position);
        self.update_bend();
        if self.state.mode == Mode::Arp {
            if self.state.quantized {
                self.state.tick_modulus = self.tick_modulus();
            } else {
                self.update_tempo();
            }
        }
        if self.state.trigger {
            self.update_controllers();
            if self.state.mode == Mode::OneShot && self.settings.gliss {
                self.glide();
            }
        }
    }

    fn update_bend(&mut self) {
        let bend = self.bend();
        if bend != self.state.bend {
            self.state.bend = bend;
            self.emit(OutputEvent::PitchBend {
                channel: self.settings.channel,
                value: bend,
            });
        }
    }

    /// Make the current bend axis angle the new zero and center the bend.
    fn reset_bend(&mut self, force: bool) {
        if let Some(axis) = self.bindings().bend {
            self.state.bend_offset = self.state.position[axis.index()];
        }
        let changed = self.state.bend != BEND_CENTER;
        self.state.bend = BEND_CENTER;
        if force || changed {
            self.emit(OutputEvent::PitchBend {
                channel: self.settings.channel,
                value: BEND_CENTER,
            });
        }
    }

    /// Pitch bend for the current position, centered when unbound.
    pub fn bend(&self) -> u16 {
        match self.bindings().bend {
            Some(axis) => {
                let angle = self.state.position[axis.index()] - self.state.bend_offset;
                map_angle(angle, 0.0, BEND_MAX as f32).round() as u16
            }
            None => BEND_CENTER,
        }
    }

    fn update_tempo(&mut self) {
        let bpm = self.bpm();
        if bpm == self.state.bpm {
            return;
        }
        self.state.bpm = bpm;
        if !self.state.trigger {
            return;
        }
        self.cancel_pending();
        let period = beat_period(bpm);
        let elapsed = self
            .state
            .last_strike
            .map(|t| self.clock.now().saturating_sub(t));
        match elapsed {
            Some(elapsed) if elapsed <= period => self.schedule_note(period - elapsed),
            // Already overdue at the new tempo
            _ => self.play_note(),
        }
    }

    /// Arp tempo from the speed axis relative to the trigger-on center.
    pub fn bpm(&self) -> u32 {
        match self.settings.speed {
            Some(axis) => interp(self.relative(axis), &BPM_BREAKPOINTS, &BPM_VALUES) as u32,
            None => DEFAULT_BPM,
        }
    }

    /// Clock ticks per quantized arp note, chosen by the speed axis.
    pub fn tick_modulus(&self) -> u32 {
        match self.settings.speed {
            Some(axis) => {
                let last = (TICK_DIVISORS.len() - 1) as f32;
                let index = map_angle(self.relative(axis), 0.0, last) as usize;
                TICK_DIVISORS[index.min(TICK_DIVISORS.len() - 1)]
            }
            None => DEFAULT_TICK_MODULUS,
        }
    }

    fn update_controllers(&mut self) {
        let position = self.state.position;
        let channel = self.settings.channel;
        let mut changes = Vec::new();
        for controller in self.controllers_mut() {
            if let Some(change) = controller.update(position[controller.axis().index()]) {
                changes.push(change);
            }
        }
        for (controller, value) in changes {
            self.emit(OutputEvent::ControlChange {
                channel,
                controller,
                value,
            });
        }
    }

    fn recenter_controllers(&mut self) {
        let position = self.state.position;
        for controller in self.controllers_mut() {
            controller.recenter(position[controller.axis().index()]);
        }
    }

    /// Retarget a held one-shot note when the pitch axis crosses into a new
    /// pitch.
    fn glide(&mut self) {
        let pitch = self.next_pitch();
        if pitch == self.state.last_note.map(|n| n.pitch) {
            return;
        }
        if !self.settings.legato {
            self.stop_note();
        }
        self.reset_bend(false);
        self.play_note();
    }

    // ── Notes ─────────────────────────────────────────────────────

    /// Stop the sounding note, advance the arpeggio, strike the next note
    /// and, in free-running arp mode, arm the timer for the following one.
    fn play_note(&mut self) {
        let previous = self.state.last_note.take();
        if previous.is_some() && self.state.mode == Mode::Arp {
            self.notes.next();
        }
        let velocity = self.velocity();
        let note = self
            .next_pitch()
            .and_then(|pitch| Note::new(pitch as i32, velocity));

        match (previous, note) {
            (Some(old), Some(new)) if self.settings.legato && old.pitch != new.pitch => {
                self.note_on(new);
                self.note_off(old);
            }
            _ => {
                if let Some(old) = previous {
                    self.note_off(old);
                }
                if let Some(new) = note {
                    self.note_on(new);
                }
            }
        }
        self.state.last_note = note;
        self.state.last_strike = Some(self.clock.now());

        if self.state.mode == Mode::Arp && self.state.trigger && !self.state.quantized {
            self.schedule_note(beat_period(self.state.bpm));
        }
    }

    /// Start the arpeggio over from its first step.
    fn restart_sequence(&mut self) {
        self.stop_note();
        self.notes.reset();
        self.play_note();
    }

    fn stop_note(&mut self) {
        if let Some(note) = self.state.last_note.take() {
            self.note_off(note);
        }
    }

    /// Stop the sounding note and close the gate controllers it opened.
    fn release(&mut self) {
        if let Some(note) = self.state.last_note.take() {
            self.note_off(note);
            self.gate(0);
        }
    }

    fn note_on(&self, note: Note) {
        self.emit(OutputEvent::note_on(self.settings.channel, note));
        self.gate(MIDI_MAX);
    }

    fn gate(&self, value: u8) {
        for &controller in &self.settings.gate_controllers {
            self.emit(OutputEvent::ControlChange {
                channel: self.settings.channel,
                controller,
                value,
            });
        }
    }

    fn note_off(&self, note: Note) {
        self.emit(OutputEvent::note_off(self.settings.channel, note));
    }

    /// Pitch of the next note, `None` when there is nothing valid to play.
    fn next_pitch(&mut self) -> Option<u8> {
        let note_axis = self.bindings().note;
        match self.state.mode {
            Mode::Arp => {
                let shift = match note_axis {
                    Some(axis) => {
                        let angle = reframe(
                            self.state.position[axis.index()],
                            &mut self.state.pitch_offset,
                        );
                        map_angle(angle, -MAX_SHIFT, MAX_SHIFT).round() as i32
                    }
                    None => 0,
                };
                self.notes.get(shift)
            }
            Mode::OneShot => {
                let pitch = match note_axis {
                    Some(axis) => {
                        let angle = reframe(
                            self.state.position[axis.index()],
                            &mut self.state.pitch_offset,
                        );
                        let half = self.pitch_map.window(self.settings.octaves) as f32 / 2.0;
                        let index = map_angle(angle, -half, half).round() as i32;
                        self.pitch_map.pitch(index)
                    }
                    None => self.settings.base_note as i32,
                };
                Note::new(pitch, 0).map(|n| n.pitch)
            }
        }
    }

    /// Velocity axis relative to the trigger-on center, else the fixed
    /// velocity.
    fn velocity(&self) -> u8 {
        match self.bindings().velocity {
            Some(axis) => map_angle(self.relative(axis), 1.0, MIDI_MAX as f32).round() as u8,
            None => self.settings.velocity,
        }
    }

    // ── Deferred note timer ───────────────────────────────────────

    fn schedule_note(&mut self, delay: Duration) {
        self.cancel_pending();
        self.generation += 1;
        let handle = self
            .timer
            .schedule(delay, Command::DeferredNote { generation: self.generation });
        self.pending = Some(handle);
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.cancel();
        }
    }

    fn deferred_note(&mut self, generation: u64) {
        if self.pending.is_none() || generation != self.generation {
            log::trace!(target: "scheduler", "stale deferred note {} ignored", generation);
            return;
        }
        self.pending = None;
        if self.state.trigger && self.state.mode == Mode::Arp && !self.state.quantized {
            self.play_note();
        }
    }

    // ── Transport ─────────────────────────────────────────────────

    fn transport_start(&mut self) {
        self.state.running = true;
        self.state.tick_count = 0;
        if self.state.trigger && self.state.mode == Mode::Arp && self.state.quantized {
            self.restart_sequence();
        }
    }

    fn transport_tick(&mut self) {
        self.state.tick_count += 1;
        if self.state.trigger
            && self.state.mode == Mode::Arp
            && self.state.quantized
            && self.state.tick_count % self.state.tick_modulus.max(1) as u64 == 0
        {
            self.play_note();
        }
    }

    // ── Helpers ───────────────────────────────────────────────────

    fn bindings(&self) -> &ModeBindings {
        self.settings.bindings(self.state.mode)
    }

    fn controllers_mut(&mut self) -> &mut Vec<Controller> {
        match self.state.mode {
            Mode::OneShot => &mut self.one_shot_controllers,
            Mode::Arp => &mut self.arp_controllers,
        }
    }

    fn relative(&self, axis: Axis) -> f32 {
        self.state.position[axis.index()] - self.state.center[axis.index()]
    }

    fn emit(&self, event: OutputEvent) {
        self.sink.send(event);
    }
}

/// Potentiometer reading to an angle: normalise, apply the gamma curve,
/// spread over the ±90° window.
pub fn pot_to_angle(value: u16, gamma: f32) -> f32 {
    let normalised = (value as f32 / POT_MAX).clamp(0.0, 1.0);
    let gamma = if gamma > 0.0 { gamma } else { 1.0 };
    interp(normalised.powf(gamma), &[0.0, 1.0], &ANGLE_RANGE)
}

fn beat_period(bpm: u32) -> Duration {
    Duration::from_secs_f64(60.0 / bpm.max(1) as f64)
}
