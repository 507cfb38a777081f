//! Running engine: the scheduler thread, its timer facility and the
//! waveform bank, behind one handle.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use gyromidi_types::{Command, PerformanceSettings};

use crate::error::EngineResult;
use crate::queue::{CommandQueue, CommandSender};
use crate::scheduler::Scheduler;
use crate::sink::EventSink;
use crate::timer::{SystemClock, ThreadTimer};
use crate::waveform::WaveformBank;

pub struct Engine {
    sender: CommandSender,
    scheduler_thread: Option<JoinHandle<()>>,
    waveforms: WaveformBank,
}

impl Engine {
    /// Spawn the scheduler thread and start every configured waveform.
    pub fn start(settings: PerformanceSettings, sink: Arc<dyn EventSink>) -> EngineResult<Self> {
        let queue = CommandQueue::new();
        let sender = queue.sender();

        let waveforms = WaveformBank::start(&settings.waveforms, settings.channel, Arc::clone(&sink));
        let scheduler = Scheduler::new(
            settings,
            sink,
            Box::new(ThreadTimer::new(queue.sender())),
            Arc::new(SystemClock::new()),
        )
        .with_waveform_inputs(waveforms.inputs());

        let receiver = queue.receiver();
        let scheduler_thread = thread::Builder::new()
            .name("gyromidi-scheduler".to_string())
            .spawn(move || scheduler.run(receiver))?;

        log::info!(target: "engine", "engine started");
        Ok(Self {
            sender,
            scheduler_thread: Some(scheduler_thread),
            waveforms,
        })
    }

    /// Producer handle for a device listener.
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    pub fn send(&self, cmd: Command) {
        self.sender.send(cmd);
    }

    /// Release the trigger, stop the scheduler and every waveform, and wait
    /// for their threads. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.scheduler_thread.take() else {
            return;
        };
        self.sender.request_terminate();
        if handle.join().is_err() {
            log::error!(target: "engine", "scheduler thread panicked");
        }
        self.waveforms.stop();
        log::info!(target: "engine", "engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.scheduler_thread.is_some()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;
    use gyromidi_types::OutputEvent;
    use std::time::Duration;

    #[test]
    fn start_play_and_shut_down_silently() {
        let (sink, events) = ChannelSink::new();
        let mut engine = Engine::start(PerformanceSettings::default(), Arc::new(sink)).unwrap();
        assert!(engine.is_running());
        engine.send(Command::TriggerOn);

        let mut saw_note_on = false;
        while let Ok(event) = events.recv_timeout(Duration::from_secs(2)) {
            if matches!(event, OutputEvent::NoteOn { note: 48, .. }) {
                saw_note_on = true;
                break;
            }
        }
        assert!(saw_note_on);

        engine.shutdown();
        assert!(!engine.is_running());
        let rest: Vec<OutputEvent> = events.try_iter().collect();
        assert!(rest.iter().any(|e| matches!(e, OutputEvent::NoteOff { note: 48, .. })));
        engine.shutdown();
    }
}
