use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};

use super::AudioSink;
use crate::speech::{EventListener, SpeechRate, Utterance, UtteranceEvent, UtteranceId};

/// Utterances synthesised ahead of the one currently audible.
const SYNTHESIS_AHEAD: usize = 2;
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Turns an utterance into a WAV clip.
pub trait Synthesizer {
    type Error: fmt::Display;

    fn synthesise(&self, utterance: &Utterance) -> Result<Vec<u8>, Self::Error>;
}

#[derive(Debug)]
pub enum PlaybackCommand {
    Enqueue(Utterance),
    Stop,
    SetRate(SpeechRate),
    Shutdown,
}

#[derive(Debug)]
enum Slot {
    Audio(UtteranceId),
    Failed(UtteranceId, String),
}

struct Job {
    generation: u64,
    utterance: Utterance,
}

struct Synthesised {
    generation: u64,
    id: UtteranceId,
    result: Result<Vec<u8>, String>,
}

/// Worker-side state of the speech queue. Utterances are reported finished
/// in submission order, failed ones included.
///
/// Synthesis runs on its own `speech-synth` thread, one utterance at a
/// time, so commands and finished clips are handled while Piper is busy.
pub struct PlaybackQueue<S> {
    sink: S,
    listener: EventListener,
    jobs: Sender<Job>,
    results: Receiver<Synthesised>,
    pending: VecDeque<Utterance>,
    in_flight: Option<UtteranceId>,
    playing: VecDeque<Slot>,
    generation: u64,
}

impl<S: AudioSink> PlaybackQueue<S> {
    pub fn start<Y>(sink: S, synthesizer: Y, listener: EventListener) -> io::Result<Self>
    where
        Y: Synthesizer + Send + 'static,
    {
        let (jobs, job_rx) = mpsc::channel();
        let (result_tx, results) = mpsc::channel();
        thread::Builder::new()
            .name("speech-synth".into())
            .spawn(move || synthesis_worker(synthesizer, job_rx, result_tx))?;

        Ok(Self {
            sink,
            listener,
            jobs,
            results,
            pending: VecDeque::new(),
            in_flight: None,
            playing: VecDeque::new(),
            generation: 0,
        })
    }

    pub fn run(mut self, commands: Receiver<PlaybackCommand>) {
        while self.step(&commands) {}
        debug!("Playback worker exiting");
    }

    /// Nothing pending, nothing being synthesised and nothing audible.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_none() && self.playing.is_empty()
    }

    /// Wait for commands (blocking while idle), collect synthesised clips,
    /// report finished utterances and hand the next pending one to the
    /// synthesis thread if the sink has room. Returns `false` once the
    /// worker should exit.
    pub fn step(&mut self, commands: &Receiver<PlaybackCommand>) -> bool {
        let received = if self.is_idle() {
            commands
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected)
        } else {
            commands.recv_timeout(POLL_INTERVAL)
        };
        match received {
            Ok(command) => {
                if !self.handle(command) {
                    return false;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return false,
        }
        if !self.drain(commands) {
            return false;
        }

        self.collect_synthesised();
        self.report_finished();
        self.request_synthesis();
        true
    }

    fn handle(&mut self, command: PlaybackCommand) -> bool {
        match command {
            PlaybackCommand::Enqueue(utterance) => self.pending.push_back(utterance),
            PlaybackCommand::Stop => {
                // results of the old generation are dropped on arrival
                self.generation += 1;
                self.pending.clear();
                self.in_flight = None;
                self.playing.clear();
                if let Err(err) = self.sink.clear() {
                    error!("Unable to reset audio sink after stop: {err}");
                }
            }
            PlaybackCommand::SetRate(rate) => self.sink.set_speed(rate.value()),
            PlaybackCommand::Shutdown => return false,
        }
        true
    }

    fn drain(&mut self, commands: &Receiver<PlaybackCommand>) -> bool {
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    if !self.handle(command) {
                        return false;
                    }
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn collect_synthesised(&mut self) {
        loop {
            match self.results.try_recv() {
                Ok(done) if done.generation != self.generation => {
                    debug!("Discarding utterance {} synthesised before stop", done.id);
                }
                Ok(done) => {
                    self.in_flight = None;
                    self.start_playback(done.id, done.result);
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    if let Some(id) = self.in_flight.take() {
                        error!("Synthesis worker stopped while utterance {id} was in flight");
                        self.playing
                            .push_back(Slot::Failed(id, "synthesis worker stopped".into()));
                    }
                    return;
                }
            }
        }
    }

    fn request_synthesis(&mut self) {
        if self.in_flight.is_some() || self.audible() >= SYNTHESIS_AHEAD {
            return;
        }
        let Some(utterance) = self.pending.pop_front() else {
            return;
        };
        let id = utterance.id;
        let job = Job {
            generation: self.generation,
            utterance,
        };
        if self.jobs.send(job).is_err() {
            error!("Synthesis worker is not running, utterance {id} cannot be spoken");
            self.playing
                .push_back(Slot::Failed(id, "synthesis worker stopped".into()));
            return;
        }
        self.in_flight = Some(id);
    }

    fn audible(&self) -> usize {
        self.playing
            .iter()
            .filter(|slot| matches!(slot, Slot::Audio(_)))
            .count()
    }

    fn report_finished(&mut self) {
        let mut finished = self.audible().saturating_sub(self.sink.queued());
        while let Some(slot) = self.playing.front() {
            let event = match slot {
                Slot::Failed(id, reason) => UtteranceEvent::Failed(*id, reason.clone()),
                Slot::Audio(id) if finished > 0 => {
                    finished -= 1;
                    UtteranceEvent::Finished(*id)
                }
                Slot::Audio(_) => break,
            };
            self.playing.pop_front();
            (self.listener)(event);
        }
    }

    fn start_playback(&mut self, id: UtteranceId, result: Result<Vec<u8>, String>) {
        let slot = match result {
            Ok(wav) => match self.sink.append_wav(wav) {
                Ok(()) => Slot::Audio(id),
                Err(err) => {
                    warn!("Unable to play utterance {id}: {err}");
                    Slot::Failed(id, err.to_string())
                }
            },
            Err(reason) => Slot::Failed(id, reason),
        };
        self.playing.push_back(slot);
    }
}

fn synthesis_worker<Y: Synthesizer>(synthesizer: Y, jobs: Receiver<Job>, results: Sender<Synthesised>) {
    for Job { generation, utterance } in jobs {
        let result = synthesizer
            .synthesise(&utterance)
            .map_err(|err| err.to_string());
        if let Err(reason) = &result {
            error!("Synthesis of utterance {} failed: {reason}", utterance.id);
        }
        let done = Synthesised {
            generation,
            id: utterance.id,
            result,
        };
        if results.send(done).is_err() {
            break;
        }
    }
    debug!("Synthesis worker exiting");
}
