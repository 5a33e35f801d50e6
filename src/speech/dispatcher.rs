use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use thiserror::Error;

use super::chunk::{split_into_chunks, DEFAULT_MAX_CHUNK_CHARS};
use super::lifecycle::{EngineState, Lifecycle};
use super::{
    EngineError, EventListener, SpeechEngine, SpeechRate, Utterance, UtteranceEvent, UtteranceId,
};

pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// What `speak` does while the engine has not finished initialising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotReadyPolicy {
    /// Queue nothing and report [`Dispatch::Dropped`].
    #[default]
    Drop,
    /// Fail with [`DispatchError::NotReady`].
    Reject,
}

#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    pub max_chunk_chars: NonZeroUsize,
    pub not_ready: NotReadyPolicy,
    pub initial_rate: SpeechRate,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            not_ready: NotReadyPolicy::Drop,
            initial_rate: SpeechRate::NORMAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Queued { chunks: usize },
    Dropped,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("speech engine is {0}")]
    NotReady(&'static str),
    #[error("failed to queue chunk {index} of {total}: {source}")]
    Engine {
        index: usize,
        total: usize,
        #[source]
        source: EngineError,
    },
}

#[derive(Default)]
struct Progress {
    outstanding: BTreeSet<UtteranceId>,
    callbacks: HashMap<UtteranceId, CompletionCallback>,
}

struct Shared {
    engine: Arc<dyn SpeechEngine>,
    lifecycle: Lifecycle,
    progress: Mutex<Progress>,
    rate: Mutex<SpeechRate>,
    next_id: AtomicU64,
}

impl Shared {
    fn initialise(self: Arc<Self>) {
        let weak: Weak<Shared> = Arc::downgrade(&self);
        let listener: EventListener = Arc::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.on_event(event);
            }
        });

        match self.engine.initialise(listener) {
            Ok(profile) => {
                let rate = self.rate.lock();
                self.engine.set_rate(*rate);
                info!(
                    "Speech engine ready with voice {} ({}) at {}",
                    profile.voice,
                    profile.locale.as_deref().unwrap_or("unknown locale"),
                    *rate
                );
                self.lifecycle.mark_ready(profile);
            }
            Err(err) => {
                error!("Speech engine failed to initialise: {err}");
                self.lifecycle.mark_failed(err.to_string());
            }
        }
    }

    fn on_event(&self, event: UtteranceEvent) {
        let callback = {
            let mut progress = self.progress.lock();
            let id = match &event {
                UtteranceEvent::Finished(id) => *id,
                UtteranceEvent::Failed(id, reason) => {
                    warn!("Utterance {id} could not be played: {reason}");
                    *id
                }
            };
            if !progress.outstanding.remove(&id) {
                debug!("Ignoring event for untracked utterance {id}");
                return;
            }
            progress.callbacks.remove(&id)
        };

        if let Some(callback) = callback {
            debug!("Last queued chunk finished, notifying caller");
            callback();
        }
    }
}

/// Splits text into chunks and feeds them to a [`SpeechEngine`].
///
/// Initialisation starts on a background thread as soon as the dispatcher
/// is created. Until it succeeds, `stop_speaking` is a no-op and
/// `set_speech_rate` only records the rate, which is applied once the engine
/// is ready. `speak` follows [`NotReadyPolicy`].
pub struct SpeechDispatcher {
    shared: Arc<Shared>,
    options: DispatcherOptions,
}

impl SpeechDispatcher {
    pub fn start(engine: Arc<dyn SpeechEngine>, options: DispatcherOptions) -> Self {
        let shared = Arc::new(Shared {
            engine,
            lifecycle: Lifecycle::new(),
            progress: Mutex::new(Progress::default()),
            rate: Mutex::new(options.initial_rate),
            next_id: AtomicU64::new(1),
        });

        let background = Arc::clone(&shared);
        if let Err(err) = thread::Builder::new()
            .name("speech-init".into())
            .spawn(move || background.initialise())
        {
            error!("Unable to spawn speech engine initialisation: {err}");
            shared.lifecycle.mark_failed(err.to_string());
        }

        Self { shared, options }
    }

    pub fn state(&self) -> EngineState {
        self.shared.lifecycle.state()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.lifecycle.is_ready()
    }

    pub fn wait_ready(&self, timeout: Duration) -> bool {
        self.shared.lifecycle.wait_ready(timeout)
    }

    /// `true` while chunks submitted by `speak` are still queued or playing.
    pub fn is_speaking(&self) -> bool {
        !self.shared.progress.lock().outstanding.is_empty()
    }

    pub fn rate(&self) -> SpeechRate {
        *self.shared.rate.lock()
    }

    /// Queue `text` for playback after anything already queued.
    ///
    /// `on_complete` runs on the engine's worker thread once the last chunk
    /// of this call has left the queue. It is dropped without being called
    /// if playback is stopped first. Empty text queues nothing and calls it
    /// immediately.
    pub fn speak<F>(&self, text: &str, on_complete: F) -> Result<Dispatch, DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        let state = self.shared.lifecycle.state();
        if !state.is_ready() {
            return match self.options.not_ready {
                NotReadyPolicy::Drop => {
                    warn!("Ignoring speak request, speech engine is {}", state.label());
                    Ok(Dispatch::Dropped)
                }
                NotReadyPolicy::Reject => Err(DispatchError::NotReady(state.label())),
            };
        }

        let chunks = split_into_chunks(text, self.options.max_chunk_chars);
        if chunks.is_empty() {
            debug!("Nothing to speak");
            on_complete();
            return Ok(Dispatch::Queued { chunks: 0 });
        }

        let total = chunks.len();
        let first = self.shared.next_id.fetch_add(total as u64, Ordering::SeqCst);
        let ids: Vec<UtteranceId> = (first..first + total as u64).map(UtteranceId).collect();
        {
            let mut progress = self.shared.progress.lock();
            progress.outstanding.extend(ids.iter().copied());
            if let Some(last) = ids.last() {
                progress.callbacks.insert(*last, Box::new(on_complete));
            }
        }

        info!("Queueing {total} chunk(s) for speech");
        for (index, (id, text)) in ids.iter().copied().zip(chunks).enumerate() {
            if let Err(source) = self.shared.engine.enqueue(Utterance { id, text }) {
                error!("Speech engine rejected chunk {} of {total}: {source}", index + 1);
                let mut progress = self.shared.progress.lock();
                for id in &ids[index..] {
                    progress.outstanding.remove(id);
                    progress.callbacks.remove(id);
                }
                return Err(DispatchError::Engine {
                    index: index + 1,
                    total,
                    source,
                });
            }
        }

        Ok(Dispatch::Queued { chunks: total })
    }

    /// Halt current and queued playback. Pending completion callbacks are
    /// discarded.
    pub fn stop_speaking(&self) {
        if !self.is_ready() {
            return;
        }
        {
            let mut progress = self.shared.progress.lock();
            if progress.outstanding.is_empty() {
                return;
            }
            progress.outstanding.clear();
            progress.callbacks.clear();
        }
        info!("Stopping speech");
        self.shared.engine.stop();
    }

    pub fn set_speech_rate(&self, rate: SpeechRate) -> SpeechRate {
        let mut current = self.shared.rate.lock();
        *current = rate;
        if self.shared.lifecycle.is_ready() {
            info!("Speech rate set to {rate}");
            self.shared.engine.set_rate(rate);
        } else {
            debug!("Speech rate {rate} recorded until the engine is ready");
        }
        rate
    }
}
