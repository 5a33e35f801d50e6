//! Speech output for extracted documents.
//!
//! [`SpeechDispatcher`] splits text into bounded chunks (see [`chunk`]) and
//! submits them, in order, to a [`SpeechEngine`]. The engine owns the actual
//! FIFO playback queue; the dispatcher only tracks readiness, speaking state
//! and completion callbacks.

pub mod chunk;
pub mod dispatcher;
pub mod lifecycle;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub use dispatcher::{Dispatch, DispatchError, DispatcherOptions, NotReadyPolicy, SpeechDispatcher};
pub use lifecycle::EngineState;

/// Playback speed multiplier, always within [`SpeechRate::MIN`] and
/// [`SpeechRate::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct SpeechRate(f32);

impl SpeechRate {
    pub const MIN: f32 = 0.5;
    pub const MAX: f32 = 4.0;
    pub const STEP: f32 = 0.5;
    pub const NORMAL: SpeechRate = SpeechRate(1.0);

    /// Clamp `value` into the supported range. Non-finite values fall back to
    /// normal speed.
    pub fn new(value: f32) -> Self {
        if !value.is_finite() {
            return Self::NORMAL;
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    /// Like [`SpeechRate::new`] but snapped to the nearest slider step.
    pub fn stepped(value: f32) -> Self {
        if !value.is_finite() {
            return Self::NORMAL;
        }
        Self::new((value / Self::STEP).round() * Self::STEP)
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn faster(self) -> Self {
        Self::stepped(self.0 + Self::STEP)
    }

    pub fn slower(self) -> Self {
        Self::stepped(self.0 - Self::STEP)
    }
}

impl Default for SpeechRate {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for SpeechRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}x", self.0)
    }
}

/// Identifier assigned by the dispatcher to every queued chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One chunk of text submitted to the engine's playback queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
}

/// Progress reported by the engine from its own worker context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEvent {
    Finished(UtteranceId),
    Failed(UtteranceId, String),
}

pub type EventListener = Arc<dyn Fn(UtteranceEvent) + Send + Sync>;

/// What the engine settled on while initialising.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProfile {
    pub voice: String,
    pub locale: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("speech engine is not running")]
    NotRunning,
    #[error("no voice available: {0}")]
    NoVoice(String),
    #[error("speech synthesizer unavailable: {0}")]
    Synthesizer(String),
    #[error("audio output unavailable: {0}")]
    AudioOutput(String),
}

/// Platform speech service. Implementations own a FIFO queue: utterances
/// play back-to-back in submission order and `enqueue` never interrupts
/// what is already queued.
pub trait SpeechEngine: Send + Sync {
    /// Blocking initialisation, called once from a background thread.
    fn initialise(&self, listener: EventListener) -> Result<EngineProfile, EngineError>;

    fn enqueue(&self, utterance: Utterance) -> Result<(), EngineError>;

    /// Halts current output and discards everything queued.
    fn stop(&self);

    fn set_rate(&self, rate: SpeechRate);
}
