//! Audio output for synthesised speech.
//!
//! [`RodioSink`] wraps a `rodio` output stream and sink; it is the FIFO queue
//! utterances play from. [`PlaybackQueue`] drives it from a dedicated worker
//! thread, synthesising pending utterances just ahead of playback and
//! reporting each one as it finishes. Both sides sit behind the
//! [`AudioSink`] and [`Synthesizer`] traits so the queue can be exercised
//! without an audio device.

pub mod player;
pub mod queue;

pub use player::{AudioSink, RodioSink};
pub use queue::{PlaybackCommand, PlaybackQueue, Synthesizer};
