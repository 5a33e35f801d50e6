//! Piper-backed [`SpeechEngine`].
//!
//! Initialisation picks a voice model for the configured locale, resolves
//! how to launch Piper and opens the default audio device on a dedicated
//! playback thread. From then on the engine only forwards commands to that
//! thread, which owns the speech queue.

pub mod synth;
pub mod voices;

use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::audio::{PlaybackCommand, PlaybackQueue, RodioSink};
use crate::speech::{EngineError, EngineProfile, EventListener, SpeechEngine, SpeechRate, Utterance};
use crate::util::piper_path;

pub use synth::PiperSynthesizer;
pub use voices::{VoiceInfo, VoiceLibrary};

#[derive(Debug, Clone)]
pub struct PiperConfig {
    pub runtime_dir: PathBuf,
    pub voices_dir: PathBuf,
    pub output_dir: PathBuf,
    pub locale: String,
    pub speaker: Option<String>,
}

pub struct PiperEngine {
    config: PiperConfig,
    commands: Mutex<Option<Sender<PlaybackCommand>>>,
}

impl PiperEngine {
    pub fn new(config: PiperConfig) -> Self {
        Self {
            config,
            commands: Mutex::new(None),
        }
    }

    fn send(&self, command: PlaybackCommand) -> Result<(), EngineError> {
        self.commands
            .lock()
            .as_ref()
            .ok_or(EngineError::NotRunning)?
            .send(command)
            .map_err(|_| EngineError::NotRunning)
    }

    fn select_voice(&self) -> Result<VoiceInfo, EngineError> {
        let library = VoiceLibrary::discover(&self.config.voices_dir);
        let voice = library.select(&self.config.locale).cloned().ok_or_else(|| {
            EngineError::NoVoice(format!(
                "no Piper models (*.onnx) under {}",
                library.base_dir().display()
            ))
        })?;
        let wanted = voices::normalise_locale(&self.config.locale);
        if voice.language.as_deref().map(voices::normalise_locale) != Some(wanted) {
            let available: Vec<&str> = library.list().iter().map(|v| v.id.as_str()).collect();
            warn!(
                "No voice for locale {}, falling back to {} ({}); available: {}",
                self.config.locale,
                voice.label,
                voice.language.as_deref().unwrap_or("unknown locale"),
                available.join(", ")
            );
        }
        info!("Using voice {} from {}", voice.id, voice.model_path.display());
        Ok(voice)
    }
}

impl SpeechEngine for PiperEngine {
    fn initialise(&self, listener: EventListener) -> Result<EngineProfile, EngineError> {
        let voice = self.select_voice()?;
        let command = piper_path::resolve(&self.config.runtime_dir)
            .map_err(|err| EngineError::Synthesizer(err.to_string()))?;
        debug!("Launching Piper as {command:?}");
        let synthesizer = PiperSynthesizer::new(
            command,
            voice.model_path.clone(),
            voice.config_path.clone(),
            self.config.output_dir.clone(),
            self.config.speaker.clone(),
        );

        let (commands, receiver) = mpsc::channel();
        let (started_tx, started_rx) = mpsc::channel();
        thread::Builder::new()
            .name("speech-playback".into())
            .spawn(move || {
                let queue = RodioSink::open_default()
                    .map_err(|err| EngineError::AudioOutput(err.to_string()))
                    .and_then(|sink| {
                        PlaybackQueue::start(sink, synthesizer, listener)
                            .map_err(|err| EngineError::Synthesizer(err.to_string()))
                    });
                match queue {
                    Ok(queue) => {
                        let _ = started_tx.send(Ok(()));
                        queue.run(receiver);
                    }
                    Err(err) => {
                        let _ = started_tx.send(Err(err));
                    }
                }
            })
            .map_err(|err| EngineError::AudioOutput(err.to_string()))?;

        started_rx
            .recv()
            .map_err(|_| EngineError::AudioOutput("playback thread exited early".into()))??;

        *self.commands.lock() = Some(commands);
        Ok(EngineProfile {
            voice: voice.id,
            locale: voice.language,
            quality: voice.quality,
        })
    }

    fn enqueue(&self, utterance: Utterance) -> Result<(), EngineError> {
        self.send(PlaybackCommand::Enqueue(utterance))
    }

    fn stop(&self) {
        if self.send(PlaybackCommand::Stop).is_err() {
            debug!("Stop requested but the playback thread is not running");
        }
    }

    fn set_rate(&self, rate: SpeechRate) {
        if self.send(PlaybackCommand::SetRate(rate)).is_err() {
            debug!("Rate change ignored, the playback thread is not running");
        }
    }
}

impl Drop for PiperEngine {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.lock().take() {
            let _ = commands.send(PlaybackCommand::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::speech::{UtteranceEvent, UtteranceId};

    fn config(temp: &assert_fs::TempDir) -> PiperConfig {
        PiperConfig {
            runtime_dir: temp.path().join("runtime"),
            voices_dir: temp.path().join("voices"),
            output_dir: temp.path().join("output"),
            locale: "en_IN".into(),
            speaker: None,
        }
    }

    #[test]
    fn initialise_without_voices_fails() {
        let temp = assert_fs::TempDir::new().unwrap();
        let engine = PiperEngine::new(config(&temp));
        let error = engine.initialise(Arc::new(|_: UtteranceEvent| {})).unwrap_err();
        assert!(matches!(error, EngineError::NoVoice(message) if message.contains("voices")));
    }

    #[test]
    fn commands_before_initialisation_report_not_running() {
        let temp = assert_fs::TempDir::new().unwrap();
        let engine = PiperEngine::new(config(&temp));
        let error = engine
            .enqueue(Utterance {
                id: UtteranceId(1),
                text: "Hello. ".into(),
            })
            .unwrap_err();
        assert!(matches!(error, EngineError::NotRunning));
        engine.stop();
        engine.set_rate(SpeechRate::NORMAL);
    }
}
