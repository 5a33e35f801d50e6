use std::{
    fs,
    num::NonZeroUsize,
    path::PathBuf,
};

use anyhow::{Context, Result};

use crate::piper::PiperConfig;
use crate::speech::chunk::DEFAULT_MAX_CHUNK_CHARS;
use crate::speech::{DispatcherOptions, NotReadyPolicy, SpeechRate};

pub const DEFAULT_LOCALE: &str = "en_IN";
pub const DEFAULT_RATE: f32 = 0.7;

/// Resolved reader configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub runtime_dir: PathBuf,
    pub voices_dir: PathBuf,
    pub output_dir: PathBuf,
    pub locale: String,
    pub speaker: Option<String>,
    pub rate: SpeechRate,
    pub chunk_size: NonZeroUsize,
    pub not_ready: NotReadyPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from("runtime"),
            voices_dir: PathBuf::from("assets/voices"),
            output_dir: PathBuf::from("runtime/output"),
            locale: DEFAULT_LOCALE.to_string(),
            speaker: None,
            rate: SpeechRate::new(DEFAULT_RATE),
            chunk_size: DEFAULT_MAX_CHUNK_CHARS,
            not_ready: NotReadyPolicy::Drop,
        }
    }
}

impl Settings {
    /// Create the directories speech output is written to.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!(
                "unable to create output directory {}",
                self.output_dir.display()
            )
        })
    }

    pub fn piper_config(&self) -> PiperConfig {
        PiperConfig {
            runtime_dir: self.runtime_dir.clone(),
            voices_dir: self.voices_dir.clone(),
            output_dir: self.output_dir.clone(),
            locale: self.locale.clone(),
            speaker: self.speaker.clone(),
        }
    }

    pub fn dispatcher_options(&self) -> DispatcherOptions {
        DispatcherOptions {
            max_chunk_chars: self.chunk_size,
            not_ready: self.not_ready,
            initial_rate: self.rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reader_screen() {
        let settings = Settings::default();
        assert_eq!(settings.locale, "en_IN");
        assert_eq!(settings.rate.value(), 0.7);
        assert_eq!(settings.chunk_size.get(), 3900);
        assert_eq!(settings.not_ready, NotReadyPolicy::Drop);
        assert_eq!(settings.output_dir, PathBuf::from("runtime/output"));
    }

    #[test]
    fn prepare_creates_output_directory() {
        let temp = tempfile::tempdir().unwrap();
        let settings = Settings {
            output_dir: temp.path().join("runtime").join("output"),
            ..Settings::default()
        };
        settings.prepare().unwrap();
        assert!(settings.output_dir.is_dir());
    }

    #[test]
    fn options_carry_the_configured_values() {
        let settings = Settings {
            chunk_size: NonZeroUsize::new(120).unwrap(),
            not_ready: NotReadyPolicy::Reject,
            speaker: Some("3".into()),
            ..Settings::default()
        };

        let options = settings.dispatcher_options();
        assert_eq!(options.max_chunk_chars.get(), 120);
        assert_eq!(options.not_ready, NotReadyPolicy::Reject);
        assert_eq!(options.initial_rate, SpeechRate::new(0.7));

        let piper = settings.piper_config();
        assert_eq!(piper.voices_dir, PathBuf::from("assets/voices"));
        assert_eq!(piper.speaker.as_deref(), Some("3"));
    }
}
