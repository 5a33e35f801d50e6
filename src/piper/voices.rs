use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use serde::Deserialize;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    pub id: String,
    pub label: String,
    pub language: Option<String>,
    pub quality: Option<String>,
    pub model_path: PathBuf,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct VoiceMetadata {
    #[serde(default)]
    language: Option<LanguageMetadata>,
    #[serde(default)]
    audio: Option<AudioMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct LanguageMetadata {
    code: Option<String>,
    name_native: Option<String>,
    name_english: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AudioMetadata {
    quality: Option<String>,
}

/// Piper voice models (`*.onnx`) found under a directory, with their
/// `*.onnx.json` metadata when present.
#[derive(Debug, Default)]
pub struct VoiceLibrary {
    base_dir: PathBuf,
    voices: Vec<VoiceInfo>,
}

impl VoiceLibrary {
    pub fn discover(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let mut voices = Vec::new();
        if base_dir.exists() {
            for entry in WalkDir::new(&base_dir)
                .into_iter()
                .filter_map(Result::ok)
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("onnx") {
                    continue;
                }
                if let Some(info) = build_voice_info(path) {
                    voices.push(info);
                }
            }
        }
        voices.sort_by(|a, b| a.id.cmp(&b.id));
        debug!("Found {} voice(s) under {}", voices.len(), base_dir.display());
        Self { base_dir, voices }
    }

    pub fn list(&self) -> &[VoiceInfo] {
        &self.voices
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Pick the voice for `locale` (`en_IN`, `en-in`, ...): an exact match,
    /// else one for the same language, else the first voice available.
    pub fn select(&self, locale: &str) -> Option<&VoiceInfo> {
        let wanted = normalise_locale(locale);
        let language = wanted.split('_').next().unwrap_or_default().to_string();
        let voice_locale = |voice: &VoiceInfo| voice.language.as_deref().map(normalise_locale);

        self.voices
            .iter()
            .find(|voice| voice_locale(*voice).as_deref() == Some(wanted.as_str()))
            .or_else(|| {
                self.voices.iter().find(|voice| {
                    voice_locale(*voice)
                        .map(|code| code.split('_').next() == Some(language.as_str()))
                        .unwrap_or(false)
                })
            })
            .or_else(|| self.voices.first())
    }
}

pub(crate) fn normalise_locale(locale: &str) -> String {
    locale.trim().replace('-', "_").to_lowercase()
}

fn build_voice_info(path: &Path) -> Option<VoiceInfo> {
    let id = path.file_stem()?.to_string_lossy().to_string();
    let config_path = metadata_path_for(path);
    let metadata = config_path
        .as_ref()
        .and_then(|path| match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str::<VoiceMetadata>(&contents)
                .map_err(|err| {
                    warn!("Failed to parse metadata {}: {err}", path.display());
                    err
                })
                .ok(),
            Err(err) => {
                warn!("Failed to read metadata {}: {err}", path.display());
                None
            }
        })
        .unwrap_or_default();

    let language = metadata.language.unwrap_or_default();
    let label = language
        .name_native
        .as_deref()
        .or(language.name_english.as_deref())
        .map(|name| format!("{name} · {id}"))
        .unwrap_or_else(|| id.clone());

    Some(VoiceInfo {
        id,
        label,
        language: language.code,
        quality: metadata.audio.and_then(|audio| audio.quality),
        model_path: path.to_path_buf(),
        config_path,
    })
}

fn metadata_path_for(path: &Path) -> Option<PathBuf> {
    let mut metadata_path = path.to_path_buf();
    metadata_path.set_extension("onnx.json");
    if metadata_path.exists() {
        Some(metadata_path)
    } else {
        None
    }
}
