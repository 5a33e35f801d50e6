use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    time::Instant,
};

use log::{debug, warn};
use thiserror::Error;

use crate::audio::Synthesizer;
use crate::speech::Utterance;
use crate::util::piper_path::{command_to_args, PiperCommand};

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("voice model not found at {}", .0.display())]
    VoiceNotFound(PathBuf),
    #[error("failed to spawn Piper process: {0}")]
    SpawnFailure(#[source] std::io::Error),
    #[error("Piper exited with status {status}: {stderr}")]
    PiperFailure { status: i32, stderr: String },
    #[error("Piper succeeded but did not write {}", .0.display())]
    MissingOutput(PathBuf),
    #[error("{0}")]
    Io(String),
}

/// Runs one Piper process per utterance, writing a WAV file into
/// `output_dir` that is read back and removed.
#[derive(Debug, Clone)]
pub struct PiperSynthesizer {
    command: PiperCommand,
    model_path: PathBuf,
    config_path: Option<PathBuf>,
    output_dir: PathBuf,
    speaker: Option<String>,
}

impl PiperSynthesizer {
    pub fn new(
        command: PiperCommand,
        model_path: PathBuf,
        config_path: Option<PathBuf>,
        output_dir: PathBuf,
        speaker: Option<String>,
    ) -> Self {
        Self {
            command,
            model_path,
            config_path,
            output_dir,
            speaker,
        }
    }

    fn output_path(&self, utterance: &Utterance) -> PathBuf {
        self.output_dir
            .join(format!("utterance-{}.wav", utterance.id))
    }

    fn build_command(&self, output_path: &Path) -> Result<Command, SynthesisError> {
        if !self.model_path.exists() {
            return Err(SynthesisError::VoiceNotFound(self.model_path.clone()));
        }
        fs::create_dir_all(&self.output_dir).map_err(|err| {
            SynthesisError::Io(format!(
                "Unable to create output directory {}: {err}",
                self.output_dir.display()
            ))
        })?;

        let (program, args) = command_to_args(&self.command);
        let mut command = Command::new(program);
        command.args(args);
        command.arg("--model");
        command.arg(&self.model_path);
        if let Some(config_path) = &self.config_path {
            command.arg("--config");
            command.arg(config_path);
        }
        command.arg("--output_file");
        command.arg(output_path);
        if let Some(speaker) = &self.speaker {
            command.arg("--speaker");
            command.arg(speaker);
        }
        Ok(command)
    }
}

impl Synthesizer for PiperSynthesizer {
    type Error = SynthesisError;

    fn synthesise(&self, utterance: &Utterance) -> Result<Vec<u8>, SynthesisError> {
        let start = Instant::now();
        let output_path = self.output_path(utterance);
        let mut command = self.build_command(&output_path)?;
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(SynthesisError::SpawnFailure)?;
        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| SynthesisError::Io("Failed to access Piper stdin".into()))?;
            stdin
                .write_all(utterance.text.as_bytes())
                .map_err(|err| SynthesisError::Io(err.to_string()))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|err| SynthesisError::Io(err.to_string()))?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(SynthesisError::PiperFailure {
                status: output.status.code().unwrap_or_default(),
                stderr,
            });
        }
        if !output_path.exists() {
            return Err(SynthesisError::MissingOutput(output_path));
        }

        let wav = fs::read(&output_path).map_err(|err| SynthesisError::Io(err.to_string()))?;
        if let Err(err) = fs::remove_file(&output_path) {
            warn!("Unable to remove {}: {err}", output_path.display());
        }
        debug!(
            "Synthesised utterance {} ({} chars) in {} ms",
            utterance.id,
            utterance.text.chars().count(),
            start.elapsed().as_millis()
        );
        Ok(wav)
    }
}
