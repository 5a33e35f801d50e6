use std::{
    io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

mod audio;
mod extract;
mod piper;
mod screen;
mod speech;
mod state;
mod util;

use piper::PiperEngine;
use screen::{PdfSource, Screen};
use speech::chunk::{split_into_chunks, DEFAULT_MAX_CHUNK_CHARS};
use speech::{NotReadyPolicy, SpeechDispatcher, SpeechRate};
use state::{Settings, DEFAULT_LOCALE, DEFAULT_RATE};
use util::logging;

/// How long startup waits for the voice before showing the screen.
const STARTUP_WAIT: Duration = Duration::from_secs(3);

/// Read PDF documents aloud with a local Piper voice.
#[derive(Parser, Debug)]
#[command(name = "reader-aloud", version, about)]
struct Cli {
    /// PDF opened at start.
    pdf: Option<PathBuf>,

    /// Directory holding the bundled Piper runtime.
    #[arg(long, env = "READER_RUNTIME_DIR", default_value = "runtime")]
    runtime_dir: PathBuf,

    /// Directory searched for Piper voice models.
    #[arg(long, env = "READER_VOICES_DIR", default_value = "assets/voices")]
    voices_dir: PathBuf,

    /// Scratch directory for synthesised audio.
    #[arg(long, env = "READER_OUTPUT_DIR", default_value = "runtime/output")]
    output_dir: PathBuf,

    /// Preferred voice locale.
    #[arg(long, env = "READER_LOCALE", default_value = DEFAULT_LOCALE)]
    locale: String,

    /// Initial speech rate.
    #[arg(long, env = "READER_RATE", default_value_t = DEFAULT_RATE)]
    rate: f32,

    /// Maximum characters per speech chunk.
    #[arg(long, env = "READER_CHUNK_SIZE", default_value_t = DEFAULT_MAX_CHUNK_CHARS)]
    chunk_size: NonZeroUsize,

    /// Speaker id for multi-speaker voices.
    #[arg(long, env = "READER_SPEAKER")]
    speaker: Option<String>,

    /// Fail instead of ignoring play requests while the voice is loading.
    #[arg(long, env = "READER_REJECT_WHEN_NOT_READY")]
    reject_when_not_ready: bool,

    /// Print the speech chunks of the PDF and exit without audio.
    #[arg(long, requires = "pdf")]
    print_chunks: bool,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            runtime_dir: self.runtime_dir.clone(),
            voices_dir: self.voices_dir.clone(),
            output_dir: self.output_dir.clone(),
            locale: self.locale.clone(),
            speaker: self.speaker.clone(),
            rate: SpeechRate::new(self.rate),
            chunk_size: self.chunk_size,
            not_ready: if self.reject_when_not_ready {
                NotReadyPolicy::Reject
            } else {
                NotReadyPolicy::Drop
            },
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init(Path::new("logs")) {
        eprintln!("Failed to initialise logger: {err:#}");
    }
    info!("Starting reader-aloud {}", env!("CARGO_PKG_VERSION"));

    if let Err(err) = run(cli) {
        error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = cli.settings();
    if cli.print_chunks {
        let path = cli.pdf.as_deref().context("--print-chunks needs a PDF")?;
        return print_chunks(path, &settings);
    }

    settings.prepare()?;
    let engine = Arc::new(PiperEngine::new(settings.piper_config()));
    let dispatcher = SpeechDispatcher::start(engine, settings.dispatcher_options());
    if !dispatcher.wait_ready(STARTUP_WAIT) {
        warn!("Speech engine is {}, the reader starts without it", dispatcher.state().label());
    }

    let mut screen = Screen::new(dispatcher, PdfSource);
    if let Some(path) = &cli.pdf {
        screen.open(path);
    }

    let stdin = io::stdin();
    screen::run_console(&mut screen, stdin.lock(), io::stdout().lock())
        .context("console input/output failed")?;
    info!("Reader closed");
    Ok(())
}

fn print_chunks(path: &Path, settings: &Settings) -> Result<()> {
    let document =
        extract::extract_text(path).map_err(|err| extraction_failed(path, err))?;
    let chunks = split_into_chunks(&document.text, settings.chunk_size);
    let total = chunks.len();
    for (index, chunk) in chunks.iter().enumerate() {
        println!(
            "--- chunk {}/{total} ({} chars) ---",
            index + 1,
            chunk.chars().count()
        );
        println!("{chunk}");
    }
    Ok(())
}

/// Lead with the sentence the screen shows for the same failure.
fn extraction_failed(path: &Path, err: extract::ExtractError) -> anyhow::Error {
    let message = format!("{} ({})", err.sentinel(), path.display());
    anyhow::Error::new(err).context(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    #[serial_test::serial]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "reader-aloud",
            "--rate",
            "9",
            "--chunk-size",
            "200",
            "--reject-when-not-ready",
            "book.pdf",
        ])
        .unwrap();
        let settings = cli.settings();

        assert_eq!(cli.pdf, Some(PathBuf::from("book.pdf")));
        assert_eq!(settings.rate.value(), 4.0);
        assert_eq!(settings.chunk_size.get(), 200);
        assert_eq!(settings.not_ready, NotReadyPolicy::Reject);
    }

    #[test]
    fn zero_chunk_size_is_refused() {
        assert!(Cli::try_parse_from(["reader-aloud", "--chunk-size", "0"]).is_err());
    }

    #[test]
    fn print_chunks_needs_a_document() {
        assert!(Cli::try_parse_from(["reader-aloud", "--print-chunks"]).is_err());
    }

    #[test]
    fn blank_document_reports_no_text() {
        let error = extraction_failed(
            Path::new("blank.pdf"),
            extract::ExtractError::NoText { pages: 2 },
        );
        assert_eq!(error.to_string(), "No text found in the PDF (blank.pdf)");
    }

    #[test]
    fn unreadable_document_reports_extraction_failure() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.5 not a document").unwrap();

        let error = print_chunks(&path, &Settings::default()).unwrap_err();
        assert!(error.to_string().starts_with("Failed to extract text ("));
    }
}
