//! Console reader screen.
//!
//! Holds the loaded document and a status line, and enables `play` and
//! `stop` the same way the reader screen does: play only with a document
//! and while silent, stop only while speaking. Speaking state and the rate
//! slider belong to the [`Narrator`].

pub mod command;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;

use crate::extract::{self, DocumentText, ExtractError};
use crate::speech::{Dispatch, DispatchError, EngineState, SpeechDispatcher, SpeechRate};

pub use command::{CommandParseError, ScreenCommand, HELP};

/// Speech side of the screen.
pub trait Narrator {
    fn speak(
        &self,
        text: &str,
        on_complete: Box<dyn FnOnce() + Send>,
    ) -> Result<Dispatch, DispatchError>;
    fn stop(&self);
    fn set_rate(&self, rate: SpeechRate) -> SpeechRate;
    fn rate(&self) -> SpeechRate;
    fn is_speaking(&self) -> bool;
    fn status(&self) -> EngineState;
}

impl Narrator for SpeechDispatcher {
    fn speak(
        &self,
        text: &str,
        on_complete: Box<dyn FnOnce() + Send>,
    ) -> Result<Dispatch, DispatchError> {
        SpeechDispatcher::speak(self, text, on_complete)
    }

    fn stop(&self) {
        self.stop_speaking();
    }

    fn set_rate(&self, rate: SpeechRate) -> SpeechRate {
        self.set_speech_rate(rate)
    }

    fn rate(&self) -> SpeechRate {
        SpeechDispatcher::rate(self)
    }

    fn is_speaking(&self) -> bool {
        SpeechDispatcher::is_speaking(self)
    }

    fn status(&self) -> EngineState {
        self.state()
    }
}

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("{} is not a PDF file", .0.display())]
    NotPdf(PathBuf),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl OpenError {
    pub fn user_message(&self) -> &'static str {
        match self {
            OpenError::NotPdf(_) => "Please select a PDF file",
            OpenError::Extract(err) => err.sentinel(),
        }
    }
}

pub trait DocumentSource {
    fn open(&self, path: &Path) -> Result<DocumentText, OpenError>;
}

/// Reads documents from disk, accepting only PDF files.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfSource;

impl DocumentSource for PdfSource {
    fn open(&self, path: &Path) -> Result<DocumentText, OpenError> {
        if !path.exists() {
            return Err(ExtractError::NotFound(path.to_path_buf()).into());
        }
        if !extract::is_pdf(path) {
            return Err(OpenError::NotPdf(path.to_path_buf()));
        }
        Ok(extract::extract_text(path)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Screen<N, D> {
    narrator: N,
    source: D,
    document: Option<DocumentText>,
    status: String,
}

impl<N: Narrator, D: DocumentSource> Screen<N, D> {
    pub fn new(narrator: N, source: D) -> Self {
        Self {
            narrator,
            source,
            document: None,
            status: "Open a PDF to start".to_string(),
        }
    }

    pub fn rate(&self) -> SpeechRate {
        self.narrator.rate()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_speaking(&self) -> bool {
        self.narrator.is_speaking()
    }

    pub fn can_play(&self) -> bool {
        self.document.is_some() && !self.is_speaking()
    }

    pub fn can_stop(&self) -> bool {
        self.is_speaking()
    }

    /// Replace the current document. A failed open leaves no document
    /// loaded. Speech already queued keeps playing.
    pub fn open(&mut self, path: &Path) {
        match self.source.open(path) {
            Ok(document) => {
                self.status = format!(
                    "Opened {} ({} page(s), {} characters)",
                    document.display_name(),
                    document.pages,
                    document.char_count()
                );
                self.document = Some(document);
            }
            Err(err) => {
                warn!("Unable to open {}: {err}", path.display());
                self.document = None;
                self.status = err.user_message().to_string();
            }
        }
    }

    pub fn play(&mut self) {
        if !self.can_play() {
            self.status = if self.document.is_none() {
                "Play is disabled: no document loaded".to_string()
            } else {
                "Play is disabled: already speaking".to_string()
            };
            return;
        }
        let Some(document) = self.document.as_ref() else {
            return;
        };

        let name = document.display_name();
        let finished = name.clone();
        let on_complete = Box::new(move || info!("Finished reading {finished}"));

        match self.narrator.speak(&document.text, on_complete) {
            Ok(Dispatch::Queued { chunks }) => {
                info!("Reading {name} in {chunks} chunk(s)");
                self.status = format!("Speaking {name}");
            }
            Ok(Dispatch::Dropped) => {
                self.status = format!(
                    "Speech engine is {}, try again shortly",
                    self.narrator.status().label()
                );
            }
            Err(err) => {
                self.status = format!("Unable to speak: {err}");
            }
        }
    }

    pub fn stop(&mut self) {
        if !self.can_stop() {
            self.status = "Stop is disabled: not speaking".to_string();
            return;
        }
        self.narrator.stop();
        self.status = "Stopped".to_string();
    }

    /// Slider semantics: the value snaps to the nearest step in range.
    pub fn set_rate(&mut self, value: f32) {
        self.apply_rate(SpeechRate::stepped(value));
    }

    pub fn faster(&mut self) {
        self.apply_rate(self.rate().faster());
    }

    pub fn slower(&mut self) {
        self.apply_rate(self.rate().slower());
    }

    fn apply_rate(&mut self, rate: SpeechRate) {
        let rate = self.narrator.set_rate(rate);
        self.status = format!("Speech rate {rate}");
    }

    pub fn render(&self) -> String {
        let document = match &self.document {
            Some(document) => format!(
                "{} ({} page(s), {} characters)",
                document.display_name(),
                document.pages,
                document.char_count()
            ),
            None => "none".to_string(),
        };
        let engine = match self.narrator.status() {
            EngineState::Ready(profile) => match profile.quality {
                Some(quality) => format!("ready, voice {} ({quality})", profile.voice),
                None => format!("ready, voice {}", profile.voice),
            },
            EngineState::Failed(reason) => format!("unavailable ({reason})"),
            state => state.label().to_string(),
        };
        let control = |name: &str, enabled: bool| {
            if enabled {
                format!("[{name}]")
            } else {
                format!("({name})")
            }
        };

        format!(
            "Document: {document}\nSpeech:   {engine}{}\nRate:     {}\nControls: {} {}\n{}",
            if self.is_speaking() { ", speaking" } else { "" },
            self.rate(),
            control("play", self.can_play()),
            control("stop", self.can_stop()),
            self.status
        )
    }

    pub fn apply(&mut self, command: ScreenCommand) -> Flow {
        match command {
            ScreenCommand::Open(path) => self.open(&path),
            ScreenCommand::Play => self.play(),
            ScreenCommand::Stop => self.stop(),
            ScreenCommand::Rate(value) => self.set_rate(value),
            ScreenCommand::Faster => self.faster(),
            ScreenCommand::Slower => self.slower(),
            ScreenCommand::Status | ScreenCommand::Help => {}
            ScreenCommand::Quit => return Flow::Quit,
        }
        Flow::Continue
    }
}

/// Read commands line by line until `quit` or end of input.
pub fn run_console<N, D, R, W>(screen: &mut Screen<N, D>, input: R, mut output: W) -> io::Result<()>
where
    N: Narrator,
    D: DocumentSource,
    R: BufRead,
    W: Write,
{
    writeln!(output, "{}", screen.render())?;
    writeln!(output, "Type 'help' for commands.")?;

    for line in input.lines() {
        let line = line?;
        match line.parse::<ScreenCommand>() {
            Ok(ScreenCommand::Help) => writeln!(output, "{HELP}")?,
            Ok(ScreenCommand::Status) => writeln!(output, "{}", screen.render())?,
            Ok(command) => {
                if screen.apply(command) == Flow::Quit {
                    break;
                }
                writeln!(output, "{}", screen.status())?;
            }
            Err(CommandParseError::Empty) => {}
            Err(err) => writeln!(output, "{err}, type 'help' for commands")?,
        }
        output.flush()?;
    }

    if screen.is_speaking() {
        screen.stop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::speech::EngineProfile;

    struct NarratorLog {
        spoken: Vec<String>,
        callbacks: Vec<Box<dyn FnOnce() + Send>>,
        stops: usize,
        rates: Vec<f32>,
        rate: SpeechRate,
    }

    fn narrator_log() -> Arc<Mutex<NarratorLog>> {
        Arc::new(Mutex::new(NarratorLog {
            spoken: Vec::new(),
            callbacks: Vec::new(),
            stops: 0,
            rates: Vec::new(),
            rate: SpeechRate::new(0.7),
        }))
    }

    struct FakeNarrator {
        state: EngineState,
        log: Arc<Mutex<NarratorLog>>,
    }

    impl FakeNarrator {
        fn ready() -> Self {
            Self {
                state: EngineState::Ready(EngineProfile {
                    voice: "en_IN-fake-medium".into(),
                    locale: Some("en_IN".into()),
                    quality: Some("medium".into()),
                }),
                log: narrator_log(),
            }
        }

        fn initialising() -> Self {
            Self {
                state: EngineState::Uninitialized,
                log: narrator_log(),
            }
        }
    }

    impl Narrator for FakeNarrator {
        fn speak(
            &self,
            text: &str,
            on_complete: Box<dyn FnOnce() + Send>,
        ) -> Result<Dispatch, DispatchError> {
            if !self.state.is_ready() {
                return Ok(Dispatch::Dropped);
            }
            let mut log = self.log.lock();
            log.spoken.push(text.to_string());
            log.callbacks.push(on_complete);
            Ok(Dispatch::Queued { chunks: 1 })
        }

        fn stop(&self) {
            let mut log = self.log.lock();
            log.stops += 1;
            log.callbacks.clear();
        }

        fn set_rate(&self, rate: SpeechRate) -> SpeechRate {
            let mut log = self.log.lock();
            log.rates.push(rate.value());
            log.rate = rate;
            rate
        }

        fn rate(&self) -> SpeechRate {
            self.log.lock().rate
        }

        fn is_speaking(&self) -> bool {
            !self.log.lock().callbacks.is_empty()
        }

        fn status(&self) -> EngineState {
            self.state.clone()
        }
    }

    #[derive(Default)]
    struct FakeSource(HashMap<PathBuf, Result<String, &'static str>>);

    impl FakeSource {
        fn with(mut self, path: &str, outcome: Result<&str, &'static str>) -> Self {
            self.0
                .insert(PathBuf::from(path), outcome.map(str::to_string));
            self
        }
    }

    impl DocumentSource for FakeSource {
        fn open(&self, path: &Path) -> Result<DocumentText, OpenError> {
            match self.0.get(path) {
                Some(Ok(text)) => Ok(DocumentText {
                    text: text.clone(),
                    pages: 1,
                    source: Some(path.to_path_buf()),
                }),
                Some(Err("empty")) => Err(ExtractError::NoText { pages: 2 }.into()),
                Some(Err(_)) => Err(OpenError::NotPdf(path.to_path_buf())),
                None => Err(ExtractError::NotFound(path.to_path_buf()).into()),
            }
        }
    }

    fn screen(narrator: FakeNarrator) -> (Screen<FakeNarrator, FakeSource>, Arc<Mutex<NarratorLog>>) {
        let log = Arc::clone(&narrator.log);
        let source = FakeSource::default()
            .with("book.pdf", Ok("Hello. World."))
            .with("blank.pdf", Err("empty"))
            .with("notes.txt", Err("not a pdf"));
        (Screen::new(narrator, source), log)
    }

    fn finish_speaking(log: &Arc<Mutex<NarratorLog>>) {
        let callbacks: Vec<_> = log.lock().callbacks.drain(..).collect();
        for callback in callbacks {
            callback();
        }
    }

    #[test]
    fn controls_follow_document_and_speaking_state() {
        let (mut screen, log) = screen(FakeNarrator::ready());
        assert!(!screen.can_play());
        assert!(!screen.can_stop());

        screen.open(Path::new("book.pdf"));
        assert!(screen.can_play());

        screen.play();
        assert_eq!(log.lock().spoken, vec!["Hello. World."]);
        assert!(screen.is_speaking());
        assert!(!screen.can_play());
        assert!(screen.can_stop());

        finish_speaking(&log);
        assert!(!screen.is_speaking());
        assert!(screen.can_play());
    }

    #[test]
    fn disabled_controls_are_reported_not_executed() {
        let (mut screen, log) = screen(FakeNarrator::ready());
        screen.play();
        assert_eq!(screen.status(), "Play is disabled: no document loaded");
        screen.stop();
        assert_eq!(screen.status(), "Stop is disabled: not speaking");

        screen.open(Path::new("book.pdf"));
        screen.play();
        screen.play();
        assert_eq!(screen.status(), "Play is disabled: already speaking");
        assert_eq!(log.lock().spoken.len(), 1);
        assert_eq!(log.lock().stops, 0);
    }

    #[test]
    fn stop_clears_speaking() {
        let (mut screen, log) = screen(FakeNarrator::ready());
        screen.open(Path::new("book.pdf"));
        screen.play();
        screen.stop();

        assert_eq!(log.lock().stops, 1);
        assert!(!screen.is_speaking());
        assert!(screen.can_play());
        assert_eq!(screen.status(), "Stopped");
    }

    #[test]
    fn failed_open_clears_document_and_shows_message() {
        let (mut screen, _log) = screen(FakeNarrator::ready());
        screen.open(Path::new("book.pdf"));

        screen.open(Path::new("blank.pdf"));
        assert!(screen.document.is_none());
        assert_eq!(screen.status(), "No text found in the PDF");

        screen.open(Path::new("missing.pdf"));
        assert_eq!(screen.status(), "Failed to extract text");

        screen.open(Path::new("notes.txt"));
        assert_eq!(screen.status(), "Please select a PDF file");
        assert!(!screen.can_play());
    }

    #[test]
    fn play_before_engine_is_ready_stays_silent() {
        let (mut screen, log) = screen(FakeNarrator::initialising());
        screen.open(Path::new("book.pdf"));
        screen.play();

        assert!(!screen.is_speaking());
        assert!(log.lock().spoken.is_empty());
        assert!(screen.status().contains("initialising"));
    }

    #[test]
    fn rate_snaps_to_slider_steps() {
        let (mut screen, log) = screen(FakeNarrator::ready());
        assert_eq!(screen.rate().value(), 0.7);

        screen.faster();
        assert_eq!(screen.rate().value(), 1.0);
        screen.set_rate(2.3);
        assert_eq!(screen.rate().value(), 2.5);
        screen.set_rate(10.0);
        assert_eq!(screen.rate().value(), 4.0);
        screen.slower();
        assert_eq!(screen.rate().value(), 3.5);
        assert_eq!(log.lock().rates, vec![1.0, 2.5, 4.0, 3.5]);
        assert_eq!(screen.status(), "Speech rate 3.5x");
    }

    #[test]
    fn render_marks_disabled_controls() {
        let (mut screen, _log) = screen(FakeNarrator::ready());
        let before = screen.render();
        assert!(before.contains("Document: none"));
        assert!(before.contains("(play) (stop)"));
        assert!(before.contains("ready, voice en_IN-fake-medium (medium)"));

        screen.open(Path::new("book.pdf"));
        screen.play();
        let after = screen.render();
        assert!(after.contains("book.pdf (1 page(s), 13 characters)"));
        assert!(after.contains("(play) [stop]"));
        assert!(after.contains(", speaking"));
        assert!(after.contains("Rate:     0.7x"));
    }

    #[test]
    fn console_runs_commands_until_quit() {
        let (mut screen, log) = screen(FakeNarrator::ready());
        let input = Cursor::new("open book.pdf\n\nplay\nbogus\nrate 2\nquit\nplay\n");
        let mut output = Vec::new();

        run_console(&mut screen, input, &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Opened book.pdf"));
        assert!(output.contains("Speaking book.pdf"));
        assert!(output.contains("unknown command 'bogus'"));
        assert!(output.contains("Speech rate 2.0x"));
        assert_eq!(log.lock().spoken.len(), 1);
        // leaving the console silences the reader
        assert_eq!(log.lock().stops, 1);
    }

    #[test]
    fn pdf_source_rejects_other_files() {
        let temp = tempfile::tempdir().unwrap();
        let text = temp.path().join("notes.pdf");
        std::fs::write(&text, "plain text").unwrap();

        let error = PdfSource.open(&text).unwrap_err();
        assert!(matches!(error, OpenError::NotPdf(_)));
        assert_eq!(error.user_message(), "Please select a PDF file");

        let error = PdfSource.open(&temp.path().join("missing.pdf")).unwrap_err();
        assert!(matches!(error, OpenError::Extract(ExtractError::NotFound(_))));
    }
}
