//! PDF text extraction.
//!
//! Pages are read in order with `lopdf` and joined with blank lines. A
//! document that parses but carries no text is an error in its own right
//! ([`ExtractError::NoText`]) so that a UI can tell "empty" from "broken"
//! without ever treating a failure message as document content.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{error, info};
use lopdf::Document;
use thiserror::Error;

pub const NO_TEXT_MESSAGE: &str = "No text found in the PDF";
pub const FAILURE_MESSAGE: &str = "Failed to extract text";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Plain text of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentText {
    pub text: String,
    pub pages: usize,
    pub source: Option<PathBuf>,
}

impl DocumentText {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn display_name(&self) -> String {
        self.source
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("unable to read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a readable PDF document: {0}")]
    Corrupt(String),
    #[error("failed to extract text from page {page}: {reason}")]
    Page { page: u32, reason: String },
    #[error("no text found in {pages} page(s)")]
    NoText { pages: usize },
}

impl ExtractError {
    /// Short message for the status line.
    pub fn sentinel(&self) -> &'static str {
        match self {
            ExtractError::NoText { .. } => NO_TEXT_MESSAGE,
            _ => FAILURE_MESSAGE,
        }
    }
}

pub fn extract_text(path: &Path) -> Result<DocumentText, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::NotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|source| ExtractError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    match extract_bytes(&bytes) {
        Ok(mut document) => {
            info!(
                "Extracted {} characters from {} page(s) of {}",
                document.char_count(),
                document.pages,
                path.display()
            );
            document.source = Some(path.to_path_buf());
            Ok(document)
        }
        Err(err) => {
            error!("Error extracting text from {}: {err}", path.display());
            Err(err)
        }
    }
}

pub fn extract_bytes(bytes: &[u8]) -> Result<DocumentText, ExtractError> {
    let document = Document::load_mem(bytes).map_err(|err| ExtractError::Corrupt(err.to_string()))?;
    let pages = document.get_pages();

    let mut text = String::new();
    for page in pages.keys() {
        let content = document
            .extract_text(&[*page])
            .map_err(|err| ExtractError::Page {
                page: *page,
                reason: err.to_string(),
            })?;
        text.push_str(&content);
        text.push_str("\n\n");
    }

    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::NoText { pages: pages.len() });
    }

    Ok(DocumentText {
        text: text.to_string(),
        pages: pages.len(),
        source: None,
    })
}

/// File picker filter: a `.pdf` extension and the PDF header.
pub fn is_pdf(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !has_extension {
        return false;
    }

    let mut header = [0u8; 5];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .map(|_| &header[..] == PDF_MAGIC)
        .unwrap_or(false)
}
