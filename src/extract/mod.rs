//! Document text extraction and discovery.
//!
//! PDFs are read with `lopdf` (page text plus the Info dictionary); every
//! other supported extension is treated as text, decoded as UTF-8 with a
//! Latin-1 fallback. OCR of image-only pages is not attempted.

mod discovery;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::metadata::RawMetadata;

pub use discovery::{DocumentScanner, create_backup, restore_from_backup};

/// Extensions handled when none are configured.
pub const DEFAULT_EXTENSIONS: [&str; 4] = [".pdf", ".txt", ".md", ".py"];

/// Raw metadata key recording the fallback text encoding.
pub const ENCODING_KEY: &str = "encoding";

/// Errors raised while reading documents from disk.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The extension is not in the supported set.
    #[error("unsupported file format '{extension}': {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The PDF could not be parsed or yielded no text layer.
    #[error("cannot extract PDF content from {path}: {reason}")]
    Pdf { path: PathBuf, reason: String },

    /// The scan root does not exist or is not a directory.
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Creating or restoring a backup failed.
    #[error("backup failed for {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExtractionError {
    #[must_use]
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    #[must_use]
    pub fn pdf(path: &Path, reason: impl Into<String>) -> Self {
        Self::Pdf {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Text and embedded metadata read from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    pub text: String,
    /// Document-embedded metadata (PDF Info entries, text encoding).
    pub metadata: RawMetadata,
    /// Lowercase extension without the dot (`pdf`, `txt`, ...).
    pub format: String,
}

/// Reads document content for supported extensions.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    extensions: Vec<String>,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().map(ToString::to_string))
    }
}

impl ContentExtractor {
    /// Extensions are matched case-insensitively, with or without a dot.
    #[must_use]
    pub fn new(extensions: impl IntoIterator<Item = String>) -> Self {
        Self {
            extensions: extensions.into_iter().map(|e| normalize_extension(&e)).collect(),
        }
    }

    /// Normalized extensions (`.pdf`) this extractor accepts.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    #[must_use]
    pub fn supports(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Extracts text and metadata from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] for unsupported extensions, unreadable
    /// files and unparseable PDFs.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn extract(&self, path: &Path) -> Result<ExtractedContent, ExtractionError> {
        let extension = extension_of(path).unwrap_or_default();
        if !self.extensions.contains(&extension) {
            return Err(ExtractionError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            });
        }

        let format = extension.trim_start_matches('.').to_string();
        if format == "pdf" {
            extract_pdf(path)
        } else {
            extract_text(path, format)
        }
    }
}

fn extract_pdf(path: &Path) -> Result<ExtractedContent, ExtractionError> {
    let document = Document::load(path).map_err(|e| ExtractionError::pdf(path, e.to_string()))?;
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    debug!(pages = pages.len(), "loaded PDF");

    let text = if pages.is_empty() {
        String::new()
    } else {
        document
            .extract_text(&pages)
            .map_err(|e| ExtractionError::pdf(path, e.to_string()))?
    };
    if text.trim().is_empty() {
        warn!(path = %path.display(), "PDF has no extractable text layer");
    }

    Ok(ExtractedContent {
        text: text.trim().to_string(),
        metadata: info_dictionary(&document),
        format: "pdf".to_string(),
    })
}

/// String entries of the trailer's Info dictionary, keys without the slash.
fn info_dictionary(document: &Document) -> RawMetadata {
    let mut raw = RawMetadata::new();
    let Ok(info) = document.trailer.get(b"Info") else {
        return raw;
    };
    let dict: Option<&Dictionary> = match info {
        Object::Reference(id) => document.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    };
    let Some(dict) = dict else {
        return raw;
    };

    for (key, value) in dict.iter() {
        if let Object::String(bytes, _) = value {
            let value = decode_pdf_string(bytes);
            if !value.trim().is_empty() {
                raw.insert(String::from_utf8_lossy(key).into_owned(), value.trim().to_string());
            }
        }
    }
    raw
}

/// PDF text strings are UTF-16BE with a BOM or PDFDocEncoding, read here as
/// Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    latin1(bytes)
}

fn extract_text(path: &Path, format: String) -> Result<ExtractedContent, ExtractionError> {
    let bytes = fs::read(path).map_err(|e| ExtractionError::io(path, e))?;
    let mut metadata = RawMetadata::new();
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(error) => {
            warn!(path = %path.display(), "UTF-8 decode failed, falling back to latin-1");
            metadata.insert(ENCODING_KEY.to_string(), "latin-1".to_string());
            latin1(error.as_bytes())
        }
    };
    Ok(ExtractedContent {
        text: text.trim().to_string(),
        metadata,
        format,
    })
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Lowercase `.ext` for `path`, if it has one.
fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
}

fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().to_lowercase();
    if trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{trimmed}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_extract_utf8_text_is_trimmed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "\n  Attention Is All You Need  \n\n").unwrap();

        let content = ContentExtractor::default().extract(&path).unwrap();
        assert_eq!(content.text, "Attention Is All You Need");
        assert_eq!(content.format, "md");
        assert!(content.metadata.is_empty());
    }

    #[test]
    fn test_extract_latin1_fallback_records_encoding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.txt");
        fs::write(&path, b"Caf\xe9 society").unwrap();

        let content = ContentExtractor::default().extract(&path).unwrap();
        assert_eq!(content.text, "Caf\u{e9} society");
        assert_eq!(content.metadata.get(ENCODING_KEY).map(String::as_str), Some("latin-1"));
    }

    #[test]
    fn test_extract_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.png");
        fs::write(&path, b"png").unwrap();

        let err = ContentExtractor::default().extract(&path).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat { extension, .. } if extension == ".png"));
    }

    #[test]
    fn test_extract_corrupt_pdf_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"not a pdf at all").unwrap();

        let err = ContentExtractor::default().extract(&path).unwrap_err();
        assert!(matches!(err, ExtractionError::Pdf { .. }));
    }

    #[test]
    fn test_extract_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ContentExtractor::default()
            .extract(&dir.path().join("gone.txt"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Io { .. }));
    }

    #[test]
    fn test_extensions_are_normalized() {
        let extractor = ContentExtractor::new(vec!["PDF".to_string(), ".Txt".to_string()]);
        assert_eq!(extractor.extensions(), [".pdf", ".txt"]);
        assert!(extractor.supports(Path::new("paper.PDF")));
        assert!(!extractor.supports(Path::new("paper")));
    }

    #[test]
    fn test_decode_pdf_string_utf16() {
        let bytes = [0xFE, 0xFF, 0x00, b'H', 0x00, b'i'];
        assert_eq!(decode_pdf_string(&bytes), "Hi");
        assert_eq!(decode_pdf_string(b"Plain"), "Plain");
    }
}
