//! Canonical filename synthesis and uniqueness resolution.
//!
//! Filenames follow `Author_Year_Title.ext`: the first author's surname, the
//! publication year (or `XXXX`), and exactly `max_title_words` capitalized
//! title words (padded with `X`). Synthesis is pure; only
//! [`FilenameGenerator::ensure_unique`] touches the filesystem.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::metadata::{ArticleMetadata, UNKNOWN_AUTHOR, author_token};

/// Default number of title words in a filename.
pub const DEFAULT_MAX_TITLE_WORDS: usize = 5;

/// Default token separator.
pub const DEFAULT_SEPARATOR: &str = "_";

/// Longest filename accepted, in characters.
pub const MAX_FILENAME_CHARS: usize = 255;

/// Longest filename most filesystems will create, in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

/// Highest numeric suffix tried by [`FilenameGenerator::ensure_unique`].
pub const MAX_UNIQUE_ATTEMPTS: u32 = 999;

/// Year token used when the year is unknown.
pub const UNKNOWN_YEAR: &str = "XXXX";

/// Padding token for missing title words.
pub const TITLE_PAD: &str = "X";

const STOPWORDS: [&str; 8] = ["a", "an", "the", "and", "or", "but", "nor", "for"];

const ILLEGAL_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Errors from filename resolution.
#[derive(Debug, Error)]
pub enum FilenameGenerationError {
    /// Every numbered variant of the filename was taken or unusable.
    #[error("no usable name for {filename} in {directory} after {attempts} attempts")]
    UniquenessExhausted {
        filename: String,
        directory: PathBuf,
        attempts: u32,
    },
    /// The filename encodes to more bytes than the filesystem allows.
    #[error("{filename} is {bytes} bytes long, the limit is {MAX_FILENAME_BYTES}")]
    NameTooLong { filename: String, bytes: usize },
}

/// Builds canonical filenames from metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameGenerator {
    max_title_words: usize,
    separator: String,
}

impl Default for FilenameGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TITLE_WORDS, DEFAULT_SEPARATOR)
    }
}

impl FilenameGenerator {
    /// `max_title_words` is clamped to at least 1; an empty separator falls
    /// back to `_`.
    #[must_use]
    pub fn new(max_title_words: usize, separator: &str) -> Self {
        let separator = if separator.is_empty() {
            DEFAULT_SEPARATOR
        } else {
            separator
        };
        Self {
            max_title_words: max_title_words.max(1),
            separator: separator.to_string(),
        }
    }

    #[must_use]
    pub fn max_title_words(&self) -> usize {
        self.max_title_words
    }

    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Synthesizes the canonical filename for `metadata`.
    ///
    /// `extension` includes its leading dot (`".pdf"`) or is empty.
    #[must_use]
    pub fn generate(&self, metadata: &ArticleMetadata, extension: &str) -> String {
        let author = author_component(metadata);
        let year = metadata
            .year
            .map_or_else(|| UNKNOWN_YEAR.to_string(), |y| y.to_string());
        let title = self.title_component(&metadata.title);

        let sep = &self.separator;
        self.sanitize(&format!("{author}{sep}{year}{sep}{title}{extension}"))
    }

    fn title_component(&self, title: &str) -> String {
        let mut words: Vec<String> = title
            .split_whitespace()
            .filter(|word| word.chars().count() > 1)
            .filter(|word| !STOPWORDS.contains(&word.to_lowercase().as_str()))
            .map(|word| word.chars().filter(|c| c.is_alphanumeric()).collect::<String>())
            .filter(|word| !word.is_empty())
            .take(self.max_title_words)
            .collect();
        while words.len() < self.max_title_words {
            words.push(TITLE_PAD.to_string());
        }
        words
            .iter()
            .map(|w| capitalize(w))
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    /// Makes a filename safe for common filesystems.
    ///
    /// Removes `<>:"/\|?*`, turns whitespace runs into the separator,
    /// collapses repeated separators, trims separators from both ends and
    /// truncates the stem so the whole name fits in 255 characters.
    #[must_use]
    pub fn sanitize(&self, filename: &str) -> String {
        let sep = self.separator.as_str();

        let stripped: String = filename.chars().filter(|c| !ILLEGAL_CHARS.contains(c)).collect();
        let spaced = stripped.split_whitespace().collect::<Vec<_>>().join(sep);

        let doubled = format!("{sep}{sep}");
        let mut collapsed = spaced;
        while collapsed.contains(&doubled) {
            collapsed = collapsed.replace(&doubled, sep);
        }

        let mut trimmed = collapsed.as_str();
        while let Some(rest) = trimmed.strip_prefix(sep) {
            trimmed = rest;
        }
        while let Some(rest) = trimmed.strip_suffix(sep) {
            trimmed = rest;
        }

        if trimmed.chars().count() <= MAX_FILENAME_CHARS {
            return trimmed.to_string();
        }
        let (stem, extension) = split_extension(trimmed);
        let keep = MAX_FILENAME_CHARS.saturating_sub(extension.chars().count());
        let stem: String = stem.chars().take(keep).collect();
        format!("{stem}{extension}")
    }

    /// Returns `filename` if usable in `directory`, else the first usable
    /// `stem_N.ext` for N in 1..=999.
    ///
    /// # Errors
    ///
    /// Returns [`FilenameGenerationError::NameTooLong`] without touching the
    /// directory when `filename` exceeds [`MAX_FILENAME_BYTES`], and
    /// [`FilenameGenerationError::UniquenessExhausted`] when no candidate is
    /// usable.
    pub fn ensure_unique(
        &self,
        filename: &str,
        directory: &Path,
    ) -> Result<String, FilenameGenerationError> {
        if filename.len() > MAX_FILENAME_BYTES {
            warn!(filename, bytes = filename.len(), "filename exceeds the byte limit");
            return Err(FilenameGenerationError::NameTooLong {
                filename: filename.to_string(),
                bytes: filename.len(),
            });
        }
        if is_usable(filename, directory) {
            return Ok(filename.to_string());
        }

        let (stem, extension) = split_extension(filename);
        for counter in 1..=MAX_UNIQUE_ATTEMPTS {
            let candidate = format!("{stem}_{counter}{extension}");
            if is_usable(&candidate, directory) {
                debug!(original = filename, resolved = %candidate, "resolved filename collision");
                return Ok(candidate);
            }
        }

        Err(FilenameGenerationError::UniquenessExhausted {
            filename: filename.to_string(),
            directory: directory.to_path_buf(),
            attempts: MAX_UNIQUE_ATTEMPTS,
        })
    }
}

/// True when `name` is `canonical` or one of the `stem_N.ext` variants
/// [`FilenameGenerator::ensure_unique`] can produce from it.
#[must_use]
pub fn is_canonical_variant(name: &str, canonical: &str) -> bool {
    if name == canonical {
        return true;
    }
    let (stem, extension) = split_extension(canonical);
    name.strip_prefix(stem)
        .and_then(|rest| rest.strip_suffix(extension))
        .and_then(|rest| rest.strip_prefix('_'))
        .filter(|counter| !counter.is_empty() && !counter.starts_with('0'))
        .and_then(|counter| counter.parse::<u32>().ok())
        .is_some_and(|counter| (1..=MAX_UNIQUE_ATTEMPTS).contains(&counter))
}

fn author_component(metadata: &ArticleMetadata) -> String {
    let token = metadata
        .authors
        .first()
        .map(|a| author_token(a))
        .unwrap_or_default();
    if token.chars().count() < 2 {
        UNKNOWN_AUTHOR.to_string()
    } else {
        token
    }
}

/// First character uppercased, the rest lowercased.
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Splits at the last `.` that is not the first character.
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(index) if index > 0 => filename.split_at(index),
        _ => (filename, ""),
    }
}

/// A name is usable when it fits the length limits, nothing exists at that
/// path, and a file can actually be created there.
fn is_usable(filename: &str, directory: &Path) -> bool {
    if filename.chars().count() > MAX_FILENAME_CHARS || filename.len() > MAX_FILENAME_BYTES {
        return false;
    }
    let path = directory.join(filename);
    if fs::symlink_metadata(&path).is_ok() {
        return false;
    }
    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => {
            drop(file);
            if let Err(error) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %error, "could not remove placeholder file");
                return false;
            }
            true
        }
        Err(error) => {
            debug!(path = %path.display(), error = %error, "filename not creatable");
            false
        }
    }
}
