//! File configuration for rename runs.
//!
//! Configuration is a TOML file. Every key is optional; unknown keys are
//! rejected so typos surface instead of silently falling back to defaults.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::extract::DEFAULT_EXTENSIONS;
use crate::metadata::DEFAULT_CONTENT_CHARS;
use crate::naming::{DEFAULT_MAX_TITLE_WORDS, DEFAULT_SEPARATOR, FilenameGenerator};
use crate::source::{
    DEFAULT_ARXIV_URL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, DEFAULT_OLLAMA_MODEL,
    DEFAULT_OLLAMA_URL, DEFAULT_READ_TIMEOUT_SECS, DEFAULT_SEMANTIC_SCHOLAR_URL, HttpSettings,
    RetryPolicy,
};

/// Directory name under the user config root.
pub const CONFIG_DIR_NAME: &str = "reference-renamer";

/// Config file name inside [`CONFIG_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

const DEFAULT_AVAILABILITY_TIMEOUT_SECS: u64 = 2;
const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn out_of_range(field: &'static str, value: impl std::fmt::Display, range: &str) -> Self {
        Self::Invalid {
            field,
            message: format!("{value}. Expected range: {range}"),
        }
    }
}

/// Settings read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub ollama_url: String,
    pub ollama_model: String,
    pub arxiv_url: String,
    pub semantic_scholar_url: String,
    pub semantic_scholar_api_key: Option<String>,
    /// Title words in generated filenames (1..=20).
    pub max_title_words: usize,
    pub separator: String,
    /// Attempts per network call, including the first (1..=10).
    pub max_retries: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub availability_timeout_secs: u64,
    /// Characters of document text sent to the language model.
    pub llm_content_chars: usize,
    pub extensions: Vec<String>,
    /// Audit log directory; relative paths resolve against the scanned directory.
    pub log_dir: PathBuf,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            arxiv_url: DEFAULT_ARXIV_URL.to_string(),
            semantic_scholar_url: DEFAULT_SEMANTIC_SCHOLAR_URL.to_string(),
            semantic_scholar_api_key: None,
            max_title_words: DEFAULT_MAX_TITLE_WORDS,
            separator: DEFAULT_SEPARATOR.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            availability_timeout_secs: DEFAULT_AVAILABILITY_TIMEOUT_SECS,
            llm_content_chars: DEFAULT_CONTENT_CHARS,
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl FileConfig {
    /// Parses and validates TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=20).contains(&self.max_title_words) {
            return Err(ConfigError::out_of_range(
                "max_title_words",
                self.max_title_words,
                "1..=20",
            ));
        }
        if !(1..=10).contains(&self.max_retries) {
            return Err(ConfigError::out_of_range("max_retries", self.max_retries, "1..=10"));
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        validate_timeout_secs("availability_timeout_secs", self.availability_timeout_secs)?;
        if self.llm_content_chars == 0 {
            return Err(ConfigError::out_of_range("llm_content_chars", 0, "1.."));
        }
        validate_separator(&self.separator)?;
        if self.extensions.iter().all(|ext| ext.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "extensions",
                message: "at least one extension is required".to_string(),
            });
        }
        for (field, url) in [
            ("ollama_url", &self.ollama_url),
            ("arxiv_url", &self.arxiv_url),
            ("semantic_scholar_url", &self.semantic_scholar_url),
        ] {
            if let Err(error) = url::Url::parse(url) {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("'{url}' is not a valid URL: {error}"),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
        }
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_attempts(self.max_retries)
    }

    #[must_use]
    pub fn availability_timeout(&self) -> Duration {
        Duration::from_secs(self.availability_timeout_secs)
    }

    #[must_use]
    pub fn filename_generator(&self) -> FilenameGenerator {
        FilenameGenerator::new(self.max_title_words, &self.separator)
    }
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if (1..=3600).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, value, "1..=3600"))
    }
}

fn validate_separator(separator: &str) -> Result<(), ConfigError> {
    let invalid = separator.is_empty()
        || separator
            .chars()
            .any(|c| c.is_whitespace() || "<>:\"/\\|?*".contains(c));
    if invalid {
        return Err(ConfigError::Invalid {
            field: "separator",
            message: format!(
                "'{separator}' must be non-empty without whitespace or filename-illegal characters"
            ),
        });
    }
    Ok(())
}

/// A resolved configuration and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// File consulted, if any path could be resolved.
    pub path: Option<PathBuf>,
    pub config: FileConfig,
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/reference-renamer/config.toml`
/// 2. `$HOME/.config/reference-renamer/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads `explicit` if given, else the default path when it exists, else
/// defaults.
///
/// # Errors
///
/// Returns [`ConfigError`] when an explicit file is missing, or any file
/// that is read fails to parse or validate.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => resolve_default_config_path().filter(|p| p.exists()),
    };
    let Some(path) = path else {
        debug!("no config file, using defaults");
        return Ok(LoadedConfig {
            path: None,
            config: FileConfig::default(),
            loaded_from_file: false,
        });
    };

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config = FileConfig::from_toml(&raw, &path)?;
    debug!(path = %path.display(), "loaded config file");
    Ok(LoadedConfig {
        path: Some(path),
        config,
        loaded_from_file: true,
    })
}
