//! Directory scanning and file backups.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{ContentExtractor, ExtractionError};

/// Suffix appended to a file's full name for its backup copy.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Highest `N` tried for `.bak.N` once `.bak` is taken.
const MAX_BACKUP_ATTEMPTS: u32 = 999;

/// Finds supported documents under a root directory.
#[derive(Debug, Clone)]
pub struct DocumentScanner {
    root: PathBuf,
    recursive: bool,
}

impl DocumentScanner {
    /// # Errors
    ///
    /// Returns [`ExtractionError::DirectoryNotFound`] when `root` is not an
    /// existing directory.
    pub fn new(root: impl Into<PathBuf>, recursive: bool) -> Result<Self, ExtractionError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ExtractionError::DirectoryNotFound { path: root });
        }
        Ok(Self { root, recursive })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Supported, readable files in path order.
    ///
    /// Unreadable directory entries and files that fail validation are
    /// skipped with a warning.
    #[must_use]
    pub fn scan(&self, extractor: &ContentExtractor) -> Vec<PathBuf> {
        info!(root = %self.root.display(), recursive = self.recursive, "scanning directory");
        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(false)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    warn!(error = %error, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| extractor.supports(path))
            .filter(|path| validate_file(path))
            .collect();
        files.sort();

        info!(files = files.len(), "scan complete");
        files
    }
}

/// Whether `path` is an existing, readable regular file.
fn validate_file(path: &Path) -> bool {
    if !path.is_file() {
        warn!(path = %path.display(), "not a file");
        return false;
    }
    if let Err(error) = File::open(path) {
        warn!(path = %path.display(), error = %error, "file not readable");
        return false;
    }
    true
}

fn backup_path_for(path: &Path, counter: u32) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    if counter > 0 {
        name.push(format!(".{counter}"));
    }
    PathBuf::from(name)
}

/// Copies `path` to `path.bak` and returns the backup location.
///
/// An existing backup is never overwritten: when `path.bak` is taken the
/// copy goes to the first free `path.bak.N`.
///
/// # Errors
///
/// Returns [`ExtractionError::Backup`] when the copy fails or every backup
/// name is taken.
pub fn create_backup(path: &Path) -> Result<PathBuf, ExtractionError> {
    let backup_error = |source| ExtractionError::Backup {
        path: path.to_path_buf(),
        source,
    };
    let mut source = File::open(path).map_err(backup_error)?;

    for counter in 0..=MAX_BACKUP_ATTEMPTS {
        let backup = backup_path_for(path, counter);
        let mut target = match OpenOptions::new().write(true).create_new(true).open(&backup) {
            Ok(file) => file,
            Err(error) if error.kind() == ErrorKind::AlreadyExists => continue,
            Err(error) => return Err(backup_error(error)),
        };
        if let Err(error) = io::copy(&mut source, &mut target) {
            drop(target);
            if let Err(cleanup) = fs::remove_file(&backup) {
                warn!(backup = %backup.display(), error = %cleanup, "could not remove partial backup");
            }
            return Err(backup_error(error));
        }
        debug!(backup = %backup.display(), "created backup");
        return Ok(backup);
    }

    Err(backup_error(io::Error::new(
        ErrorKind::AlreadyExists,
        "every backup name is taken",
    )))
}

/// The file a `path.bak` or `path.bak.N` backup was made from.
fn original_path_for(backup: &Path) -> Option<PathBuf> {
    let name = backup.to_str()?;
    if let Some(original) = name.strip_suffix(BACKUP_SUFFIX) {
        return Some(PathBuf::from(original));
    }
    let (rest, counter) = name.rsplit_once('.')?;
    let numbered = !counter.is_empty()
        && !counter.starts_with('0')
        && counter.parse::<u32>().is_ok_and(|n| (1..=MAX_BACKUP_ATTEMPTS).contains(&n));
    if !numbered {
        return None;
    }
    rest.strip_suffix(BACKUP_SUFFIX).map(PathBuf::from)
}

/// Moves a `.bak` or `.bak.N` file back to its original name and returns
/// that path.
///
/// # Errors
///
/// Returns [`ExtractionError::Backup`] when the backup is missing or the
/// move fails.
pub fn restore_from_backup(backup: &Path) -> Result<PathBuf, ExtractionError> {
    let Some(original) = original_path_for(backup) else {
        return Err(ExtractionError::Backup {
            path: backup.to_path_buf(),
            source: io::Error::new(ErrorKind::InvalidInput, "not a backup file"),
        });
    };
    fs::rename(backup, &original).map_err(|source| ExtractionError::Backup {
        path: backup.to_path_buf(),
        source,
    })?;
    info!(restored = %original.display(), "restored from backup");
    Ok(original)
}
