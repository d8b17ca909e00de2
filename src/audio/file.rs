//! Audio file selection.
//!
//! Only the path is handled here. The file contents are read by the injector
//! library, never by this process.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

/// Extensions offered by the audio file filter.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "aac", "flac"];

/// Errors raised while selecting an audio file.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Please select an audio file first.")]
    Empty,

    #[error("Audio file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Not a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("Cannot resolve {}: {source}", path.display())]
    Unresolvable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An audio file chosen by the user, stored as an absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    path: PathBuf,
}

impl SelectedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for SelectedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Check whether `path` carries one of the filtered audio extensions.
pub fn is_supported_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

/// Validate and select an audio file.
///
/// The path must exist and be a regular file. Extensions outside
/// [`AUDIO_EXTENSIONS`] are accepted with a warning.
///
/// # Errors
/// Returns a [`FileError`] if the path is empty, missing, or not a file.
pub fn select_audio_file(path: &Path) -> Result<SelectedFile, FileError> {
    if path.as_os_str().is_empty() {
        return Err(FileError::Empty);
    }

    let metadata = std::fs::metadata(path).map_err(|_| FileError::NotFound(path.to_path_buf()))?;
    if !metadata.is_file() {
        return Err(FileError::NotAFile(path.to_path_buf()));
    }

    // The library is handed the path verbatim, so make it independent of our cwd
    let absolute = std::path::absolute(path).map_err(|source| FileError::Unresolvable { path: path.to_path_buf(), source })?;

    if !is_supported_audio_file(&absolute) {
        warn!("{} does not look like an audio file ({})", absolute.display(), AUDIO_EXTENSIONS.join(", "));
    }

    debug!("Selected audio file: {}", absolute.display());
    Ok(SelectedFile { path: absolute })
}
