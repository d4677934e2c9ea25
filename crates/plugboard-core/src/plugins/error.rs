//! Error taxonomy for the plugin lifecycle.

use thiserror::Error;

/// Staging failures, split so callers can tell a bad payload from a broken
/// filesystem.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("payload is not a valid zip archive: {0}")]
    NotAnArchive(zip::result::ZipError),

    #[error("i/o failure while staging archive: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Classify a zip error: an underlying i/o error is an `Io` failure,
    /// anything else means the payload itself is not a usable archive.
    pub(crate) fn from_zip(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::NotAnArchive(other),
        }
    }
}

/// Plugin loading failures. `Import` carries the full diagnostic chain of
/// whatever fault the component raised while compiling or instantiating;
/// it is returned verbatim to the uploader.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load plugin: {0:?}")]
    Import(anyhow::Error),

    #[error("plugin exports neither `handle-get` nor `handle-post`")]
    CapabilityMissing,
}

/// End-to-end register/reload/delete failures.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("no such api registered: {0}")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Storage(std::io::Error),
}
