//! Archive staging: extract an uploaded bundle into a scratch directory.
//!
//! Extraction never touches a live plugin directory. The scratch directory
//! is handed back as a cleanup guard so that no temporary artifact survives
//! any exit path — the lifecycle manager defuses the guard only at the
//! moment the directory is renamed into its final location.

use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use scopeguard::{guard, ScopeGuard};
use uuid::Uuid;

use super::error::ArchiveError;

/// A freshly extracted scratch directory. Removed on drop unless defused
/// with [`ScopeGuard::into_inner`].
pub type StagedDir = ScopeGuard<PathBuf, fn(PathBuf)>;

fn remove_scratch(path: PathBuf) {
    if let Err(e) = fs::remove_dir_all(&path) {
        tracing::warn!("Failed to clean staging dir {}: {}", path.display(), e);
    }
}

/// Extracts uploaded zip payloads under a dedicated staging root.
pub struct ArchiveStager {
    staging_root: PathBuf,
}

impl ArchiveStager {
    pub fn new(staging_root: PathBuf) -> Self {
        Self { staging_root }
    }

    /// Extract `payload` into a fresh scratch directory.
    ///
    /// Distinguishes a malformed payload (`NotAnArchive`) from a filesystem
    /// failure (`Io`). On any failure the scratch directory is already gone
    /// by the time the error surfaces.
    pub fn stage(&self, payload: &[u8]) -> Result<StagedDir, ArchiveError> {
        fs::create_dir_all(&self.staging_root)?;
        let scratch = self.staging_root.join(Uuid::new_v4().to_string());
        fs::create_dir(&scratch)?;
        let scratch: StagedDir = guard(scratch, remove_scratch);

        let mut archive =
            zip::ZipArchive::new(Cursor::new(payload)).map_err(ArchiveError::from_zip)?;
        archive.extract(&*scratch).map_err(ArchiveError::from_zip)?;

        Ok(scratch)
    }
}
