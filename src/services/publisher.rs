//! Rule file publication
//!
//! Candidates are written in full to `<file>.tmp` next to the live file and
//! renamed over it once checked, so readers only ever see a complete
//! revision.

use crate::error::{MaterializeError, Stage};

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Owns the live rule file and its temporary sibling
#[derive(Debug, Clone)]
pub struct AtomicPublisher {
    path: PathBuf,
    temp_path: PathBuf,
}

impl AtomicPublisher {
    /// Publisher for the rule file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut temp = path.clone().into_os_string();
        temp.push(".tmp");
        Self {
            path,
            temp_path: PathBuf::from(temp),
        }
    }

    /// Live rule file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Candidate path handed to the checker
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Read the live rule file
    pub fn read(&self) -> Result<String, MaterializeError> {
        fs::read_to_string(&self.path).map_err(|source| MaterializeError::Io {
            stage: Stage::Rewrite,
            path: self.path.clone(),
            source,
        })
    }

    /// Write a candidate revision to the temporary path
    pub fn stage(&self, text: &str) -> Result<&Path, MaterializeError> {
        let io_err = |source| MaterializeError::Io {
            stage: Stage::Publish,
            path: self.temp_path.clone(),
            source,
        };

        let mut file = File::create(&self.temp_path).map_err(io_err)?;
        file.write_all(text.as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        Ok(&self.temp_path)
    }

    /// Replace the live file with the staged candidate
    pub fn commit(&self) -> Result<(), MaterializeError> {
        fs::rename(&self.temp_path, &self.path).map_err(|source| MaterializeError::Io {
            stage: Stage::Publish,
            path: self.path.clone(),
            source,
        })?;
        self.sync_dir();
        Ok(())
    }

    /// Drop a staged candidate that will not be published
    pub fn discard(&self) {
        match fs::remove_file(&self.temp_path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove candidate {}: {}",
                self.temp_path.display(),
                e
            ),
        }
    }

    /// Write `text` as the live file, bypassing any checker
    ///
    /// Used to lay down the header-only revision at startup.
    pub fn replace(&self, text: &str) -> Result<(), MaterializeError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| MaterializeError::Io {
                stage: Stage::Initialize,
                path: dir.to_path_buf(),
                source,
            })?;
        }
        self.stage(text)?;
        self.commit()
    }

    /// Persist the rename itself; failure only weakens crash durability
    fn sync_dir(&self) {
        let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) else {
            return;
        };
        if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
            log::debug!("Directory sync of {} failed: {}", dir.display(), e);
        }
    }
}
