use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{RecorderError, RecorderResult};

/// Number of distinct recording names (`rec0.wav` .. `rec999.wav`)
pub const NAME_SLOTS: u32 = 1000;

/// Removable storage medium holding the recordings
#[derive(Debug)]
pub struct Storage {
    root: PathBuf,
    next_index: u32,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_index: 0,
        }
    }

    /// Open a storage root, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> RecorderResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| RecorderError::Storage {
            path: root.clone(),
            source,
        })?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_name(index: u32) -> String {
        format!("rec{}.wav", index % NAME_SLOTS)
    }

    /// First free `rec<N>.wav`, scanning forward from the last chosen index
    ///
    /// The counter stays on the returned index, so a later scan re-checks it
    /// before moving on. At most `NAME_SLOTS` candidates are tried.
    pub fn next_recording_path(&mut self) -> RecorderResult<PathBuf> {
        for offset in 0..NAME_SLOTS {
            let index = (self.next_index + offset) % NAME_SLOTS;
            let candidate = self.root.join(Self::file_name(index));
            if !candidate.exists() {
                self.next_index = index;
                debug!("Next recording slot: {}", candidate.display());
                return Ok(candidate);
            }
        }

        Err(RecorderError::StorageFull {
            root: self.root.clone(),
            capacity: NAME_SLOTS,
        })
    }

    /// Create a new recording file, refusing to clobber an existing one
    pub fn create(&self, path: &Path) -> RecorderResult<File> {
        OpenOptions::new()
            .write(true)
            .read(true)
            .create_new(true)
            .open(path)
            .map_err(|source| RecorderError::Storage {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Create a recording and prepare it with `init`
    ///
    /// If `init` fails the half-written file is removed again, so its name
    /// is free for the next recording.
    pub fn create_with<T>(
        &self,
        path: &Path,
        init: impl FnOnce(File) -> io::Result<T>,
    ) -> RecorderResult<T> {
        let file = self.create(path)?;
        init(file).map_err(|source| {
            self.discard(path);
            RecorderError::Storage {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Remove a recording that never became valid
    pub fn discard(&self, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => debug!("Removed partial recording {}", path.display()),
            Err(e) => warn!("Failed to remove partial recording {}: {}", path.display(), e),
        }
    }
}
