//! Status channel to an external overlay window.
//!
//! The overlay polls a small text file and shows its content; the `EXIT`
//! sentinel tells it to close. Writes are best-effort: a failure is logged
//! and never interrupts the automation.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const EXIT_SENTINEL: &str = "EXIT";
pub const DEFAULT_STATUS_FILE: &str = "overlay_status.txt";
const INITIAL_MESSAGE: &str = "準備中...";

#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the file with `message`.
    pub fn update(&self, message: &str) {
        debug!("status: {}", message);
        if let Err(e) = std::fs::write(&self.path, message) {
            warn!("failed to update status file {}: {}", self.path.display(), e);
        }
    }

    pub fn finish(&self) {
        self.update(EXIT_SENTINEL);
    }

    /// Write the initial message and return a guard that writes `EXIT` when
    /// dropped.
    pub fn session(&self) -> StatusSession {
        self.update(INITIAL_MESSAGE);
        StatusSession {
            file: self.clone(),
        }
    }
}

pub struct StatusSession {
    file: StatusFile,
}

impl StatusSession {
    pub fn update(&self, message: &str) {
        self.file.update(message);
    }
}

impl Drop for StatusSession {
    fn drop(&mut self) {
        self.file.finish();
    }
}
