//! Named program slots on disk.
//!
//! Each slot is a pretty-printed JSON file `<dir>/<slot>.json`. Slot names are
//! limited to ASCII letters, digits, `-` and `_` so a name can never escape the
//! storage directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::StorageConfig;
use crate::error::{AppResult, BotError};
use crate::program::node::Program;

/// Slot used when the caller does not name one.
pub const DEFAULT_SLOT: &str = "default";

const EXTENSION: &str = "json";

/// Named program slots, one JSON file each, under a single directory.
#[derive(Debug, Clone)]
pub struct ProgramStore {
    dir: PathBuf,
}

impl ProgramStore {
    /// Store rooted at `dir`; the directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `storage.program_dir`.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.program_dir.clone())
    }

    /// Directory holding the slot files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `program` to `slot`, replacing any previous content.
    ///
    /// The storage directory is created on first save.
    pub fn save(&self, slot: &str, program: &Program) -> AppResult<PathBuf> {
        let path = self.slot_path(slot)?;
        let json = serde_json::to_string_pretty(program)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(&path, json)?;
        debug!(slot, path = %path.display(), "Program saved");
        Ok(path)
    }

    /// Load the program in `slot`.
    pub fn load(&self, slot: &str) -> AppResult<Program> {
        let path = self.slot_path(slot)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BotError::SlotNotFound(slot.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    /// Names of all saved slots, sorted.
    ///
    /// A storage directory that does not exist yet simply has no slots.
    pub fn list(&self) -> AppResult<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut slots = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_valid_slot(stem) {
                    slots.push(stem.to_string());
                }
            }
        }
        slots.sort();
        Ok(slots)
    }

    fn slot_path(&self, slot: &str) -> AppResult<PathBuf> {
        if !is_valid_slot(slot) {
            return Err(BotError::InvalidSlot(slot.to_string()));
        }
        Ok(self.dir.join(format!("{slot}.{EXTENSION}")))
    }
}

fn is_valid_slot(slot: &str) -> bool {
    !slot.is_empty()
        && slot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
