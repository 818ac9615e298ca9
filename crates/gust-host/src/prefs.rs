use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::set_logging_enabled;

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("failed to write preferences: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode preferences: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Preferences the host persists for the update glue. Currently just the
/// debug-logging flag, toggled from the host's configuration UI.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    pub debug: bool,
}

impl Prefs {
    /// Load preferences, falling back to defaults when the file is missing
    /// or unreadable (a bad prefs file must never break the host).
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("Ignoring unreadable preferences at {}: {err}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Persist preferences as pretty-printed JSON, creating parent
    /// directories as needed.
    ///
    /// # Errors
    /// Returns an error when encoding or writing fails.
    pub fn save(&self, path: &Path) -> Result<(), PrefsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Apply the debug flag to the global log level.
    pub fn apply(&self) {
        set_logging_enabled(self.debug);
    }

    /// Flip the debug flag and apply it immediately. Returns the new value;
    /// persisting it is the caller's job.
    pub fn toggle_debug(&mut self) -> bool {
        self.debug = !self.debug;
        debug!("Debug logging toggled to {}", self.debug);
        self.apply();
        self.debug
    }
}

#[cfg(test)]
mod tests {
    use super::Prefs;

    #[test]
    fn load_missing_file_returns_defaults() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let prefs = Prefs::load(&temp.path().join("prefs.json"));
        assert!(!prefs.debug);
    }

    #[test]
    fn load_garbage_file_returns_defaults() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("prefs.json");
        std::fs::write(&path, "{not json").expect("prefs file should be written");

        let prefs = Prefs::load(&path);
        assert!(!prefs.debug);
    }

    #[test]
    fn save_and_load_round_trip() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("nested").join("prefs.json");

        let prefs = Prefs { debug: true };
        prefs.save(&path).expect("prefs should save");

        assert!(Prefs::load(&path).debug);
    }

    #[test]
    fn toggle_flips_flag() {
        // Global log level assertions live in the logging tests.
        let mut prefs = Prefs { debug: false };

        assert!(prefs.toggle_debug());
        assert!(prefs.debug);
        assert!(!prefs.toggle_debug());
        assert!(!prefs.debug);
    }
}
