//! Application path management for portable and installed modes.
//!
//! - **Working-directory mode**: if `config.yaml` or `mapping.txt` exists in
//!   the current directory, everything lives there. This is how the tool is
//!   usually run: from the folder holding the mapping file.
//! - **Portable mode**: a `.portable` marker next to the executable keeps all
//!   files beside it.
//! - **Installed mode** (default): data lives in the platform data directory
//!   (`%APPDATA%\MIDI Keypad`, `~/.local/share/MIDI Keypad`).

use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "MIDI Keypad";

const CONFIG_FILE: &str = "config.yaml";
const MAPPING_FILE: &str = "mapping.txt";

/// Application paths for config, mapping and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Directory relative mapping paths resolve against
    pub data_dir: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether files live next to the executable or the working directory
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// Called before logging is initialized.
    pub fn detect() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        if cwd.join(CONFIG_FILE).exists() || cwd.join(MAPPING_FILE).exists() {
            return Self::in_dir(&cwd);
        }

        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        if exe_dir.join(".portable").exists() {
            return Self::in_dir(&exe_dir);
        }

        let app_data = dirs::data_dir().unwrap_or(exe_dir).join(APP_NAME);
        Self {
            config: app_data.join(CONFIG_FILE),
            data_dir: app_data.clone(),
            logs_dir: app_data.join("logs"),
            is_portable: false,
        }
    }

    /// Keep every file in `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            data_dir: dir.to_path_buf(),
            logs_dir: dir.join("logs"),
            is_portable: true,
        }
    }

    /// Resolve a mapping file path; absolute paths are kept as given
    pub fn mapping_path(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.data_dir.join(file)
        }
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [&self.data_dir, &self.logs_dir] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_dir_layout() {
        let paths = AppPaths::in_dir(Path::new("pad"));

        assert!(paths.is_portable);
        assert_eq!(paths.config, PathBuf::from("pad/config.yaml"));
        assert_eq!(paths.logs_dir, PathBuf::from("pad/logs"));
    }

    #[test]
    fn test_mapping_path_resolution() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AppPaths::in_dir(temp_dir.path());

        assert_eq!(
            paths.mapping_path(Path::new("mapping.txt")),
            temp_dir.path().join("mapping.txt")
        );

        let absolute = temp_dir.path().join("elsewhere").join("pads.txt");
        assert_eq!(paths.mapping_path(&absolute), absolute);
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AppPaths::in_dir(&temp_dir.path().join("nested"));

        paths.ensure_directories().unwrap();
        assert!(paths.data_dir.is_dir());
        assert!(paths.logs_dir.is_dir());
    }
}
