//! Application path management for dev, portable and installed modes.
//!
//! ## Mode Detection
//!
//! - **Dev mode** (debug builds only): `config.yaml` in the current working
//!   directory wins, and everything else lives next to it.
//! - **Portable mode**: a `.portable` marker file next to the executable
//!   keeps all data files in that directory.
//! - **Installed mode** (default): data lives in the platform config
//!   directory (`%APPDATA%\padcursor`, `~/.config/padcursor`, ...).

use anyhow::Context;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for directories in installed mode
const APP_NAME: &str = "padcursor";

const CONFIG_FILE: &str = "config.yaml";
const BINDINGS_FILE: &str = "bindings.json";

/// Application paths for config, bindings and logs.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file
    pub config: PathBuf,
    /// Path to the persisted controller bindings
    pub bindings: PathBuf,
    /// Path to the logs directory
    pub logs_dir: PathBuf,
    /// Whether data lives next to the config rather than in the platform dir
    pub is_portable: bool,
}

impl AppPaths {
    /// Detect the appropriate paths based on environment.
    ///
    /// Called before logging is initialized, so diagnostics go to stderr
    /// in debug builds.
    pub fn detect() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));

        #[cfg(debug_assertions)]
        {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if cwd.join(CONFIG_FILE).exists() {
                eprintln!("[paths] Running in DEV mode ({} found in cwd: {})", CONFIG_FILE, cwd.display());
                return Self::in_dir(&cwd, true);
            }
        }

        if exe_dir.join(".portable").exists() {
            #[cfg(debug_assertions)]
            eprintln!("[paths] Running in PORTABLE mode (.portable marker found)");
            return Self::in_dir(&exe_dir, true);
        }

        let app_dir = dirs::config_dir()
            .unwrap_or_else(|| {
                eprintln!("[paths] WARNING: no platform config directory, falling back to exe dir");
                exe_dir.clone()
            })
            .join(APP_NAME);

        #[cfg(debug_assertions)]
        eprintln!("[paths] Running in INSTALLED mode (data dir: {})", app_dir.display());

        Self::in_dir(&app_dir, false)
    }

    /// All paths rooted in one directory
    pub fn in_dir(dir: &Path, is_portable: bool) -> Self {
        Self {
            config: dir.join(CONFIG_FILE),
            bindings: dir.join(BINDINGS_FILE),
            logs_dir: dir.join("logs"),
            is_portable,
        }
    }

    /// Get the base directory (for displaying in logs)
    pub fn base_dir(&self) -> PathBuf {
        self.config
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Ensure the base and logs directories exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        for dir in [self.base_dir(), self.logs_dir.clone()] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
            }
        }
        Ok(())
    }
}
