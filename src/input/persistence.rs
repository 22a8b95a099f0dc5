//! Binding persistence to a flat JSON file
//!
//! Only modified bindings are written, as `{ "<id>": <index> }`. A missing
//! or unreadable file is never fatal: the registry keeps its defaults.

use super::bindings::{Action, BindingRegistry};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk shape of the bindings file
pub type BindingSnapshot = BTreeMap<String, i32>;

/// Loads and saves the binding registry at a fixed path
#[derive(Debug, Clone)]
pub struct BindingStore {
    path: PathBuf,
}

impl BindingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply the saved bindings over the registry's current state
    ///
    /// Returns the number of bindings applied. Missing or malformed files
    /// are logged and leave the registry untouched.
    pub fn load_into(&self, registry: &mut BindingRegistry) -> usize {
        let snapshot = match read_snapshot(&self.path) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!("No bindings file at {}, using defaults", self.path.display());
                return 0;
            }
            Err(e) => {
                info!("Ignoring bindings file {}: {:#}", self.path.display(), e);
                return 0;
            }
        };

        apply_snapshot(registry, &snapshot)
    }

    /// Overwrite the file with the registry's modified bindings
    pub fn save(&self, registry: &BindingRegistry) -> Result<()> {
        let snapshot = snapshot_of(registry);
        let json =
            serde_json::to_string_pretty(&snapshot).context("Failed to serialize bindings")?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create bindings directory {}", parent.display())
                })?;
            }
        }

        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write bindings file {}", self.path.display()))?;

        debug!("Saved {} modified bindings to {}", snapshot.len(), self.path.display());
        Ok(())
    }

    /// Restore defaults and persist the now-empty snapshot
    pub fn reset_and_save(&self, registry: &mut BindingRegistry) -> Result<()> {
        registry.reset_all();
        self.save(registry)
    }
}

/// Modified bindings keyed by id
pub fn snapshot_of(registry: &BindingRegistry) -> BindingSnapshot {
    registry
        .modified()
        .map(|b| (b.id().to_string(), b.index()))
        .collect()
}

/// Apply a snapshot, skipping unknown ids
pub fn apply_snapshot(registry: &mut BindingRegistry, snapshot: &BindingSnapshot) -> usize {
    let mut applied = 0;
    for (id, index) in snapshot {
        match id.parse::<Action>() {
            Ok(action) => {
                registry.rebind(action, *index);
                applied += 1;
            }
            Err(_) => debug!("Skipping unknown binding id in bindings file: {}", id),
        }
    }
    applied
}

fn read_snapshot(path: &Path) -> Result<Option<BindingSnapshot>> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context("Failed to read bindings file"),
    };

    let snapshot: BindingSnapshot =
        serde_json::from_str(&json).context("Failed to parse bindings JSON")?;
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::layout::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = BindingStore::new(dir.path().join("bindings.json"));

        let mut registry = BindingRegistry::new();
        registry.rebind(Action::Jump, BUTTON_X);
        registry.unbind(Action::OpenChat);
        store.save(&registry).unwrap();

        let mut loaded = BindingRegistry::new();
        assert_eq!(store.load_into(&mut loaded), 2);
        assert_eq!(loaded.get(Action::Jump).index(), BUTTON_X);
        assert!(loaded.get(Action::OpenChat).is_unbound());
        assert_eq!(loaded.get(Action::Sneak).index(), BUTTON_B);
    }

    #[test]
    fn test_only_modified_bindings_written() {
        let file = NamedTempFile::new().unwrap();
        let store = BindingStore::new(file.path());

        let mut registry = BindingRegistry::new();
        registry.rebind(Action::Pause, BUTTON_GUIDE);
        store.save(&registry).unwrap();

        let json = std::fs::read_to_string(file.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, serde_json::json!({ "pause": 5 }));
    }

    #[test]
    fn test_missing_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let store = BindingStore::new(dir.path().join("nope.json"));
        let mut registry = BindingRegistry::new();
        assert_eq!(store.load_into(&mut registry), 0);
        assert_eq!(registry.modified().count(), 0);
    }

    #[test]
    fn test_malformed_file_keeps_defaults() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{ not json").unwrap();
        let store = BindingStore::new(file.path());

        let mut registry = BindingRegistry::new();
        assert_eq!(store.load_into(&mut registry), 0);
        assert_eq!(registry.modified().count(), 0);
    }

    #[test]
    fn test_unknown_ids_ignored() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), r#"{ "jump": 3, "fly": 2 }"#).unwrap();
        let store = BindingStore::new(file.path());

        let mut registry = BindingRegistry::new();
        assert_eq!(store.load_into(&mut registry), 1);
        assert_eq!(registry.get(Action::Jump).index(), BUTTON_Y);
    }

    #[test]
    fn test_reset_and_save_clears_file() {
        let file = NamedTempFile::new().unwrap();
        let store = BindingStore::new(file.path());

        let mut registry = BindingRegistry::new();
        registry.rebind(Action::Sprint, BUTTON_R3);
        store.save(&registry).unwrap();

        store.reset_and_save(&mut registry).unwrap();
        assert_eq!(registry.get(Action::Sprint).index(), BUTTON_L3);
        let json = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(json.trim(), "{}");
    }
}
