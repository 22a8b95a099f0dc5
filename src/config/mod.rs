//! Configuration module for padcursor
//!
//! Loaded from `config.yaml`. Every field has a default, so a partial file
//! (or none at all) is always usable. Values outside their supported range
//! are clamped rather than rejected.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::cursor::DEFAULT_CURSOR_SPEED;
use crate::input::bindings::DEFAULT_TRIGGER_THRESHOLD;
use crate::input::normalize::{DEFAULT_DEADZONE, MAX_DEADZONE};

/// Main controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Stick deadzone, [0, 0.5]
    #[serde(default = "default_deadzone")]
    pub deadzone: f32,

    /// Trigger press threshold, [0.1, 0.9]
    #[serde(default = "default_trigger_threshold")]
    pub trigger_threshold: f32,

    /// Right stick to camera multiplier, [1, 20]
    #[serde(default = "default_look_sensitivity")]
    pub look_sensitivity: f32,

    #[serde(default)]
    pub invert_y: bool,

    /// Virtual cursor pixels per frame at full deflection, [0.5, 50]
    #[serde(default = "default_cursor_speed")]
    pub cursor_speed: f32,

    /// Master switch for pointer arbitration
    #[serde(default = "default_true")]
    pub virtual_cursor: bool,

    #[serde(default)]
    pub rewriter: RewriterConfig,
}

/// Which pointer API gets intercepted, and what is left alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriterConfig {
    /// Internal name of the class whose static queries are redirected
    #[serde(default = "default_target_owner")]
    pub target_owner: String,

    /// Internal name of the class exposing the hooks
    #[serde(default = "default_hook_owner")]
    pub hook_owner: String,

    /// Dotted class-name prefixes that are never rewritten
    #[serde(default = "default_skip_prefixes")]
    pub skip_prefixes: Vec<String>,
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            target_owner: default_target_owner(),
            hook_owner: default_hook_owner(),
            skip_prefixes: default_skip_prefixes(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            deadzone: default_deadzone(),
            trigger_threshold: default_trigger_threshold(),
            look_sensitivity: default_look_sensitivity(),
            invert_y: false,
            cursor_speed: default_cursor_speed(),
            virtual_cursor: true,
            rewriter: RewriterConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration, falling back to defaults
    ///
    /// A missing or unparsable file is not an error; the reason is logged
    /// and the defaults are returned.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::read(path).await {
            Ok(mut config) => {
                config.clamp();
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                info!("Ignoring config file, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    /// Strict variant of [`load`](Self::load): IO and parse failures are errors
    pub async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ControllerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Pull every numeric setting back into its supported range
    pub fn clamp(&mut self) {
        self.deadzone = clamp_field("deadzone", self.deadzone, 0.0, MAX_DEADZONE);
        self.trigger_threshold =
            clamp_field("trigger_threshold", self.trigger_threshold, 0.1, 0.9);
        self.look_sensitivity = clamp_field("look_sensitivity", self.look_sensitivity, 1.0, 20.0);
        self.cursor_speed = clamp_field("cursor_speed", self.cursor_speed, 0.5, 50.0);
    }
}

fn clamp_field(name: &str, value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        warn!("{} is not a number, using {}", name, min);
        return min;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!("{} = {} is out of range [{}, {}], using {}", name, value, min, max, clamped);
    }
    clamped
}

fn default_deadzone() -> f32 { DEFAULT_DEADZONE }
fn default_trigger_threshold() -> f32 { DEFAULT_TRIGGER_THRESHOLD }
fn default_look_sensitivity() -> f32 { 4.0 }
fn default_cursor_speed() -> f32 { DEFAULT_CURSOR_SPEED }
fn default_true() -> bool { true }
fn default_target_owner() -> String { "org/lwjgl/input/Mouse".to_string() }
fn default_hook_owner() -> String { "io/padcursor/PointerHooks".to_string() }

fn default_skip_prefixes() -> Vec<String> {
    [
        "org.lwjgl",
        "io.padcursor",
        "cpw.mods.fml",
        "net.minecraftforge",
        "org.spongepowered",
        "java.",
        "javax.",
        "sun.",
        "jdk.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
