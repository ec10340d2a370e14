//! Persisted controller configuration.
//!
//! Loading merges the on-disk record over the defaults field by field, so a
//! config written by an older build keeps working. Saving is best-effort:
//! the in-memory settings stay authoritative for the running session even
//! when the write fails.

use directories::ProjectDirs;
use levelhold_core::ControllerSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_target_lufs")]
    pub target_lufs: f32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: f32,
    #[serde(default = "default_slew_rate")]
    pub slew_rate: f32, // dB/s
    #[serde(default = "default_hold_time")]
    pub hold_time: f32, // seconds
    #[serde(default = "default_manual_pause")]
    pub manual_pause: f32, // seconds
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: f32, // mean-square power
    #[serde(default = "default_manual_tolerance")]
    pub manual_tolerance_db: f32,
    /// Explicit monitor source to capture from; `None` = default sink's.
    #[serde(default)]
    pub capture_device: Option<String>,
}

fn default_target_lufs() -> f32 {
    -26.0
}

fn default_enabled() -> bool {
    true
}

fn default_window_seconds() -> f32 {
    10.0
}

fn default_slew_rate() -> f32 {
    8.0
}

fn default_hold_time() -> f32 {
    1.5
}

fn default_manual_pause() -> f32 {
    30.0
}

fn default_silence_threshold() -> f32 {
    1e-8
}

fn default_manual_tolerance() -> f32 {
    1.5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_lufs: default_target_lufs(),
            enabled: default_enabled(),
            window_seconds: default_window_seconds(),
            slew_rate: default_slew_rate(),
            hold_time: default_hold_time(),
            manual_pause: default_manual_pause(),
            silence_threshold: default_silence_threshold(),
            manual_tolerance_db: default_manual_tolerance(),
            capture_device: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from disk, or returns defaults if not found.
    pub fn load() -> Self {
        if let Some(path) = config_path() {
            if let Ok(content) = fs::read_to_string(path) {
                if let Ok(cfg) = serde_json::from_str(&content) {
                    return cfg;
                }
            }
        }
        Self::default()
    }

    /// Saves configuration to disk in JSON format, best-effort.
    pub fn save(&self) {
        if let Some(path) = config_path() {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            if let Ok(json) = serde_json::to_string_pretty(self) {
                let _ = fs::write(path, json);
            }
        }
    }

    /// Validated in-memory settings; out-of-range file values are clamped.
    pub fn settings(&self) -> ControllerSettings {
        ControllerSettings {
            target_lufs: ControllerSettings::clamp_target(self.target_lufs),
            enabled: self.enabled,
            window_seconds: ControllerSettings::clamp_window(self.window_seconds),
            slew_rate_db_per_s: self.slew_rate,
            hold_time_s: self.hold_time,
            manual_pause_s: self.manual_pause,
            silence_threshold: self.silence_threshold,
            manual_tolerance_db: self.manual_tolerance_db,
        }
    }

    /// Folds command-mutated settings back in for persistence.
    pub fn apply(&mut self, settings: &ControllerSettings) {
        self.target_lufs = settings.target_lufs;
        self.enabled = settings.enabled;
        self.window_seconds = settings.window_seconds;
    }
}

fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "levelhold", "levelhold")
        .map(|dirs| dirs.config_dir().join("config.json"))
}
