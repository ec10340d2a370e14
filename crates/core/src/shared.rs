//! Thread-safe boundary between the capture side, the control side and
//! external observers (console, future UI).
//!
//! One mutex covers the loudness window, the current estimate, the silence
//! flag and the command-mutable settings. The capture task holds it only for
//! the window-update step; the control task takes one short locked read per
//! tick and performs actuator I/O outside the lock. Mutating commands clamp
//! their argument under the lock and hand the updated settings back to the
//! caller, which persists them best-effort.

use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::controller::ControlState;
use crate::loudness::{LoudnessEstimate, LoudnessEstimator};
use crate::settings::ControllerSettings;
use crate::volume::VolumeRange;

/// Read-only view handed to the console/tray side, safe to poll at any rate.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub source_lufs: f32,
    pub current_vol_db: f32,
    pub desired_vol_db: f32,
    pub is_silent: bool,
    pub device_range: VolumeRange,
    pub device_name: String,
    /// Monotonic engine time at which the manual-override window closes.
    pub manual_override_until: f64,
    pub enabled: bool,
    pub target_lufs: f32,
    pub window_seconds: f32,
    pub slew_rate_db_per_s: f32,
    pub state: ControlState,
}

/// Inputs the control task reads under one short lock per tick.
#[derive(Debug, Clone, Copy)]
pub struct ControlInputs {
    pub source_lufs: f32,
    pub is_silent: bool,
    pub settings: ControllerSettings,
}

struct Inner {
    estimator: LoudnessEstimator,
    source_lufs: f32,
    is_silent: bool,
    settings: ControllerSettings,
    current_vol_db: f32,
    desired_vol_db: f32,
    device_range: VolumeRange,
    device_name: String,
    manual_override_until: f64,
    state: ControlState,
}

pub struct SharedState {
    inner: Mutex<Inner>,
    running: AtomicBool,
}

impl SharedState {
    pub fn new(settings: ControllerSettings) -> Self {
        let estimator =
            LoudnessEstimator::new(settings.window_blocks(), settings.silence_threshold);
        Self {
            inner: Mutex::new(Inner {
                estimator,
                source_lufs: crate::constants::SILENCE_FLOOR_LUFS,
                is_silent: true,
                settings,
                current_vol_db: 0.0,
                desired_vol_db: 0.0,
                device_range: VolumeRange::default(),
                device_name: String::new(),
                manual_override_until: 0.0,
                state: ControlState::Silent,
            }),
            running: AtomicBool::new(true),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── lifecycle ──

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Requests cooperative shutdown; tasks exit at their next loop boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    // ── capture side ──

    /// Pushes one block's mean-square power into the window and publishes
    /// the refreshed estimate.
    pub fn push_power(&self, ms: f32) -> LoudnessEstimate {
        let mut inner = self.lock();
        let estimate = inner.estimator.push(ms);
        inner.source_lufs = estimate.lufs;
        inner.is_silent = estimate.is_silent;
        estimate
    }

    pub fn set_device(&self, name: &str, range: VolumeRange) {
        let mut inner = self.lock();
        inner.device_name = name.to_string();
        inner.device_range = range;
    }

    // ── control side ──

    pub fn control_inputs(&self) -> ControlInputs {
        let inner = self.lock();
        ControlInputs {
            source_lufs: inner.source_lufs,
            is_silent: inner.is_silent,
            settings: inner.settings,
        }
    }

    pub fn publish_control(
        &self,
        current_vol_db: f32,
        desired_vol_db: f32,
        manual_override_until: f64,
        state: ControlState,
    ) {
        let mut inner = self.lock();
        inner.current_vol_db = current_vol_db;
        inner.desired_vol_db = desired_vol_db;
        inner.manual_override_until = manual_override_until;
        inner.state = state;
    }

    // ── external commands (thread-safe, clamped, caller persists) ──

    pub fn adjust_target(&self, delta_db: f32) -> ControllerSettings {
        let mut inner = self.lock();
        inner.settings.target_lufs =
            ControllerSettings::clamp_target(inner.settings.target_lufs + delta_db);
        inner.settings
    }

    pub fn set_target(&self, value_lufs: f32) -> ControllerSettings {
        let mut inner = self.lock();
        inner.settings.target_lufs = ControllerSettings::clamp_target(value_lufs);
        info!("Target set to {:+.1} LUFS", inner.settings.target_lufs);
        inner.settings
    }

    /// Changes the integration window, retaining only the most recent blocks.
    pub fn set_window(&self, seconds: f32) -> ControllerSettings {
        let mut inner = self.lock();
        inner.settings.window_seconds = ControllerSettings::clamp_window(seconds);
        let blocks = inner.settings.window_blocks();
        inner.estimator.set_window_blocks(blocks);
        debug!(
            "Loudness window set to {:.0}s ({} blocks)",
            inner.settings.window_seconds, blocks
        );
        inner.settings
    }

    pub fn set_enabled(&self, on: bool) -> ControllerSettings {
        let mut inner = self.lock();
        inner.settings.enabled = on;
        info!("Control {}", if on { "enabled" } else { "disabled" });
        inner.settings
    }

    pub fn settings(&self) -> ControllerSettings {
        self.lock().settings
    }

    // ── observers ──

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        Snapshot {
            source_lufs: inner.source_lufs,
            current_vol_db: inner.current_vol_db,
            desired_vol_db: inner.desired_vol_db,
            is_silent: inner.is_silent,
            device_range: inner.device_range,
            device_name: inner.device_name.clone(),
            manual_override_until: inner.manual_override_until,
            enabled: inner.settings.enabled,
            target_lufs: inner.settings.target_lufs,
            window_seconds: inner.settings.window_seconds,
            slew_rate_db_per_s: inner.settings.slew_rate_db_per_s,
            state: inner.state,
        }
    }
}
