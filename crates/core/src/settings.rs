//! Runtime-tunable controller settings.
//!
//! Persistence lives in the app crate; this is the validated in-memory form
//! shared between the control loop and external commands. Out-of-range
//! command values are clamped to the nearest bound, never rejected.

use crate::constants::BLOCK_SECONDS;

/// Valid target loudness range in LUFS.
pub const TARGET_LUFS_MIN: f32 = -60.0;
pub const TARGET_LUFS_MAX: f32 = 0.0;

/// Valid integration window range in seconds.
pub const WINDOW_SECONDS_MIN: f32 = 5.0;
pub const WINDOW_SECONDS_MAX: f32 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSettings {
    /// Loudness the controller steers the perceived output toward.
    pub target_lufs: f32,
    pub enabled: bool,
    /// Integration window for the loudness estimate.
    pub window_seconds: f32,
    /// Maximum rate of volume change.
    pub slew_rate_db_per_s: f32,
    /// Delay before the desired level is allowed to rise after a quiet spell.
    pub hold_time_s: f32,
    /// How long the controller backs off after a user volume change.
    pub manual_pause_s: f32,
    /// Absolute mean-square power below which a block counts as silent.
    pub silence_threshold: f32,
    /// Deviation from our last commanded level treated as a user change.
    pub manual_tolerance_db: f32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            target_lufs: -26.0,
            enabled: true,
            window_seconds: 10.0,
            slew_rate_db_per_s: 8.0,
            hold_time_s: 1.5,
            manual_pause_s: 30.0,
            silence_threshold: 1e-8,
            manual_tolerance_db: 1.5,
        }
    }
}

impl ControllerSettings {
    pub fn clamp_target(value: f32) -> f32 {
        value.clamp(TARGET_LUFS_MIN, TARGET_LUFS_MAX)
    }

    pub fn clamp_window(seconds: f32) -> f32 {
        seconds.clamp(WINDOW_SECONDS_MIN, WINDOW_SECONDS_MAX)
    }

    /// Window length in capture blocks, never zero.
    pub fn window_blocks(&self) -> usize {
        ((self.window_seconds / BLOCK_SECONDS) as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = ControllerSettings::default();
        assert_eq!(s.target_lufs, -26.0);
        assert!(s.enabled);
        assert_eq!(s.window_seconds, 10.0);
        assert_eq!(s.slew_rate_db_per_s, 8.0);
        assert_eq!(s.hold_time_s, 1.5);
        assert_eq!(s.manual_pause_s, 30.0);
    }

    #[test]
    fn test_target_clamping() {
        assert_eq!(ControllerSettings::clamp_target(-70.0), -60.0);
        assert_eq!(ControllerSettings::clamp_target(5.0), 0.0);
        assert_eq!(ControllerSettings::clamp_target(-26.0), -26.0);
    }

    #[test]
    fn test_window_clamping() {
        assert_eq!(ControllerSettings::clamp_window(1.0), 5.0);
        assert_eq!(ControllerSettings::clamp_window(600.0), 120.0);
    }

    #[test]
    fn test_window_blocks() {
        let s = ControllerSettings::default();
        // 10s of 200ms blocks
        assert_eq!(s.window_blocks(), 50);
    }
}
