//! Feed-forward volume controller.
//!
//! Each tick maps the measured source loudness straight to a desired output
//! level (`target - measured`), then filters that through hold-before-release
//! hysteresis, manual-override damping and slew limiting before deciding
//! whether an actuator write is warranted. Time is passed in as monotonic
//! seconds so the whole state machine runs under test without a clock.
//!
//! Ordering per tick: manual-change detection, disabled/silent bypass,
//! feed-forward law, hold, override damping, slew, minimum-commit gate.

use log::{debug, info};

use crate::constants::{MIN_COMMAND_INTERVAL_S, MIN_COMMIT_DELTA_DB, RAISE_MARGIN_DB};
use crate::settings::ControllerSettings;
use crate::volume::VolumeRange;

/// Observable controller state, driven by the enabled flag, the silence
/// flag, the hold timer and the manual-override window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Disabled,
    Silent,
    Tracking,
    Holding,
    ManualOverride,
}

/// Per-tick inputs gathered by the control task.
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    /// Monotonic time of this tick in seconds.
    pub now_s: f64,
    /// Elapsed time since the previous tick.
    pub dt_s: f64,
    /// Master level read back from the actuator this tick.
    pub actual_db: f32,
    /// Current windowed loudness estimate.
    pub source_lufs: f32,
    pub is_silent: bool,
    pub settings: &'a ControllerSettings,
}

/// Pure feed-forward law: the output level that would place `measured_lufs`
/// exactly at `target_lufs`, clamped to the device range.
pub fn feed_forward_db(target_lufs: f32, measured_lufs: f32, range: VolumeRange) -> f32 {
    range.clamp(target_lufs - measured_lufs)
}

pub struct Controller {
    range: VolumeRange,
    current_db: f32,
    desired_db: f32,
    last_commanded_db: Option<f32>,
    last_commanded_time: f64,
    hold_remaining_s: f32,
    override_until_s: f64,
    state: ControlState,
}

impl Controller {
    pub fn new(range: VolumeRange, settings: &ControllerSettings) -> Self {
        Self {
            range,
            current_db: 0.0,
            desired_db: 0.0,
            last_commanded_db: None,
            last_commanded_time: 0.0,
            hold_remaining_s: settings.hold_time_s,
            override_until_s: 0.0,
            state: ControlState::Silent,
        }
    }

    /// Seeds the controller from the device's actual level at startup.
    pub fn sync(&mut self, actual_db: f32, now_s: f64) {
        self.current_db = actual_db;
        self.desired_db = actual_db;
        self.last_commanded_db = Some(actual_db);
        self.last_commanded_time = now_s;
    }

    /// Runs one control tick. Returns the level to write to the actuator,
    /// or `None` when no write is warranted this tick. The caller must
    /// report a successful write back via [`Controller::confirm_commit`];
    /// a failed write leaves the state untouched and the step is retried
    /// next tick.
    pub fn tick(&mut self, input: TickInput) -> Option<f32> {
        let s = input.settings;

        // A level that moved on its own, long enough after our last write,
        // is a user (or third-party) adjustment: back off and resync. The
        // heuristic cannot tell the slider from another app; it does not try.
        if let Some(last) = self.last_commanded_db {
            if input.now_s - self.last_commanded_time > MIN_COMMAND_INTERVAL_S
                && (input.actual_db - last).abs() > s.manual_tolerance_db
            {
                info!(
                    "Manual level change detected ({:+.1} -> {:+.1} dB), backing off for {:.0}s",
                    last, input.actual_db, s.manual_pause_s
                );
                self.override_until_s = input.now_s + f64::from(s.manual_pause_s);
                self.resync(input.actual_db, input.now_s);
                self.state = ControlState::ManualOverride;
                return None;
            }
        }

        // Disabled or silent: track the actual level so re-engaging starts
        // from wherever the volume really is, and keep the hold timer armed.
        if !s.enabled || input.is_silent {
            self.resync(input.actual_db, input.now_s);
            self.hold_remaining_s = s.hold_time_s;
            self.state = if s.enabled {
                ControlState::Silent
            } else {
                ControlState::Disabled
            };
            return None;
        }

        let raw_desired = feed_forward_db(s.target_lufs, input.source_lufs, self.range);

        // Raising the level is deferred until the hold timer runs out without
        // being refreshed; lowering (or staying put) applies immediately and
        // re-arms the timer.
        let mut holding = false;
        if raw_desired > self.desired_db + RAISE_MARGIN_DB {
            if self.hold_remaining_s > 0.0 {
                self.hold_remaining_s -= input.dt_s as f32;
                holding = true;
            } else {
                debug!("Hold expired, releasing toward {:+.1} dB", raw_desired);
                self.desired_db = raw_desired;
                self.hold_remaining_s = s.hold_time_s;
            }
        } else {
            self.desired_db = raw_desired;
            self.hold_remaining_s = s.hold_time_s;
        }

        let in_override = input.now_s < self.override_until_s;
        self.state = if in_override {
            ControlState::ManualOverride
        } else if holding {
            ControlState::Holding
        } else {
            ControlState::Tracking
        };

        // While the override window is open, never raise the level the user
        // just set; attenuation still goes through to catch loud spikes.
        if in_override && self.desired_db > self.current_db + RAISE_MARGIN_DB {
            return None;
        }

        let mut delta = self.desired_db - self.current_db;
        let max_step = s.slew_rate_db_per_s * input.dt_s as f32;
        if delta.abs() > max_step {
            delta = if delta > 0.0 { max_step } else { -max_step };
        }
        let new_db = self.range.clamp(self.current_db + delta);

        if (new_db - self.current_db).abs() > MIN_COMMIT_DELTA_DB {
            Some(new_db)
        } else {
            None
        }
    }

    /// Records a successful actuator write.
    pub fn confirm_commit(&mut self, db: f32, now_s: f64) {
        self.current_db = db;
        self.last_commanded_db = Some(db);
        self.last_commanded_time = now_s;
    }

    // Adopts the device's actual level as both current and desired, so the
    // next engaged tick starts from reality instead of a stale setpoint.
    fn resync(&mut self, actual_db: f32, now_s: f64) {
        self.current_db = actual_db;
        self.desired_db = actual_db;
        self.last_commanded_db = Some(actual_db);
        self.last_commanded_time = now_s;
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn current_db(&self) -> f32 {
        self.current_db
    }

    pub fn desired_db(&self) -> f32 {
        self.desired_db
    }

    /// Monotonic time at which the manual-override window closes.
    pub fn override_until_s(&self) -> f64 {
        self.override_until_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ControllerSettings {
        ControllerSettings::default()
    }

    fn ctl_at(db: f32) -> Controller {
        let mut c = Controller::new(VolumeRange::default(), &settings());
        c.sync(db, 0.0);
        c
    }

    fn tick_in<'a>(
        now: f64,
        dt: f64,
        actual: f32,
        lufs: f32,
        s: &'a ControllerSettings,
    ) -> TickInput<'a> {
        TickInput {
            now_s: now,
            dt_s: dt,
            actual_db: actual,
            source_lufs: lufs,
            is_silent: false,
            settings: s,
        }
    }

    #[test]
    fn test_feed_forward_law_clamps_to_range() {
        let r = VolumeRange {
            min_db: -65.25,
            max_db: 0.0,
            step_db: 0.5,
        };
        // -26 - (-30) = +4, clamped to the top of the range
        assert_eq!(feed_forward_db(-26.0, -30.0, r), 0.0);
        assert_eq!(feed_forward_db(-26.0, -10.0, r), -16.0);
        assert_eq!(feed_forward_db(-26.0, 50.0, r), -65.25);
    }

    #[test]
    fn test_slew_bound_per_tick() {
        let s = settings();
        let mut c = ctl_at(-10.0);
        // Loud content wants -30 dB; one 100ms tick may move at most 0.8 dB
        let cmd = c.tick(tick_in(0.5, 0.1, -10.0, 4.0, &s));
        let cmd = cmd.expect("large error should produce a command");
        assert!((cmd - (-10.8)).abs() < 1e-4);
        c.confirm_commit(cmd, 0.5);
        assert!((c.current_db() - (-10.8)).abs() < 1e-4);
    }

    #[test]
    fn test_small_delta_not_committed() {
        let s = settings();
        let mut c = ctl_at(-16.0);
        // Desired -16.05: inside the commit deadband, no actuator chatter
        assert_eq!(c.tick(tick_in(0.5, 0.1, -16.0, -9.95, &s)), None);
    }

    #[test]
    fn test_transient_dip_does_not_raise_volume() {
        let s = settings();
        let mut c = ctl_at(-10.0);
        // Steady state: measured -16 keeps desired at -10
        assert_eq!(c.tick(tick_in(0.5, 0.1, -10.0, -16.0, &s)), None);
        // One-tick dip to -21 (raw desired -5, a raise): held back
        assert_eq!(c.tick(tick_in(0.6, 0.1, -10.0, -21.0, &s)), None);
        assert_eq!(c.state(), ControlState::Holding);
        assert!((c.desired_db() - (-10.0)).abs() < 1e-6);
        // Loudness recovers before hold_time elapses: nothing ever moved
        assert_eq!(c.tick(tick_in(0.7, 0.1, -10.0, -16.0, &s)), None);
        assert_eq!(c.state(), ControlState::Tracking);
        assert!((c.desired_db() - (-10.0)).abs() < 1e-6);
    }

    #[test]
    fn test_sustained_quiet_releases_after_hold() {
        let s = settings();
        let mut c = ctl_at(-10.0);
        // Quiet content wants -5 dB (a raise). hold_time 1.5s, 1s ticks:
        // the first two ticks count the timer down, the third releases.
        assert_eq!(c.tick(tick_in(1.0, 1.0, -10.0, -21.0, &s)), None);
        assert_eq!(c.tick(tick_in(2.0, 1.0, -10.0, -21.0, &s)), None);
        let cmd = c.tick(tick_in(3.0, 1.0, -10.0, -21.0, &s));
        let cmd = cmd.expect("release should start raising");
        assert!(cmd > -10.0);
        assert!((c.desired_db() - (-5.0)).abs() < 1e-6);
    }

    #[test]
    fn test_decrease_applies_immediately() {
        let s = settings();
        let mut c = ctl_at(-10.0);
        let cmd = c.tick(tick_in(0.5, 0.1, -10.0, -10.0, &s));
        // raw desired -16: downward, no hold involved
        assert!(cmd.expect("attenuation is immediate") < -10.0);
        assert_eq!(c.state(), ControlState::Tracking);
    }

    #[test]
    fn test_manual_change_detected_and_resynced() {
        let s = settings();
        let mut c = ctl_at(-20.0);
        // User dragged the slider to -10 well after our last write
        assert_eq!(c.tick(tick_in(1.0, 0.1, -10.0, -16.0, &s)), None);
        assert_eq!(c.state(), ControlState::ManualOverride);
        assert!((c.current_db() - (-10.0)).abs() < 1e-6);
        assert!((c.override_until_s() - 31.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_or_fresh_deviation_is_not_manual() {
        let s = settings();
        let mut c = ctl_at(-20.0);
        // Within tolerance: not a manual change
        c.tick(tick_in(1.0, 0.1, -19.0, -16.0, &s));
        assert_ne!(c.state(), ControlState::ManualOverride);
        // Large deviation but too soon after our own write: ignored too
        let mut c = ctl_at(-20.0);
        c.tick(tick_in(0.2, 0.1, -10.0, -16.0, &s));
        assert_ne!(c.state(), ControlState::ManualOverride);
    }

    #[test]
    fn test_override_blocks_raise_allows_drop() {
        let s = settings();
        let mut c = ctl_at(-20.0);
        // Activate the override
        assert_eq!(c.tick(tick_in(1.0, 0.1, -10.0, -16.0, &s)), None);

        // Quiet content asks for a raise; run past the hold timer with the
        // override still open. No command may escape.
        assert_eq!(c.tick(tick_in(2.0, 1.0, -10.0, -30.0, &s)), None);
        assert_eq!(c.tick(tick_in(3.0, 1.0, -10.0, -30.0, &s)), None);
        assert_eq!(c.tick(tick_in(4.0, 1.0, -10.0, -30.0, &s)), None);
        assert_eq!(c.tick(tick_in(5.0, 1.0, -10.0, -30.0, &s)), None);
        assert_eq!(c.state(), ControlState::ManualOverride);

        // A loud spike during the same override still attenuates
        let cmd = c.tick(tick_in(6.0, 0.1, -10.0, 4.0, &s));
        let cmd = cmd.expect("downward correction must pass the override");
        assert!(cmd < -10.0);
    }

    #[test]
    fn test_override_expires_back_to_tracking() {
        let s = settings();
        let mut c = ctl_at(-20.0);
        c.tick(tick_in(1.0, 0.1, -10.0, -16.0, &s));
        assert_eq!(c.state(), ControlState::ManualOverride);
        // 31s later the window has closed; normal tracking resumes
        let _ = c.tick(tick_in(32.0, 0.1, -10.0, -16.0, &s));
        assert_eq!(c.state(), ControlState::Tracking);
    }

    #[test]
    fn test_override_window_monotonic() {
        let s = settings();
        let mut c = ctl_at(-20.0);
        c.tick(tick_in(1.0, 0.1, -10.0, -16.0, &s));
        let first = c.override_until_s();
        // A second manual jump later on only pushes the window forward
        let _ = c.tick(tick_in(5.0, 0.1, -25.0, -16.0, &s));
        assert!(c.override_until_s() > first);
    }

    #[test]
    fn test_silent_bypass_resyncs_without_drift() {
        let s = settings();
        let mut c = ctl_at(-20.0);
        let mut input = tick_in(1.0, 0.1, -12.0, -100.0, &s);
        input.is_silent = true;
        // Within tolerance? -12 vs -20 is a manual jump; use a close value
        input.actual_db = -19.5;
        assert_eq!(c.tick(input), None);
        assert_eq!(c.state(), ControlState::Silent);
        assert!((c.current_db() - (-19.5)).abs() < 1e-6);
    }

    #[test]
    fn test_disable_is_idempotent() {
        let mut s = settings();
        s.enabled = false;
        let mut c = ctl_at(-20.0);
        assert_eq!(c.tick(tick_in(1.0, 0.1, -20.0, -16.0, &s)), None);
        let desired = c.desired_db();
        let state = c.state();
        assert_eq!(c.tick(tick_in(1.1, 0.1, -20.0, -16.0, &s)), None);
        assert_eq!(c.desired_db(), desired);
        assert_eq!(c.state(), state);
        assert_eq!(state, ControlState::Disabled);
    }

    #[test]
    fn test_reenable_resumes_within_slew_limit() {
        let mut s = settings();
        s.enabled = false;
        let mut c = ctl_at(-20.0);
        c.tick(tick_in(1.0, 0.1, -20.0, -10.0, &s));
        s.enabled = true;
        // Large error on re-enable; the first commit stays slew-bounded
        let cmd = c.tick(tick_in(1.1, 0.1, -20.0, -10.0, &s));
        if let Some(db) = cmd {
            assert!((db - c.current_db()).abs() <= s.slew_rate_db_per_s * 0.1 + 1e-4);
        }
    }

    #[test]
    fn test_failed_write_leaves_state_for_retry() {
        let s = settings();
        let mut c = ctl_at(-10.0);
        let cmd = c.tick(tick_in(0.5, 0.1, -10.0, 4.0, &s));
        assert!(cmd.is_some());
        // No confirm_commit: current level is unchanged and the next tick
        // asks for the same step again.
        assert!((c.current_db() - (-10.0)).abs() < 1e-6);
        let cmd2 = c.tick(tick_in(0.6, 0.1, -10.0, 4.0, &s));
        assert_eq!(cmd, cmd2);
    }
}
