//! Master output level boundary.
//!
//! The control loop treats every actuator call as fallible: a failed read
//! skips the tick, a failed write is retried on the next one. Nothing below
//! this boundary may take the control task down.

use anyhow::Result;

/// Valid dB range and step of an output device's master level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeRange {
    pub min_db: f32,
    pub max_db: f32,
    pub step_db: f32,
}

impl Default for VolumeRange {
    fn default() -> Self {
        // Usable range of a typical endpoint; actuators may report their own.
        Self {
            min_db: -65.25,
            max_db: 0.0,
            step_db: 0.5,
        }
    }
}

impl VolumeRange {
    pub fn clamp(&self, db: f32) -> f32 {
        db.clamp(self.min_db, self.max_db)
    }
}

/// Read/write access to the OS master output level in dB.
pub trait VolumeActuator: Send {
    fn get_level_db(&self) -> Result<f32>;
    fn set_level_db(&self, db: f32) -> Result<()>;
    fn range(&self) -> VolumeRange;
    fn device_name(&self) -> String;
}
