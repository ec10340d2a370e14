pub mod constants;
pub mod controller;
pub mod loudness;
pub mod settings;
pub mod shared;
pub mod volume;

pub use controller::{ControlState, Controller, TickInput};
pub use loudness::{LoudnessEstimate, LoudnessEstimator};
pub use settings::ControllerSettings;
pub use shared::{SharedState, Snapshot};
pub use volume::{VolumeActuator, VolumeRange};
