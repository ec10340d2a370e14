//! Shared constants for levelhold capture and control.

/// Sample rate used throughout levelhold (48kHz)
pub const SAMPLE_RATE: u32 = 48_000;

/// Channels captured from the loopback/monitor source (stereo)
pub const CHANNELS: usize = 2;

/// Capture block duration in milliseconds
pub const BLOCK_MS: u32 = 200;

/// Frames per capture block (200ms at 48kHz = 9600 frames)
pub const BLOCK_FRAMES: usize = (SAMPLE_RATE as usize * BLOCK_MS as usize) / 1000;

/// Interleaved samples per capture block
pub const BLOCK_SAMPLES: usize = BLOCK_FRAMES * CHANNELS;

/// Capture block duration in seconds
pub const BLOCK_SECONDS: f32 = BLOCK_MS as f32 / 1000.0;

/// Control loop tick interval: half a capture block
pub const TICK_MS: u64 = (BLOCK_MS / 2) as u64;

/// Loudness reported when the window holds no non-silent blocks
pub const SILENCE_FLOOR_LUFS: f32 = -100.0;

/// BS.1770-style offset applied when converting mean-square power to LUFS
pub const LUFS_OFFSET: f32 = -0.691;

/// A volume reading this long after our own write is attributed to the user
pub const MIN_COMMAND_INTERVAL_S: f64 = 0.3;

/// Upward desired-level moves smaller than this bypass the hold timer
pub const RAISE_MARGIN_DB: f32 = 0.5;

/// Actuator writes are suppressed below this step size
pub const MIN_COMMIT_DELTA_DB: f32 = 0.1;

/// Backoff before re-acquiring a lost capture or actuator endpoint
pub const DEVICE_RETRY_BACKOFF_MS: u64 = 1000;
