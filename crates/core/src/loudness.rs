//! Silence-gated sliding-window loudness estimation.
//!
//! Loudness is integrated over a bounded window of per-block mean-square
//! power values. Gating is per-block and absolute: a block below the silence
//! threshold never enters the integrated mean, so pauses neither drag the
//! average down nor cause a delayed overreaction once they age out of the
//! window.

use std::collections::VecDeque;

use crate::constants::{LUFS_OFFSET, SILENCE_FLOOR_LUFS};

/// Mean-square power of an interleaved multi-channel block.
///
/// Sums the per-channel mean squares (BS.1770-style channel sum), which for
/// interleaved data reduces to the total energy divided by the frame count.
pub fn block_mean_square(samples: &[f32], channels: usize) -> f32 {
    if samples.is_empty() || channels == 0 {
        return 0.0;
    }
    let frames = samples.len() / channels;
    if frames == 0 {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    sum_sq / frames as f32
}

/// Converts mean-square power to LUFS, flooring at [`SILENCE_FLOOR_LUFS`].
pub fn mean_square_to_lufs(ms: f32) -> f32 {
    if ms < 1e-20 {
        return SILENCE_FLOOR_LUFS;
    }
    LUFS_OFFSET + 10.0 * ms.log10()
}

/// Windowed loudness value together with the latest block's silence flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessEstimate {
    pub lufs: f32,
    pub is_silent: bool,
}

impl LoudnessEstimate {
    pub fn silent() -> Self {
        Self {
            lufs: SILENCE_FLOOR_LUFS,
            is_silent: true,
        }
    }
}

/// Sliding window of per-block mean-square power values.
pub struct LoudnessEstimator {
    window: VecDeque<f32>,
    max_blocks: usize,
    silence_threshold: f32,
}

impl LoudnessEstimator {
    pub fn new(max_blocks: usize, silence_threshold: f32) -> Self {
        let max_blocks = max_blocks.max(1);
        Self {
            window: VecDeque::with_capacity(max_blocks),
            max_blocks,
            silence_threshold,
        }
    }

    /// Pushes one block's mean-square power and recomputes the estimate.
    pub fn push(&mut self, ms: f32) -> LoudnessEstimate {
        if self.window.len() == self.max_blocks {
            self.window.pop_front();
        }
        self.window.push_back(ms);
        LoudnessEstimate {
            lufs: self.integrated_lufs(),
            is_silent: ms < self.silence_threshold,
        }
    }

    /// Convenience: mean-square + push in one call.
    pub fn ingest(&mut self, samples: &[f32], channels: usize) -> LoudnessEstimate {
        self.push(block_mean_square(samples, channels))
    }

    /// Integrated loudness over the non-silent subset of the window.
    fn integrated_lufs(&self) -> f32 {
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for &ms in &self.window {
            if ms >= self.silence_threshold {
                sum += ms as f64;
                count += 1;
            }
        }
        if count == 0 {
            return SILENCE_FLOOR_LUFS;
        }
        mean_square_to_lufs((sum / count as f64) as f32)
    }

    /// Rebounds the window, keeping only the most recent entries.
    pub fn set_window_blocks(&mut self, new_max: usize) {
        let new_max = new_max.max(1);
        while self.window.len() > new_max {
            self.window.pop_front();
        }
        self.max_blocks = new_max;
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn max_blocks(&self) -> usize {
        self.max_blocks
    }
}
