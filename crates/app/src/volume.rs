//! Master volume actuator backed by `pactl`.
//!
//! Talks to the PulseAudio/PipeWire default sink: reads the level in dB from
//! `get-sink-volume` and writes it back with a `dB`-suffixed volume spec.
//! Targeting `@DEFAULT_SINK@` means a device switch is picked up on the very
//! next call without any re-enumeration here.

use anyhow::{anyhow, bail, Context, Result};
use levelhold_core::{VolumeActuator, VolumeRange};
#[cfg(target_os = "linux")]
use std::process::Command;

pub struct PulseVolume {
    sink: String,
    range: VolumeRange,
}

impl PulseVolume {
    #[cfg(target_os = "linux")]
    pub fn connect() -> Result<Self> {
        let out = Command::new("pactl")
            .args(["get-default-sink"])
            .output()
            .context("Failed to run pactl (is PulseAudio/PipeWire running?)")?;
        if !out.status.success() {
            bail!(
                "pactl get-default-sink failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        let sink = String::from_utf8_lossy(&out.stdout).trim().to_string();
        if sink.is_empty() {
            bail!("No default sink reported");
        }
        Ok(Self {
            sink,
            range: VolumeRange::default(),
        })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn connect() -> Result<Self> {
        bail!("Master volume control is only supported through pactl on Linux")
    }
}

impl VolumeActuator for PulseVolume {
    fn get_level_db(&self) -> Result<f32> {
        #[cfg(target_os = "linux")]
        {
            let out = Command::new("pactl")
                .args(["get-sink-volume", "@DEFAULT_SINK@"])
                .output()
                .context("Failed to run pactl")?;
            if !out.status.success() {
                bail!(
                    "pactl get-sink-volume failed: {}",
                    String::from_utf8_lossy(&out.stderr).trim()
                );
            }
            let text = String::from_utf8_lossy(&out.stdout);
            let db = parse_sink_volume_db(&text)
                .ok_or_else(|| anyhow!("Could not parse sink volume from: {}", text.trim()))?;
            // A muted/zero channel reports -inf; pin it to the range floor
            Ok(if db.is_finite() { db } else { self.range.min_db })
        }

        #[cfg(not(target_os = "linux"))]
        {
            bail!("Unsupported platform")
        }
    }

    fn set_level_db(&self, db: f32) -> Result<()> {
        #[cfg(target_os = "linux")]
        {
            let spec = format!("{:.2}dB", self.range.clamp(db));
            let out = Command::new("pactl")
                .args(["set-sink-volume", "--", "@DEFAULT_SINK@", &spec])
                .output()
                .context("Failed to run pactl")?;
            if !out.status.success() {
                bail!(
                    "pactl set-sink-volume failed: {}",
                    String::from_utf8_lossy(&out.stderr).trim()
                );
            }
            Ok(())
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = db;
            bail!("Unsupported platform")
        }
    }

    fn range(&self) -> VolumeRange {
        self.range
    }

    fn device_name(&self) -> String {
        self.sink.clone()
    }
}

/// Extracts the first per-channel dB figure from `pactl get-sink-volume`
/// output, e.g. "Volume: front-left: 39945 /  61% / -12.95 dB,   ...".
fn parse_sink_volume_db(text: &str) -> Option<f32> {
    for line in text.lines() {
        let line = line.trim();
        if !line.starts_with("Volume:") {
            continue;
        }
        // Channels are comma-separated, fields within a channel slash-separated
        for part in line.split('/').flat_map(|p| p.split(',')) {
            if let Some(db) = part.trim().strip_suffix("dB").map(str::trim) {
                if db.eq_ignore_ascii_case("-inf") {
                    return Some(f32::NEG_INFINITY);
                }
                if let Ok(v) = db.parse::<f32>() {
                    return Some(v);
                }
            }
        }
    }
    None
}
