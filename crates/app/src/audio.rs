//! Loopback capture feeding the loudness estimator.
//!
//! Captures whatever the OS renders to the default output by recording its
//! monitor source. The capture point sits upstream of the volume control, so
//! the measured signal is independent of the level the controller sets.
//!
//! The stream runs inside its own thread behind an outer retry loop: any
//! device loss or stream error tears the stream down and re-resolves against
//! the current default device after a short backoff. Nothing here is fatal.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use levelhold_core::constants::{BLOCK_SAMPLES, CHANNELS, DEVICE_RETRY_BACKOFF_MS, SAMPLE_RATE};
use levelhold_core::loudness::block_mean_square;
use levelhold_core::SharedState;
use log::{info, warn};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub fn spawn_capture(
    shared: Arc<SharedState>,
    device_override: Option<String>,
) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("levelhold-capture".into())
        .spawn(move || capture_loop(shared, device_override))
        .context("Failed to spawn capture thread")
}

fn capture_loop(shared: Arc<SharedState>, device_override: Option<String>) {
    while shared.is_running() {
        if let Err(e) = run_stream(&shared, device_override.as_deref()) {
            warn!("Capture stopped: {:#}", e);
        }
        if shared.is_running() {
            thread::sleep(Duration::from_millis(DEVICE_RETRY_BACKOFF_MS));
        }
    }
    info!("Capture loop stopped");
}

/// Opens a stream on the monitor source and consumes it block by block
/// until shutdown or a stream error.
fn run_stream(shared: &Arc<SharedState>, device_override: Option<&str>) -> Result<()> {
    let host = cpal::default_host();
    let device = resolve_capture_device(&host, device_override)?;
    let device_name = device.name().unwrap_or_default();
    info!("Capturing from: {}", device_name);

    let config = cpal::StreamConfig {
        channels: CHANNELS as u16,
        sample_rate: cpal::SampleRate(SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    let rb = HeapRb::<f32>::new(BLOCK_SAMPLES * 4);
    let (mut prod, mut cons) = rb.split();

    let failed = Arc::new(AtomicBool::new(false));
    let err_flag = failed.clone();

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _| {
            let _ = prod.push_slice(data);
        },
        move |err| {
            warn!("Capture stream error: {}", err);
            err_flag.store(true, Ordering::Relaxed);
        },
        None,
    )?;
    stream.play()?;

    let mut block = vec![0.0f32; BLOCK_SAMPLES];
    while shared.is_running() && !failed.load(Ordering::Relaxed) {
        if cons.occupied_len() >= BLOCK_SAMPLES {
            cons.pop_slice(&mut block);
            let ms = block_mean_square(&block, CHANNELS);
            // Lock held only for the window-update step
            shared.push_power(ms);
        } else {
            thread::sleep(Duration::from_millis(5));
        }
    }

    if failed.load(Ordering::Relaxed) {
        Err(anyhow!("capture stream reported an error"))
    } else {
        Ok(())
    }
}

fn resolve_capture_device(host: &cpal::Host, override_name: Option<&str>) -> Result<cpal::Device> {
    if let Some(name) = override_name {
        return host
            .input_devices()?
            .find(|d| d.name().ok().as_deref() == Some(name))
            .with_context(|| format!("Capture device '{}' not found", name));
    }

    let default_output = host.default_output_device().and_then(|d| d.name().ok());

    let mut names = Vec::new();
    let mut devices = Vec::new();
    for device in host.input_devices()? {
        names.push(device.name().unwrap_or_default());
        devices.push(device);
    }

    if let Some(idx) = pick_monitor_source(&names, default_output.as_deref()) {
        return Ok(devices.swap_remove(idx));
    }

    // Pulse/PipeWire hosts usually route the monitor through the default
    // input when nothing more specific is exposed.
    host.default_input_device()
        .context("No monitor source or default input device found")
}

/// Picks the monitor source index from a device name list, preferring the
/// monitor belonging to the current default output.
fn pick_monitor_source(names: &[String], default_output: Option<&str>) -> Option<usize> {
    if let Some(out) = default_output {
        if let Some(i) = names.iter().position(|n| is_monitor(n) && n.contains(out)) {
            return Some(i);
        }
    }
    names.iter().position(|n| is_monitor(n))
}

pub fn is_monitor(name: &str) -> bool {
    name.ends_with(".monitor") || name.contains("Monitor of")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_prefers_default_sink_monitor() {
        let devs = names(&[
            "alsa_input.usb-mic",
            "alsa_output.pci-0000.hdmi.monitor",
            "alsa_output.pci-0000.analog-stereo.monitor",
        ]);
        let idx = pick_monitor_source(&devs, Some("alsa_output.pci-0000.analog-stereo"));
        assert_eq!(idx, Some(2));
    }

    #[test]
    fn test_falls_back_to_any_monitor() {
        let devs = names(&["alsa_input.usb-mic", "Monitor of Built-in Audio"]);
        assert_eq!(pick_monitor_source(&devs, Some("Speakers")), Some(1));
        assert_eq!(pick_monitor_source(&devs, None), Some(1));
    }

    #[test]
    fn test_no_monitor_available() {
        let devs = names(&["alsa_input.usb-mic", "alsa_input.webcam"]);
        assert_eq!(pick_monitor_source(&devs, None), None);
    }
}
