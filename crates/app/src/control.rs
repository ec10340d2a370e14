//! Control task: turns loudness estimates into slew-limited volume writes.
//!
//! Ticks at half the capture block duration. Each tick takes one short
//! locked read of the shared fields, runs the pure controller, then performs
//! actuator I/O outside the lock so a slow pactl call can never stall the
//! capture side.

use anyhow::{Context, Result};
use levelhold_core::constants::{DEVICE_RETRY_BACKOFF_MS, TICK_MS};
use levelhold_core::{Controller, SharedState, TickInput, VolumeActuator};
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub fn spawn_control(
    shared: Arc<SharedState>,
    actuator: Box<dyn VolumeActuator>,
) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("levelhold-control".into())
        .spawn(move || control_loop(shared, actuator))
        .context("Failed to spawn control thread")
}

fn control_loop(shared: Arc<SharedState>, actuator: Box<dyn VolumeActuator>) {
    let range = actuator.range();
    shared.set_device(&actuator.device_name(), range);

    let settings = shared.settings();
    let mut controller = Controller::new(range, &settings);
    let epoch = Instant::now();

    // Seed from the device's real level so the first tick has a baseline.
    loop {
        if !shared.is_running() {
            return;
        }
        match actuator.get_level_db() {
            Ok(db) => {
                controller.sync(db, epoch.elapsed().as_secs_f64());
                break;
            }
            Err(e) => {
                warn!("Cannot read master volume yet: {:#}", e);
                thread::sleep(Duration::from_millis(DEVICE_RETRY_BACKOFF_MS));
            }
        }
    }

    info!(
        "Control loop started (range {:.2}..{:.2} dB)",
        range.min_db, range.max_db
    );

    let mut last = epoch.elapsed().as_secs_f64();
    while shared.is_running() {
        thread::sleep(Duration::from_millis(TICK_MS));
        let now = epoch.elapsed().as_secs_f64();
        let dt = now - last;
        last = now;

        // Read failure: skip the tick, no state change
        let actual_db = match actuator.get_level_db() {
            Ok(v) => v,
            Err(e) => {
                debug!("Skipping tick, volume read failed: {:#}", e);
                continue;
            }
        };

        let inputs = shared.control_inputs();
        let command = controller.tick(TickInput {
            now_s: now,
            dt_s: dt,
            actual_db,
            source_lufs: inputs.source_lufs,
            is_silent: inputs.is_silent,
            settings: &inputs.settings,
        });

        if let Some(db) = command {
            match actuator.set_level_db(db) {
                Ok(()) => controller.confirm_commit(db, now),
                Err(e) => warn!("Volume write failed, retrying next tick: {:#}", e),
            }
        }

        shared.publish_control(
            controller.current_db(),
            controller.desired_db(),
            controller.override_until_s(),
            controller.state(),
        );
    }
    info!("Control loop stopped");
}
