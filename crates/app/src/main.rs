use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cpal::traits::{DeviceTrait, HostTrait};
use levelhold_core::{SharedState, VolumeActuator};
use log::{info, warn};
use std::sync::Arc;

mod audio;
mod autostart;
mod config;
mod console;
mod control;
mod daemon;
mod volume;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "levelhold")]
#[command(about = "Keeps perceived loudness constant by steering the master volume", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the controller in the foreground (press Ctrl+C to stop)
    Run {
        /// Target loudness in LUFS (saved to config)
        #[arg(short, long)]
        target: Option<f32>,
        /// Capture from this monitor source instead of the default sink's
        #[arg(short, long)]
        device: Option<String>,
    },
    /// List output devices and monitor sources
    List,
    /// Register levelhold to start at login
    Install,
    /// Remove the login registration
    Uninstall,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::List) => list_devices()?,
        Some(Commands::Install) => {
            autostart::enable_autostart()?;
            println!("Startup entry installed.");
        }
        Some(Commands::Uninstall) => {
            autostart::disable_autostart()?;
            println!("Startup entry removed.");
        }
        Some(Commands::Run { target, device }) => run(target, device)?,
        None => run(None, None)?,
    }

    Ok(())
}

fn run(target: Option<f32>, device: Option<String>) -> Result<()> {
    match daemon::acquire_single_instance() {
        Ok(true) => {}
        Ok(false) => {
            println!("Another instance is already running.");
            return Ok(());
        }
        Err(e) => warn!("Single-instance check failed: {}", e),
    }

    let mut cfg = AppConfig::load();
    let device = device.or_else(|| cfg.capture_device.clone());

    let shared = Arc::new(SharedState::new(cfg.settings()));
    if let Some(t) = target {
        let settings = shared.set_target(t);
        cfg.apply(&settings);
        cfg.save();
    }

    let actuator =
        volume::PulseVolume::connect().context("Cannot reach the master volume endpoint")?;
    info!("Controlling sink: {}", actuator.device_name());

    let capture = audio::spawn_capture(shared.clone(), device)?;
    let control = control::spawn_control(shared.clone(), Box::new(actuator))?;

    let stopper = shared.clone();
    ctrlc::set_handler(move || {
        stopper.stop();
    })?;

    console::run(&shared);

    let _ = capture.join();
    let _ = control.join();
    daemon::release_single_instance();
    Ok(())
}

fn list_devices() -> Result<()> {
    let host = cpal::default_host();
    println!("Audio Host: {}", host.id().name());

    let default_output = host.default_output_device().and_then(|d| d.name().ok());
    println!("\nOutput Devices:");
    for device in host.output_devices()? {
        let name = device.name().unwrap_or("Unknown".to_string());
        let marker = if Some(&name) == default_output.as_ref() {
            "  <-- default"
        } else {
            ""
        };
        println!("  - {}{}", name, marker);
    }

    println!("\nMonitor Sources:");
    for device in host.input_devices()? {
        let name = device.name().unwrap_or("Unknown".to_string());
        if audio::is_monitor(&name) {
            println!("  - {}", name);
        }
    }
    Ok(())
}
