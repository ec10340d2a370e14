//! Single-instance guard.
//!
//! A PID file in the data directory marks the running instance. A file
//! naming a dead process is stale and gets taken over; a corrupt file is
//! ignored the same way.

use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;

const PID_FILENAME: &str = "levelhold.pid";

fn pid_file_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "levelhold", "levelhold")
        .map(|dirs| dirs.data_dir().join(PID_FILENAME))
}

/// Returns `Ok(true)` when this process is now the sole instance, or
/// `Ok(false)` when another live instance holds the PID file.
pub fn acquire_single_instance() -> Result<bool, String> {
    let path = pid_file_path().ok_or("Could not determine data directory")?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create data directory: {}", e))?;
    }

    if let Ok(content) = fs::read_to_string(&path) {
        if let Ok(old_pid) = content.trim().parse::<u32>() {
            if old_pid != std::process::id() && pid_alive(old_pid) {
                return Ok(false);
            }
        }
    }

    fs::write(&path, std::process::id().to_string())
        .map_err(|e| format!("Failed to write PID file: {}", e))?;
    Ok(true)
}

/// Removes the PID file if it still belongs to this process.
pub fn release_single_instance() {
    if let Some(path) = pid_file_path() {
        if let Ok(content) = fs::read_to_string(&path) {
            if content.trim() == std::process::id().to_string() {
                let _ = fs::remove_file(&path);
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn pid_alive(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{}", pid)).exists()
}

#[cfg(not(target_os = "linux"))]
fn pid_alive(_pid: u32) -> bool {
    // No portable liveness check; treat any leftover file as stale
    false
}
