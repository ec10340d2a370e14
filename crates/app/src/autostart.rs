//! Login registration.
//!
//! Each platform gets its native mechanism: an XDG autostart entry on
//! Linux, an HKCU Run value on Windows, a LaunchAgent on macOS. All three
//! register the installed binary with the `run` subcommand; the file bodies
//! come from pure builders so their content stays testable.

use anyhow::{Context, Result};

#[cfg(any(target_os = "linux", target_os = "macos", test))]
use std::path::Path;

#[cfg(any(target_os = "linux", target_os = "macos"))]
use std::fs;
#[cfg(any(target_os = "linux", target_os = "macos"))]
use std::path::PathBuf;

#[cfg(target_os = "linux")]
const DESKTOP_FILENAME: &str = "levelhold.desktop";
#[cfg(target_os = "windows")]
const RUN_VALUE_NAME: &str = "Levelhold";
#[cfg(any(target_os = "macos", test))]
const LAUNCH_AGENT_LABEL: &str = "com.levelhold";

/// Registers the controller to run at login.
pub fn enable_autostart() -> Result<()> {
    let exe = std::env::current_exe().context("Could not determine executable path")?;

    #[cfg(target_os = "linux")]
    {
        let dir = autostart_dir()?;
        fs::create_dir_all(&dir).context("Failed to create autostart directory")?;
        fs::write(dir.join(DESKTOP_FILENAME), desktop_entry(&exe))
            .context("Failed to write autostart entry")?;
        Ok(())
    }

    #[cfg(target_os = "windows")]
    {
        let out = std::process::Command::new("reg")
            .args([
                "add",
                r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run",
                "/v",
                RUN_VALUE_NAME,
                "/t",
                "REG_SZ",
                "/d",
                &format!("{} run", exe.display()),
                "/f",
            ])
            .output()
            .context("Failed to run reg")?;
        if !out.status.success() {
            anyhow::bail!(
                "reg add failed: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(())
    }

    #[cfg(target_os = "macos")]
    {
        let dir = launch_agents_dir()?;
        fs::create_dir_all(&dir).context("Failed to create LaunchAgents directory")?;
        fs::write(
            dir.join(format!("{}.plist", LAUNCH_AGENT_LABEL)),
            launch_agent_plist(&exe),
        )
        .context("Failed to write LaunchAgent")?;
        Ok(())
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        let _ = exe;
        anyhow::bail!("Autostart is not supported on this platform")
    }
}

/// Removes the login registration. Already-absent entries are not an error.
pub fn disable_autostart() -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        let path = autostart_dir()?.join(DESKTOP_FILENAME);
        if path.exists() {
            fs::remove_file(&path).context("Failed to remove autostart entry")?;
        }
        Ok(())
    }

    #[cfg(target_os = "windows")]
    {
        // reg delete exits nonzero when the value is missing; that is fine
        let _ = std::process::Command::new("reg")
            .args([
                "delete",
                r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run",
                "/v",
                RUN_VALUE_NAME,
                "/f",
            ])
            .output()
            .context("Failed to run reg")?;
        Ok(())
    }

    #[cfg(target_os = "macos")]
    {
        let path = launch_agents_dir()?.join(format!("{}.plist", LAUNCH_AGENT_LABEL));
        if path.exists() {
            fs::remove_file(&path).context("Failed to remove LaunchAgent")?;
        }
        Ok(())
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        anyhow::bail!("Autostart is not supported on this platform")
    }
}

#[cfg(target_os = "linux")]
fn autostart_dir() -> Result<PathBuf> {
    let config = dirs::config_dir().context("Could not find the user config directory")?;
    Ok(config.join("autostart"))
}

#[cfg(target_os = "macos")]
fn launch_agents_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find the home directory")?;
    Ok(home.join("Library/LaunchAgents"))
}

/// XDG desktop entry launching `<exe> run` at login.
#[cfg(any(target_os = "linux", test))]
fn desktop_entry(exe: &Path) -> String {
    [
        "[Desktop Entry]".to_string(),
        "Type=Application".to_string(),
        "Name=levelhold".to_string(),
        "Comment=Keeps perceived loudness constant".to_string(),
        format!("Exec={} run", exe.display()),
        "Terminal=false".to_string(),
        "StartupNotify=false".to_string(),
        "Categories=AudioVideo;Audio;".to_string(),
        String::new(),
    ]
    .join("\n")
}

/// LaunchAgent plist launching `<exe> run` at login.
#[cfg(any(target_os = "macos", test))]
fn launch_agent_plist(exe: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{exe}</string>
        <string>run</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
        label = LAUNCH_AGENT_LABEL,
        exe = exe.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_entry_runs_the_binary() {
        let entry = desktop_entry(Path::new("/usr/local/bin/levelhold"));
        assert!(entry.starts_with("[Desktop Entry]\n"));
        assert!(entry.contains("Exec=/usr/local/bin/levelhold run\n"));
        assert!(entry.contains("Name=levelhold\n"));
        assert!(entry.ends_with('\n'));
    }

    #[test]
    fn test_launch_agent_labels_and_arguments() {
        let plist = launch_agent_plist(Path::new("/opt/levelhold/levelhold"));
        assert!(plist.contains("<string>com.levelhold</string>"));
        assert!(plist.contains("<string>/opt/levelhold/levelhold</string>"));
        assert!(plist.contains("<string>run</string>"));
        assert!(plist.contains("<key>RunAtLoad</key>"));
    }
}
