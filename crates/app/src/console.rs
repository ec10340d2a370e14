//! Console status display for foreground runs.

use levelhold_core::{ControlState, SharedState};
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub fn run(shared: &Arc<SharedState>) {
    // Give the capture thread a moment to find its device
    thread::sleep(Duration::from_millis(800));

    let snap = shared.snapshot();
    println!();
    println!("  levelhold  (feed-forward loudness hold)");
    println!("  ---------------------------------------------------");
    if snap.device_name.is_empty() {
        println!("  Device:    (detecting...)");
    } else {
        println!("  Device:    {}", snap.device_name);
    }
    println!("  Target:    {:+.1} LUFS", snap.target_lufs);
    println!("  Window:    {:.0} s", snap.window_seconds);
    println!("  Slew:      {:.1} dB/s", snap.slew_rate_db_per_s);
    println!("  Range:     {:.2}..{:.2} dB", snap.device_range.min_db, snap.device_range.max_db);
    println!("  Press Ctrl+C to stop");
    println!();

    while shared.is_running() {
        let s = shared.snapshot();
        let en = if s.enabled { "ON " } else { "OFF" };
        let sil = if s.is_silent { "SIL" } else { "   " };
        let hold = if s.state == ControlState::ManualOverride {
            "HOLD"
        } else {
            "    "
        };
        // What the listener effectively hears: source loudness plus the
        // attenuation currently applied at the output.
        let heard = s.source_lufs + s.current_vol_db;
        print!(
            "\r  [{}] Src:{:>+6.1}  Vol:{:>+6.1}dB  Heard:{:>+6.1}  T:{:>+5.0}  {} {}   ",
            en, s.source_lufs, s.current_vol_db, heard, s.target_lufs, sil, hold
        );
        let _ = io::stdout().flush();
        thread::sleep(Duration::from_millis(500));
    }
    println!("\n  Stopped.");
}
