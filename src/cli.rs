// SPDX-License-Identifier: GPL-3.0-only

//! Non-interactive commands
//!
//! - `headless`: control loop driven by the keypad only
//! - `snapshot`: save one camera frame
//! - `estimate`: color temperature of an image file
//! - `keypad`: print button presses

use mivonix::Session;
use mivonix::backends::camera::capture::{self, load_rgb_image};
use mivonix::backends::gpio::{ButtonEvent, HardwareInputMonitor};
use mivonix::config::Config;
use mivonix::constants::timing;
use mivonix::control::{Command, ControlEvent, LoopExit};
use mivonix::media::color_temperature;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tracing::{info, warn};

/// Run the control loop until Ctrl+C
pub fn headless(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if !config.keypad.enabled {
        warn!("Keypad disabled, headless mode has no input besides Ctrl+C");
    }

    let mut session = Session::start(config);
    if let Some(e) = session.keypad_error() {
        println!("Keypad unavailable: {}", e);
    }

    let dispatcher = session.dispatcher();
    ctrlc::set_handler(move || {
        dispatcher.dispatch(ControlEvent::Shutdown);
    })?;

    println!("Running, press Ctrl+C to quit");
    match session.run() {
        LoopExit::Shutdown => info!("Shutdown requested"),
        LoopExit::Disconnected => warn!("Control queue closed"),
    }

    session.shutdown();
    Ok(())
}

/// Capture one frame and save it as JPEG
pub fn snapshot(config: &Config, output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = mivonix::session::calibration_source(config);
    let frame = source.grab_frame()?;

    let path = match output {
        Some(path) if path.is_dir() => capture::save_snapshot(&frame, &path)?,
        Some(path) => {
            capture::save_jpeg(&frame, &path)?;
            path
        }
        None => capture::save_snapshot(&frame, &capture::default_snapshot_dir())?,
    };

    println!("Saved {}x{} frame to {}", frame.width(), frame.height(), path.display());
    Ok(())
}

/// Print the Kelvin estimate of an image
pub fn estimate(image: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let frame = load_rgb_image(image)?;
    let (avg_a, avg_b) = color_temperature::mean_chroma(&frame)?;
    let kelvin = color_temperature::kelvin_from_chroma(avg_a, avg_b);

    println!("{}: {}K (a* {:.2}, b* {:.2})", image.display(), kelvin, avg_a, avg_b);
    Ok(())
}

/// Print keypad presses until Ctrl+C
pub fn keypad(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut monitor = HardwareInputMonitor::new(config.keypad.settings())
        .with_poll_interval(config.keypad.poll_interval());

    let (tx, mut rx) = unbounded_channel();
    let press_tx = tx.clone();
    monitor.start(move |button| {
        let _ = press_tx.send(Some(button));
    })?;
    ctrlc::set_handler(move || {
        let _ = tx.send(None);
    })?;

    println!(
        "Listening on {:04x}:{:04x}, press Ctrl+C to quit",
        config.keypad.vendor_id, config.keypad.product_id
    );

    watch_presses(&mut rx, || monitor.is_running(), |line| println!("{}", line));

    let status = monitor.status();
    monitor.stop();
    println!("Keypad {}", status);
    Ok(())
}

/// Report presses until Ctrl+C (`None`) arrives or the monitor stops
fn watch_presses(
    rx: &mut UnboundedReceiver<Option<ButtonEvent>>,
    mut is_running: impl FnMut() -> bool,
    mut report: impl FnMut(String),
) {
    loop {
        match rx.try_recv() {
            Ok(Some(button)) => match Command::from_button(button) {
                Some(command) => report(format!("{} -> {}", button, command)),
                None => report(format!("{} (unmapped)", button)),
            },
            Ok(None) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) if !is_running() => break,
            Err(TryRecvError::Empty) => std::thread::sleep(timing::TERMINAL_TICK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_presses_until_interrupt() {
        let (tx, mut rx) = unbounded_channel();
        tx.send(Some(ButtonEvent { id: 3 })).unwrap();
        tx.send(Some(ButtonEvent { id: 9 })).unwrap();
        tx.send(None).unwrap();
        tx.send(Some(ButtonEvent { id: 1 })).unwrap();

        let mut lines = Vec::new();
        watch_presses(&mut rx, || true, |line| lines.push(line));
        assert_eq!(lines, vec!["button 3 -> zoom", "button 9 (unmapped)"]);
    }

    #[test]
    fn test_watch_presses_ends_when_monitor_stops() {
        let (_tx, mut rx) = unbounded_channel();
        let mut lines = Vec::new();
        watch_presses(&mut rx, || false, |line| lines.push(line));
        assert!(lines.is_empty());
    }
}
