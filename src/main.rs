//! combo-pad - Replays fighting-game combos through a virtual joystick
//!
//! Focuses the emulator window and mashes light punch, heavy punch and
//! light kick until Ctrl+C. F8 pauses and resumes.

use combo_pad::{
    create_joystick, create_window_system,
    hotkey_listener::{apply_toggles, create_pause_channel, PAUSE_KEY},
    Bindings, ComboPadError, ComboStep, Config, Controller, DelayUnit, HotkeyListener,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const FOCUS_ATTEMPTS: u32 = 3;

fn main() -> Result<(), ComboPadError> {
    let config = Config::default();

    // Initialize logging
    let level = if config.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    info!("combo-pad starting...");
    info!(
        "Config: device={}, fps={}, target='{}'",
        config.device_id, config.fps, config.window_title
    );

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        running_clone.store(false, Ordering::SeqCst);
    })
    .map_err(|e| ComboPadError::Channel(format!("Failed to set Ctrl+C handler: {}", e)))?;

    let joystick = match create_joystick(&config) {
        Ok(joystick) => joystick,
        Err(ComboPadError::PermissionDenied) => {
            error!("Permission denied. Please allow access to /dev/uinput:");
            error!("  sudo usermod -aG input $USER");
            error!("Then logout and login again.");
            return Err(ComboPadError::PermissionDenied);
        }
        Err(e) => return Err(e),
    };
    let windows = create_window_system(&config)?;

    let bindings = Bindings::fightcade(&config.axis);
    let mut controller = Controller::new(config, bindings, joystick, windows);

    if !controller.focus_window(FOCUS_ATTEMPTS) {
        warn!(
            "'{}' not focused, inputs may go elsewhere",
            controller.window_title()
        );
    }

    let (sender, receiver) = create_pause_channel();
    let _listener_handle = HotkeyListener::new(PAUSE_KEY, sender).start();

    let combo = [
        ComboStep::new("j", 0.0),
        ComboStep::new("k", 0.0),
        ComboStep::new("l", 0.0),
    ];

    info!("Mashing - press {:?} to pause, Ctrl+C to exit", PAUSE_KEY);

    let mut paused = false;
    while running.load(Ordering::SeqCst) {
        let now_paused = apply_toggles(&receiver, paused);
        if now_paused != paused {
            info!("{}", if now_paused { "Paused" } else { "Resumed" });
            paused = now_paused;
        }
        if paused {
            thread::sleep(Duration::from_millis(100));
            continue;
        }

        // No-op while the focus cooldown is active
        controller.focus_window(FOCUS_ATTEMPTS);
        controller.run_combo(&combo, DelayUnit::Immediate);
    }

    info!(
        "combo-pad shutting down after {} inputs in {:.1}s",
        controller.dispatch_count(),
        controller.time_in_seconds()
    );

    Ok(())
}
