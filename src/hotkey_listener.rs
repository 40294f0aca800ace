//! Global pause hotkey using rdev
//!
//! Combos run on the main thread; this listener only reports key
//! presses so the main loop can pause and resume between combos.

use rdev::{listen, Event, EventType, Key};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, error, info};

/// Key that toggles pause
pub const PAUSE_KEY: Key = Key::F8;

/// Event sent when the pause hotkey is pressed
#[derive(Debug, Clone)]
pub struct PauseToggle {
    /// Timestamp when the key was detected
    pub timestamp: std::time::Instant,
}

/// Listener that captures the global pause hotkey
pub struct HotkeyListener {
    key: Key,
    sender: mpsc::Sender<PauseToggle>,
}

impl HotkeyListener {
    /// Create a new HotkeyListener with the given channel sender
    pub fn new(key: Key, sender: mpsc::Sender<PauseToggle>) -> Self {
        Self { key, sender }
    }

    /// Start listening for key presses in a background thread
    ///
    /// Returns a JoinHandle for the listener thread.
    pub fn start(self) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            info!("Hotkey listener started ({:?} toggles pause)", self.key);

            let key = self.key;
            let sender = self.sender;

            let callback = move |event: Event| {
                if is_toggle(&event.event_type, key) {
                    debug!("Pause hotkey pressed");

                    let toggle = PauseToggle {
                        timestamp: std::time::Instant::now(),
                    };
                    if let Err(e) = sender.send(toggle) {
                        error!("Failed to send pause event: {}", e);
                    }
                }
            };

            if let Err(e) = listen(callback) {
                error!("Error in hotkey listener: {:?}", e);
            }
        })
    }
}

fn is_toggle(event: &EventType, key: Key) -> bool {
    matches!(event, EventType::KeyPress(pressed) if *pressed == key)
}

/// Create a channel for pause events and return both ends
pub fn create_pause_channel() -> (mpsc::Sender<PauseToggle>, mpsc::Receiver<PauseToggle>) {
    mpsc::channel()
}

/// Drain pending toggles and return the new paused state
pub fn apply_toggles(receiver: &mpsc::Receiver<PauseToggle>, mut paused: bool) -> bool {
    while let Ok(toggle) = receiver.try_recv() {
        paused = !paused;
        debug!(
            "Pause toggled to {} (latency: {:?})",
            paused,
            toggle.timestamp.elapsed()
        );
    }
    paused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_press_of_hotkey_toggles() {
        assert!(is_toggle(&EventType::KeyPress(Key::F8), Key::F8));
        assert!(!is_toggle(&EventType::KeyRelease(Key::F8), Key::F8));
        assert!(!is_toggle(&EventType::KeyPress(Key::KeyJ), Key::F8));
    }

    #[test]
    fn toggles_flip_pause_state() {
        let (sender, receiver) = create_pause_channel();
        assert!(!apply_toggles(&receiver, false));

        sender
            .send(PauseToggle {
                timestamp: std::time::Instant::now(),
            })
            .unwrap();
        assert!(apply_toggles(&receiver, false));

        for _ in 0..2 {
            sender
                .send(PauseToggle {
                    timestamp: std::time::Instant::now(),
                })
                .unwrap();
        }
        assert!(apply_toggles(&receiver, true));
    }
}
