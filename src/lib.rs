//! combo-pad - Replays fighting-game combos through a virtual joystick
//!
//! This library provides components for:
//! - Binding tables (input symbol to axis value or button id)
//! - Virtual joystick backends (vJoy on Windows, uinput on Linux)
//! - Window focus (find the emulator window by title and raise it)
//! - The combo controller that ties them together

pub mod bindings;
pub mod config;
pub mod controller;
pub mod device;
pub mod hotkey_listener;
pub mod window_focus;

#[cfg(windows)]
pub mod vjoy;

#[cfg(target_os = "linux")]
pub mod uinput_joystick;

pub use bindings::{Binding, Bindings};
pub use config::{AxisRange, Config};
pub use controller::{ComboStep, Controller, DelayUnit};
pub use device::{create_joystick, Axis, JoystickDriver};
pub use hotkey_listener::HotkeyListener;
pub use window_focus::{create_window_system, WindowFocuser, WindowHandle, WindowSystem};

use thiserror::Error;

/// Main error type for combo-pad
#[derive(Error, Debug)]
pub enum ComboPadError {
    #[error("Failed to open virtual joystick: {0}")]
    VirtualDevice(String),

    #[error("Virtual joystick call failed: {0}")]
    Driver(String),

    #[error("Failed to focus window: {0}")]
    FocusDetection(String),

    #[error("Input '{0}' is not bound")]
    UnmappedSymbol(String),

    #[error("Permission denied - add user to 'input' group or run as root")]
    PermissionDenied,

    #[error("Not supported on this platform: {0}")]
    Unsupported(String),

    #[error("Channel error: {0}")]
    Channel(String),
}
