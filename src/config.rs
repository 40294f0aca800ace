//! Configuration management for combo-pad

use std::time::Duration;

/// Win32 `SW_RESTORE`: activate and restore a minimized window
pub const SW_RESTORE: i32 = 9;

/// Numeric range of a joystick axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    /// Fully deflected towards left/down
    pub min: i32,

    /// Fully deflected towards right/up
    pub max: i32,

    /// Resting midpoint
    pub neutral: i32,
}

impl Default for AxisRange {
    fn default() -> Self {
        // vJoy axes report 0x1..=0x8000
        Self {
            min: 0x1,
            max: 0x8000,
            neutral: 16384,
        }
    }
}

/// Configuration for the combo controller
#[derive(Debug, Clone)]
pub struct Config {
    /// Virtual joystick device number (vJoy ids start at 1)
    pub device_id: u32,

    /// Frames per second used to convert frame delays to wall-clock time
    pub fps: u32,

    /// Exact title of the window that must receive input
    pub window_title: String,

    /// Minimum time between two real focus attempts
    pub focus_cooldown: Duration,

    /// Wait between failed window lookups
    pub focus_retry_delay: Duration,

    /// Axis extremes and midpoint
    pub axis: AxisRange,

    /// `ShowWindow` command for un-minimizing the target (Win32 only)
    pub window_show_command: i32,

    /// Enable verbose logging
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_id: 1,
            fps: 60,
            window_title: String::from("Fightcade FBNeo v0.2.97.44-55"),
            focus_cooldown: Duration::from_secs(10),
            focus_retry_delay: Duration::from_secs(1),
            axis: AxisRange::default(),
            window_show_command: SW_RESTORE,
            verbose: false,
        }
    }
}

impl Config {
    /// Use a different virtual joystick device
    pub fn with_device_id(mut self, device_id: u32) -> Self {
        self.device_id = device_id;
        self
    }

    /// Set the frame rate used for frame-based delays
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Create a new Config with custom target window
    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = title.into();
        self
    }

    pub fn with_focus_cooldown(mut self, cooldown: Duration) -> Self {
        self.focus_cooldown = cooldown;
        self
    }

    pub fn with_focus_retry_delay(mut self, delay: Duration) -> Self {
        self.focus_retry_delay = delay;
        self
    }

    pub fn with_axis_range(mut self, axis: AxisRange) -> Self {
        self.axis = axis;
        self
    }

    pub fn with_window_show_command(mut self, command: i32) -> Self {
        self.window_show_command = command;
        self
    }

    /// Enable verbose logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Wall-clock length of one frame
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }
}
