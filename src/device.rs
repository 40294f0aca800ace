//! Virtual joystick abstraction
//!
//! Backends stage axis and button values and push them to the driver
//! on `update`.

use crate::config::Config;
use crate::ComboPadError;

/// Joystick axes used by combos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// HID usage id (Generic Desktop page)
    pub fn hid_usage(self) -> u32 {
        match self {
            Axis::X => 0x30,
            Axis::Y => 0x31,
        }
    }
}

/// Trait for virtual joystick implementations
pub trait JoystickDriver {
    /// Stage an axis value
    fn set_axis(&mut self, axis: Axis, value: i32) -> Result<(), ComboPadError>;

    /// Stage a button state (1-based button index)
    fn set_button(&mut self, button: u8, pressed: bool) -> Result<(), ComboPadError>;

    /// Center every POV hat
    fn reset_povs(&mut self) -> Result<(), ComboPadError>;

    /// Commit staged state to the device
    fn update(&mut self) -> Result<(), ComboPadError>;
}

impl<D: JoystickDriver + ?Sized> JoystickDriver for Box<D> {
    fn set_axis(&mut self, axis: Axis, value: i32) -> Result<(), ComboPadError> {
        (**self).set_axis(axis, value)
    }

    fn set_button(&mut self, button: u8, pressed: bool) -> Result<(), ComboPadError> {
        (**self).set_button(button, pressed)
    }

    fn reset_povs(&mut self) -> Result<(), ComboPadError> {
        (**self).reset_povs()
    }

    fn update(&mut self) -> Result<(), ComboPadError> {
        (**self).update()
    }
}

/// Open the virtual joystick for this platform
#[cfg(windows)]
pub fn create_joystick(config: &Config) -> Result<Box<dyn JoystickDriver>, ComboPadError> {
    let device = crate::vjoy::VJoyDevice::open(config.device_id, config.axis.neutral)?;
    Ok(Box::new(device))
}

/// Open the virtual joystick for this platform
#[cfg(target_os = "linux")]
pub fn create_joystick(config: &Config) -> Result<Box<dyn JoystickDriver>, ComboPadError> {
    let device = crate::uinput_joystick::UinputJoystick::open(config)?;
    Ok(Box::new(device))
}

/// Open the virtual joystick for this platform
#[cfg(not(any(windows, target_os = "linux")))]
pub fn create_joystick(_config: &Config) -> Result<Box<dyn JoystickDriver>, ComboPadError> {
    Err(ComboPadError::Unsupported(
        "no virtual joystick backend for this OS".to_string(),
    ))
}
