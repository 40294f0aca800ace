//! Virtual joystick via uinput
//!
//! Creates a kernel-level joystick with X/Y axes, one hat and up to 16
//! buttons. Emulators that read evdev/SDL joysticks see it like real
//! hardware. Requires write access to /dev/uinput.

use std::io;

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AbsInfo, AbsoluteAxisType, AttributeSet, EventType, InputEvent, Key, UinputAbsSetup};
use tracing::{error, info};

use crate::config::Config;
use crate::device::{Axis, JoystickDriver};
use crate::ComboPadError;

/// BTN_TRIGGER..=BTN_DEAD
const MAX_BUTTONS: u8 = 16;

fn button_key(button: u8) -> Option<Key> {
    if (1..=MAX_BUTTONS).contains(&button) {
        Some(Key::new(Key::BTN_TRIGGER.code() + u16::from(button - 1)))
    } else {
        None
    }
}

fn abs_code(axis: Axis) -> AbsoluteAxisType {
    match axis {
        Axis::X => AbsoluteAxisType::ABS_X,
        Axis::Y => AbsoluteAxisType::ABS_Y,
    }
}

/// uinput-backed joystick
pub struct UinputJoystick {
    device: VirtualDevice,
    pending: Vec<InputEvent>,
}

fn map_io_error(e: io::Error) -> ComboPadError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        ComboPadError::PermissionDenied
    } else {
        ComboPadError::VirtualDevice(e.to_string())
    }
}

impl UinputJoystick {
    /// Create the virtual joystick
    pub fn open(config: &Config) -> Result<Self, ComboPadError> {
        info!("Creating uinput joystick {}...", config.device_id);

        let axis = config.axis;
        let stick = AbsInfo::new(axis.neutral, axis.min, axis.max, 0, 0, 0);
        let hat = AbsInfo::new(0, -1, 1, 0, 0, 0);

        let mut keys = AttributeSet::<Key>::new();
        for button in 1..=MAX_BUTTONS {
            if let Some(key) = button_key(button) {
                keys.insert(key);
            }
        }

        let name = format!("combo-pad virtual joystick {}", config.device_id);
        let device = VirtualDeviceBuilder::new()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::PermissionDenied {
                    // SAFETY: geteuid has no preconditions and cannot fail
                    let uid = unsafe { libc::geteuid() };
                    error!("Cannot open /dev/uinput as uid {}", uid);
                }
                map_io_error(e)
            })?
            .name(&name)
            .with_keys(&keys)
            .map_err(map_io_error)?
            .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisType::ABS_X, stick))
            .map_err(map_io_error)?
            .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisType::ABS_Y, stick))
            .map_err(map_io_error)?
            .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisType::ABS_HAT0X, hat))
            .map_err(map_io_error)?
            .with_absolute_axis(&UinputAbsSetup::new(AbsoluteAxisType::ABS_HAT0Y, hat))
            .map_err(map_io_error)?
            .build()
            .map_err(map_io_error)?;

        info!("Virtual joystick '{}' created", name);
        Ok(Self {
            device,
            pending: Vec::new(),
        })
    }
}

impl JoystickDriver for UinputJoystick {
    fn set_axis(&mut self, axis: Axis, value: i32) -> Result<(), ComboPadError> {
        self.pending
            .push(InputEvent::new(EventType::ABSOLUTE, abs_code(axis).0, value));
        Ok(())
    }

    fn set_button(&mut self, button: u8, pressed: bool) -> Result<(), ComboPadError> {
        let key = button_key(button).ok_or_else(|| {
            ComboPadError::Driver(format!(
                "button {} out of range 1..={}",
                button, MAX_BUTTONS
            ))
        })?;
        self.pending
            .push(InputEvent::new(EventType::KEY, key.code(), i32::from(pressed)));
        Ok(())
    }

    fn reset_povs(&mut self) -> Result<(), ComboPadError> {
        self.pending.push(InputEvent::new(
            EventType::ABSOLUTE,
            AbsoluteAxisType::ABS_HAT0X.0,
            0,
        ));
        self.pending.push(InputEvent::new(
            EventType::ABSOLUTE,
            AbsoluteAxisType::ABS_HAT0Y.0,
            0,
        ));
        Ok(())
    }

    fn update(&mut self) -> Result<(), ComboPadError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        // emit() terminates the batch with SYN_REPORT
        let events = std::mem::take(&mut self.pending);
        self.device
            .emit(&events)
            .map_err(|e| ComboPadError::Driver(format!("uinput emit failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons_map_onto_joystick_range() {
        assert_eq!(button_key(1), Some(Key::BTN_TRIGGER));
        assert_eq!(button_key(16).map(|k| k.code()), Some(0x12f));
        assert_eq!(button_key(0), None);
        assert_eq!(button_key(17), None);
    }
}
