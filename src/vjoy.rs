//! vJoy backend
//!
//! Loads `vJoyInterface.dll` at runtime and drives one vJoy device.
//! Values are staged in memory and pushed with `SetAxis`/`SetBtn` on
//! `update`, so a combo step reaches the driver as one batch.

use std::collections::HashMap;

use libloading::Library;
use tracing::{debug, info, warn};

use crate::device::{Axis, JoystickDriver};
use crate::ComboPadError;

// vJoyInterface.h exports are __cdecl
type FnEnabled = unsafe extern "C" fn() -> i32;
type FnStatus = unsafe extern "C" fn(u32) -> i32;
type FnAcquire = unsafe extern "C" fn(u32) -> i32;
type FnRelinquish = unsafe extern "C" fn(u32);
type FnSetAxis = unsafe extern "C" fn(i32, u32, u32) -> i32;
type FnSetBtn = unsafe extern "C" fn(i32, u32, u8) -> i32;
type FnResetPovs = unsafe extern "C" fn(u32) -> i32;
type FnResetVjd = unsafe extern "C" fn(u32) -> i32;

/// Install locations tried in order; the last one is the DLL search path
const DLL_CANDIDATES: [&str; 3] = [
    "C:\\Program Files\\vJoy\\x64\\vJoyInterface.dll",
    "C:\\Program Files (x86)\\vJoy\\x64\\vJoyInterface.dll",
    "vJoyInterface.dll",
];

/// VjdStat values from vJoyInterface.h
const VJD_STAT_OWN: i32 = 0;
const VJD_STAT_FREE: i32 = 1;
const VJD_STAT_BUSY: i32 = 2;
const VJD_STAT_MISS: i32 = 3;

/// An acquired vJoy device
pub struct VJoyDevice {
    device_id: u32,
    set_axis: FnSetAxis,
    set_btn: FnSetBtn,
    reset_povs: FnResetPovs,
    relinquish: FnRelinquish,
    pending_axes: HashMap<Axis, i32>,
    pending_buttons: Vec<(u8, bool)>,
    _lib: Library,
}

fn load_library() -> Result<Library, ComboPadError> {
    let mut last_err = None;
    for path in DLL_CANDIDATES {
        // SAFETY: vJoyInterface.dll has no initialisation side effects beyond
        // opening the driver handle.
        match unsafe { Library::new(path) } {
            Ok(lib) => {
                debug!("Loaded {}", path);
                return Ok(lib);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(ComboPadError::VirtualDevice(format!(
        "vJoyInterface.dll not found: {}",
        last_err.map(|e| e.to_string()).unwrap_or_default()
    )))
}

fn symbol<T: Copy>(lib: &Library, name: &[u8]) -> Result<T, ComboPadError> {
    // SAFETY: every caller pairs the name with its vJoyInterface.h signature
    unsafe { lib.get::<T>(name) }.map(|sym| *sym).map_err(|e| {
        ComboPadError::VirtualDevice(format!(
            "missing export {}: {}",
            String::from_utf8_lossy(name).trim_end_matches('\0'),
            e
        ))
    })
}

impl VJoyDevice {
    /// Acquire vJoy device `device_id` and center its axes
    pub fn open(device_id: u32, neutral: i32) -> Result<Self, ComboPadError> {
        info!("Opening vJoy device {}...", device_id);

        let lib = load_library()?;
        let enabled: FnEnabled = symbol(&lib, b"vJoyEnabled\0")?;
        let status: FnStatus = symbol(&lib, b"GetVJDStatus\0")?;
        let acquire: FnAcquire = symbol(&lib, b"AcquireVJD\0")?;
        let reset_vjd: FnResetVjd = symbol(&lib, b"ResetVJD\0")?;
        // All exports resolved before AcquireVJD; only Drop relinquishes
        let set_axis: FnSetAxis = symbol(&lib, b"SetAxis\0")?;
        let set_btn: FnSetBtn = symbol(&lib, b"SetBtn\0")?;
        let reset_povs: FnResetPovs = symbol(&lib, b"ResetPovs\0")?;
        let relinquish: FnRelinquish = symbol(&lib, b"RelinquishVJD\0")?;

        // SAFETY: plain calls into the loaded driver interface
        unsafe {
            if enabled() == 0 {
                return Err(ComboPadError::VirtualDevice(
                    "vJoy driver is not enabled".to_string(),
                ));
            }

            match status(device_id) {
                VJD_STAT_OWN => debug!("vJoy device {} already owned by us", device_id),
                VJD_STAT_FREE => {
                    if acquire(device_id) == 0 {
                        return Err(ComboPadError::VirtualDevice(format!(
                            "failed to acquire vJoy device {}",
                            device_id
                        )));
                    }
                }
                VJD_STAT_BUSY => {
                    return Err(ComboPadError::VirtualDevice(format!(
                        "vJoy device {} is owned by another feeder",
                        device_id
                    )))
                }
                VJD_STAT_MISS => {
                    return Err(ComboPadError::VirtualDevice(format!(
                        "vJoy device {} is not installed or disabled",
                        device_id
                    )))
                }
                other => {
                    return Err(ComboPadError::VirtualDevice(format!(
                        "vJoy device {} in unknown state {}",
                        device_id, other
                    )))
                }
            }

            if reset_vjd(device_id) == 0 {
                warn!("ResetVJD failed for device {}", device_id);
            }
        }

        let mut device = Self {
            device_id,
            set_axis,
            set_btn,
            reset_povs,
            relinquish,
            pending_axes: HashMap::new(),
            pending_buttons: Vec::new(),
            _lib: lib,
        };

        device.set_axis(Axis::X, neutral)?;
        device.set_axis(Axis::Y, neutral)?;
        device.update()?;

        info!("vJoy device {} acquired", device_id);
        Ok(device)
    }
}

impl JoystickDriver for VJoyDevice {
    fn set_axis(&mut self, axis: Axis, value: i32) -> Result<(), ComboPadError> {
        self.pending_axes.insert(axis, value);
        Ok(())
    }

    fn set_button(&mut self, button: u8, pressed: bool) -> Result<(), ComboPadError> {
        self.pending_buttons.push((button, pressed));
        Ok(())
    }

    fn reset_povs(&mut self) -> Result<(), ComboPadError> {
        // SAFETY: device is acquired for the lifetime of self
        if unsafe { (self.reset_povs)(self.device_id) } == 0 {
            return Err(ComboPadError::Driver("ResetPovs failed".to_string()));
        }
        Ok(())
    }

    fn update(&mut self) -> Result<(), ComboPadError> {
        for (axis, value) in self.pending_axes.drain() {
            // SAFETY: device is acquired for the lifetime of self
            if unsafe { (self.set_axis)(value, self.device_id, axis.hid_usage()) } == 0 {
                return Err(ComboPadError::Driver(format!(
                    "SetAxis({:?}, {}) failed",
                    axis, value
                )));
            }
        }
        for (button, pressed) in self.pending_buttons.drain(..) {
            // SAFETY: device is acquired for the lifetime of self
            if unsafe { (self.set_btn)(i32::from(pressed), self.device_id, button) } == 0 {
                return Err(ComboPadError::Driver(format!(
                    "SetBtn({}, {}) failed",
                    button, pressed
                )));
            }
        }
        Ok(())
    }
}

impl Drop for VJoyDevice {
    fn drop(&mut self) {
        debug!("Relinquishing vJoy device {}", self.device_id);
        // SAFETY: runs before `_lib` is dropped
        unsafe { (self.relinquish)(self.device_id) };
    }
}
