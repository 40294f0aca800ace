//! Combo controller
//!
//! Translates input symbols into virtual joystick state. Every action is
//! a pulse: directions and buttons are applied, committed, and put back
//! to neutral/released before the call returns. Holding a direction
//! across steps is not supported.

use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::bindings::{Binding, Bindings};
use crate::config::Config;
use crate::device::{Axis, JoystickDriver};
use crate::window_focus::{WindowFocuser, WindowSystem};
use crate::ComboPadError;

/// How a step delay is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayUnit {
    Seconds,
    /// Converted using `Config::fps`
    Frames,
    /// Do not wait at all
    Immediate,
}

/// One entry of a combo
#[derive(Debug, Clone, PartialEq)]
pub struct ComboStep {
    pub symbol: String,
    pub delay: f64,
}

impl ComboStep {
    pub fn new(symbol: impl Into<String>, delay: f64) -> Self {
        Self {
            symbol: symbol.into(),
            delay,
        }
    }
}

/// Drives a virtual joystick from symbolic inputs
pub struct Controller<D: JoystickDriver, W: WindowSystem> {
    config: Config,
    bindings: Bindings,
    driver: D,
    focuser: WindowFocuser<W>,
    current_x: i32,
    current_y: i32,
    button_states: BTreeMap<u8, bool>,
    started: Instant,
    frame_counter: f64,
    dispatches: u64,
}

impl<D: JoystickDriver, W: WindowSystem> Controller<D, W> {
    pub fn new(config: Config, bindings: Bindings, driver: D, windows: W) -> Self {
        let focuser = WindowFocuser::new(
            windows,
            config.window_title.clone(),
            config.focus_cooldown,
            config.focus_retry_delay,
        );
        let button_states = bindings.button_ids().into_iter().map(|id| (id, false)).collect();
        let neutral = config.axis.neutral;

        Self {
            config,
            bindings,
            driver,
            focuser,
            current_x: neutral,
            current_y: neutral,
            button_states,
            started: Instant::now(),
            frame_counter: 0.0,
            dispatches: 0,
        }
    }

    /// Make sure the target window has focus; see [`WindowFocuser::focus`]
    pub fn focus_window(&mut self, max_attempts: u32) -> bool {
        self.focuser.focus(max_attempts)
    }

    /// Title of the window inputs are meant for
    pub fn window_title(&self) -> &str {
        self.focuser.title()
    }

    /// Tap a direction, or center the stick if `symbol` is not a direction
    pub fn set_direction(&mut self, symbol: &str) -> Result<(), ComboPadError> {
        let result = self.tap_direction(symbol);
        if let Err(e) = &result {
            error!("vJoy error on direction {}: {}", symbol, e);
        }
        result
    }

    fn tap_direction(&mut self, symbol: &str) -> Result<(), ComboPadError> {
        let neutral = self.config.axis.neutral;
        self.driver.reset_povs()?;

        match self.bindings.direction(symbol) {
            Some((Axis::X, value)) => {
                self.driver.set_axis(Axis::X, value)?;
                self.current_x = value;
            }
            Some((Axis::Y, value)) => {
                self.driver.set_axis(Axis::Y, value)?;
                self.current_y = value;
            }
            None => {
                self.driver.set_axis(Axis::X, neutral)?;
                self.driver.set_axis(Axis::Y, neutral)?;
                self.current_x = neutral;
                self.current_y = neutral;
            }
        }
        let commit = self.driver.update();

        // Back to neutral even if the commit failed
        self.current_x = neutral;
        self.current_y = neutral;
        self.driver.set_axis(Axis::X, neutral)?;
        self.driver.set_axis(Axis::Y, neutral)?;
        self.driver.update()?;

        debug!("Tapped direction {}", symbol);
        commit
    }

    /// Pulse a button: press, commit, release, commit
    ///
    /// `duration` is only reported; the press is never held.
    pub fn press_button(&mut self, symbol: &str, duration: Duration) -> Result<(), ComboPadError> {
        let Some(button) = self.bindings.button(symbol) else {
            error!("Button {} not mapped!", symbol);
            return Err(ComboPadError::UnmappedSymbol(symbol.to_string()));
        };

        let result = self.pulse_button(button);
        match &result {
            Ok(()) => debug!("Pressed button {} (ID: {}) for {:?}", symbol, button, duration),
            Err(e) => error!("vJoy error on button {}: {}", symbol, e),
        }
        result
    }

    fn pulse_button(&mut self, button: u8) -> Result<(), ComboPadError> {
        self.driver.set_button(button, true)?;
        self.button_states.insert(button, true);
        let commit = self.driver.update();

        // Releasing is essential to avoid stuck inputs
        self.button_states.insert(button, false);
        self.driver.set_button(button, false)?;
        self.driver.update()?;
        commit
    }

    /// Play `steps` in order, sleeping each step's delay afterwards
    ///
    /// Failures are logged and the combo continues with the next step.
    pub fn run_combo(&mut self, steps: &[ComboStep], unit: DelayUnit) {
        for step in steps {
            match self.bindings.lookup(&step.symbol) {
                Some(Binding::Direction { .. }) => {
                    self.dispatches += 1;
                    let _ = self.set_direction(&step.symbol);
                }
                Some(Binding::Button(_)) => {
                    self.dispatches += 1;
                    let _ = self.press_button(&step.symbol, Duration::from_millis(50));
                }
                None => error!("{} is not bound or doesn't exist", step.symbol),
            }
            self.sleep(step.delay, unit);
        }
    }

    /// Blocking wait of `delay` in `unit`
    pub fn sleep(&mut self, delay: f64, unit: DelayUnit) {
        let seconds = match unit {
            DelayUnit::Seconds => delay,
            DelayUnit::Frames => delay * self.config.frame_duration().as_secs_f64(),
            DelayUnit::Immediate => 0.0,
        };
        if seconds > 0.0 {
            match Duration::try_from_secs_f64(seconds) {
                Ok(wait) => thread::sleep(wait),
                Err(e) => error!("Cannot wait {} {:?}: {}", delay, unit, e),
            }
        }
        self.frame_counter += delay;
    }

    /// Current X axis value as last written
    pub fn current_x(&self) -> i32 {
        self.current_x
    }

    pub fn current_y(&self) -> i32 {
        self.current_y
    }

    /// Last known state of `button`, `None` if it is not bound
    pub fn button_state(&self, button: u8) -> Option<bool> {
        self.button_states.get(&button).copied()
    }

    /// Sum of all delays slept so far
    pub fn frames_passed(&self) -> f64 {
        self.frame_counter
    }

    pub fn time_in_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Number of steps that reached the device
    pub fn dispatch_count(&self) -> u64 {
        self.dispatches
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window_focus::WindowHandle;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Axis(Axis, i32),
        Button(u8, bool),
        ResetPovs,
        Update,
    }

    /// Records driver calls and the committed device state
    #[derive(Default)]
    struct RecordingDriver {
        calls: Vec<Call>,
        staged_x: Option<i32>,
        staged_y: Option<i32>,
        staged_buttons: Vec<(u8, bool)>,
        x: i32,
        y: i32,
        buttons: BTreeMap<u8, bool>,
        fail_updates: bool,
    }

    impl JoystickDriver for RecordingDriver {
        fn set_axis(&mut self, axis: Axis, value: i32) -> Result<(), ComboPadError> {
            self.calls.push(Call::Axis(axis, value));
            match axis {
                Axis::X => self.staged_x = Some(value),
                Axis::Y => self.staged_y = Some(value),
            }
            Ok(())
        }

        fn set_button(&mut self, button: u8, pressed: bool) -> Result<(), ComboPadError> {
            self.calls.push(Call::Button(button, pressed));
            self.staged_buttons.push((button, pressed));
            Ok(())
        }

        fn reset_povs(&mut self) -> Result<(), ComboPadError> {
            self.calls.push(Call::ResetPovs);
            Ok(())
        }

        fn update(&mut self) -> Result<(), ComboPadError> {
            self.calls.push(Call::Update);
            if self.fail_updates {
                return Err(ComboPadError::Driver("device unplugged".to_string()));
            }
            if let Some(x) = self.staged_x.take() {
                self.x = x;
            }
            if let Some(y) = self.staged_y.take() {
                self.y = y;
            }
            for (button, pressed) in self.staged_buttons.drain(..) {
                self.buttons.insert(button, pressed);
            }
            Ok(())
        }
    }

    struct NoWindows;

    impl WindowSystem for NoWindows {
        fn find_window(&self, _title: &str) -> Result<Option<WindowHandle>, ComboPadError> {
            Ok(None)
        }

        fn restore(&self, _window: WindowHandle) -> Result<(), ComboPadError> {
            Ok(())
        }

        fn bring_to_foreground(&self, _window: WindowHandle) -> Result<(), ComboPadError> {
            Ok(())
        }
    }

    fn controller() -> Controller<RecordingDriver, NoWindows> {
        let config = Config::default().with_focus_retry_delay(Duration::ZERO);
        let bindings = Bindings::fightcade(&config.axis);
        let driver = RecordingDriver {
            x: config.axis.neutral,
            y: config.axis.neutral,
            ..Default::default()
        };
        Controller::new(config, bindings, driver, NoWindows)
    }

    /// Captures formatted log output
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogCapture {
        type Writer = LogCapture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let capture = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, capture.contents())
    }

    #[test]
    fn directions_return_to_neutral() {
        let mut controller = controller();
        let neutral = controller.config().axis.neutral;
        let symbols: Vec<String> = controller
            .bindings()
            .direction_symbols()
            .map(str::to_string)
            .collect();
        assert_eq!(symbols.len(), 4);

        for symbol in symbols {
            controller.set_direction(&symbol).unwrap();
            assert_eq!(controller.current_x(), neutral, "{}", symbol);
            assert_eq!(controller.current_y(), neutral, "{}", symbol);
            assert_eq!(controller.driver().x, neutral, "{}", symbol);
            assert_eq!(controller.driver().y, neutral, "{}", symbol);
        }
    }

    #[test]
    fn direction_is_committed_before_release() {
        let mut controller = controller();
        controller.set_direction("d").unwrap();

        let max = controller.config().axis.max;
        let neutral = controller.config().axis.neutral;
        assert_eq!(
            controller.driver().calls,
            vec![
                Call::ResetPovs,
                Call::Axis(Axis::X, max),
                Call::Update,
                Call::Axis(Axis::X, neutral),
                Call::Axis(Axis::Y, neutral),
                Call::Update,
            ]
        );
    }

    #[test]
    fn unknown_direction_centers_stick() {
        let mut controller = controller();
        controller.set_direction("q").unwrap();

        let neutral = controller.config().axis.neutral;
        assert_eq!(controller.driver().calls[1], Call::Axis(Axis::X, neutral));
        assert_eq!(controller.driver().calls[2], Call::Axis(Axis::Y, neutral));
    }

    #[test]
    fn buttons_are_released_after_press() {
        let mut controller = controller();
        let symbols: Vec<String> = controller
            .bindings()
            .button_symbols()
            .map(str::to_string)
            .collect();

        for symbol in symbols {
            controller
                .press_button(&symbol, Duration::from_millis(50))
                .unwrap();
            let id = controller.bindings().button(&symbol).unwrap();
            assert_eq!(controller.button_state(id), Some(false), "{}", symbol);
            assert_eq!(controller.driver().buttons.get(&id), Some(&false));
        }
    }

    #[test]
    fn button_press_is_a_pulse() {
        let mut controller = controller();
        controller.press_button("k", Duration::ZERO).unwrap();
        assert_eq!(
            controller.driver().calls,
            vec![
                Call::Button(2, true),
                Call::Update,
                Call::Button(2, false),
                Call::Update,
            ]
        );
    }

    #[test]
    fn unmapped_button_touches_nothing_and_logs() {
        let mut controller = controller();
        let (result, logs) =
            with_captured_logs(|| controller.press_button("z", Duration::from_millis(50)));

        assert!(matches!(result, Err(ComboPadError::UnmappedSymbol(s)) if s == "z"));
        assert!(controller.driver().calls.is_empty());
        assert!(logs.contains("ERROR"), "{}", logs);
        assert!(logs.contains("Button z not mapped!"), "{}", logs);
    }

    #[test]
    fn driver_failure_still_releases() {
        let mut controller = controller();
        controller.driver.fail_updates = true;

        let (result, logs) = with_captured_logs(|| controller.press_button("j", Duration::ZERO));
        assert!(matches!(result, Err(ComboPadError::Driver(_))));
        assert_eq!(controller.button_state(1), Some(false));
        assert!(logs.contains("vJoy error on button j"), "{}", logs);
    }

    #[test]
    fn direction_driver_failure_returns_to_neutral() {
        let mut controller = controller();
        controller.driver.fail_updates = true;
        let neutral = controller.config().axis.neutral;

        let (result, logs) = with_captured_logs(|| controller.set_direction("a"));
        assert!(matches!(result, Err(ComboPadError::Driver(_))));
        assert_eq!(controller.current_x(), neutral);
        assert_eq!(controller.current_y(), neutral);
        assert!(logs.contains("vJoy error on direction a"), "{}", logs);
    }

    #[test]
    fn oversized_delay_is_logged_not_fatal() {
        let mut controller = controller();
        let ((), logs) = with_captured_logs(|| controller.sleep(1e30, DelayUnit::Seconds));
        assert!(logs.contains("Cannot wait"), "{}", logs);
        assert_eq!(controller.frames_passed(), 1e30);

        let steps = vec![ComboStep::new("j", 1e30), ComboStep::new("k", 0.0)];
        controller.run_combo(&steps, DelayUnit::Seconds);
        assert_eq!(controller.dispatch_count(), 2);
    }

    #[test]
    fn combo_dispatches_in_order() {
        let mut controller = controller();
        let steps = vec![
            ComboStep::new("s", 0.0),
            ComboStep::new("d", 0.0),
            ComboStep::new("j", 0.0),
            ComboStep::new("l", 0.0),
        ];
        controller.run_combo(&steps, DelayUnit::Seconds);

        assert_eq!(controller.dispatch_count(), 4);
        let pressed: Vec<&Call> = controller
            .driver()
            .calls
            .iter()
            .filter(|c| {
                matches!(c, Call::Button(_, true)) || matches!(c, Call::Axis(_, v) if *v != 16384)
            })
            .collect();
        assert_eq!(
            pressed,
            vec![
                &Call::Axis(Axis::Y, 0x1),
                &Call::Axis(Axis::X, 0x8000),
                &Call::Button(1, true),
                &Call::Button(3, true),
            ]
        );
    }

    #[test]
    fn combo_skips_unbound_steps_and_continues() {
        let mut controller = controller();
        let steps = vec![
            ComboStep::new("j", 0.0),
            ComboStep::new("?", 0.0),
            ComboStep::new("k", 0.0),
        ];
        let ((), logs) = with_captured_logs(|| controller.run_combo(&steps, DelayUnit::Immediate));

        assert_eq!(controller.dispatch_count(), 2);
        assert!(logs.contains("? is not bound"), "{}", logs);
        assert_eq!(controller.driver().buttons.get(&2), Some(&false));
    }

    #[test]
    fn combo_continues_after_driver_errors() {
        let mut controller = controller();
        controller.driver.fail_updates = true;
        let steps = vec![ComboStep::new("j", 0.0), ComboStep::new("a", 0.0)];
        controller.run_combo(&steps, DelayUnit::Immediate);
        assert_eq!(controller.dispatch_count(), 2);
    }

    #[test]
    fn frame_delays_use_fps() {
        let mut controller = controller();
        let start = Instant::now();
        controller.sleep(3.0, DelayUnit::Frames);
        assert!(start.elapsed() >= Duration::from_millis(49));
        assert_eq!(controller.frames_passed(), 3.0);
    }

    #[test]
    fn immediate_unit_never_waits() {
        let mut controller = controller();
        let start = Instant::now();
        controller.sleep(1000.0, DelayUnit::Immediate);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(controller.frames_passed(), 1000.0);
    }

    #[test]
    fn focus_failure_reports_false() {
        let mut controller = controller();
        assert!(!controller.focus_window(2));
        assert_eq!(controller.window_title(), "Fightcade FBNeo v0.2.97.44-55");
    }
}
