//! Window lookup and focus
//!
//! Finds the emulator window by exact title and brings it to the
//! foreground before inputs are sent. Win32 on Windows, X11 (EWMH) on
//! Linux; XWayland windows are covered by the X11 path.

use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::ComboPadError;

/// Opaque OS window identifier (HWND or X11 window id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// Trait for OS window APIs
pub trait WindowSystem {
    /// Look up a top-level window whose title equals `title`
    fn find_window(&self, title: &str) -> Result<Option<WindowHandle>, ComboPadError>;

    /// Un-minimize the window
    fn restore(&self, window: WindowHandle) -> Result<(), ComboPadError>;

    /// Give the window input focus
    fn bring_to_foreground(&self, window: WindowHandle) -> Result<(), ComboPadError>;
}

impl<W: WindowSystem + ?Sized> WindowSystem for Box<W> {
    fn find_window(&self, title: &str) -> Result<Option<WindowHandle>, ComboPadError> {
        (**self).find_window(title)
    }

    fn restore(&self, window: WindowHandle) -> Result<(), ComboPadError> {
        (**self).restore(window)
    }

    fn bring_to_foreground(&self, window: WindowHandle) -> Result<(), ComboPadError> {
        (**self).bring_to_foreground(window)
    }
}

/// Focuses the target window with bounded retries and a cooldown
///
/// Within `cooldown` of the last success, `focus` returns true without
/// touching the OS.
pub struct WindowFocuser<W: WindowSystem> {
    system: W,
    title: String,
    cooldown: Duration,
    retry_delay: Duration,
    last_focus: Option<Instant>,
}

impl<W: WindowSystem> WindowFocuser<W> {
    pub fn new(
        system: W,
        title: impl Into<String>,
        cooldown: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            system,
            title: title.into(),
            cooldown,
            retry_delay,
            last_focus: None,
        }
    }

    /// Find, restore and raise the target window
    pub fn focus(&mut self, max_attempts: u32) -> bool {
        if let Some(last) = self.last_focus {
            if last.elapsed() < self.cooldown {
                debug!("Focus cooldown active, skipping lookup");
                return true;
            }
        }

        for attempt in 1..=max_attempts {
            match self.try_focus() {
                Ok(true) => {
                    self.last_focus = Some(Instant::now());
                    info!("Window found: '{}'", self.title);
                    return true;
                }
                Ok(false) => {
                    warn!(
                        "Window '{}' not found (attempt {}/{})",
                        self.title, attempt, max_attempts
                    );
                }
                Err(e) => error!("Focus error: {}", e),
            }
            thread::sleep(self.retry_delay);
        }
        false
    }

    fn try_focus(&self) -> Result<bool, ComboPadError> {
        let Some(window) = self.system.find_window(&self.title)? else {
            return Ok(false);
        };
        self.system.restore(window)?;
        self.system.bring_to_foreground(window)?;
        Ok(true)
    }

    /// Time of the last successful focus
    pub fn last_focus(&self) -> Option<Instant> {
        self.last_focus
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn system(&self) -> &W {
        &self.system
    }
}

/// Win32 window API
#[cfg(windows)]
pub struct Win32Windows {
    /// `ShowWindow` command used to un-minimize
    show_command: i32,
}

#[cfg(windows)]
impl Win32Windows {
    pub fn new(show_command: i32) -> Self {
        Self { show_command }
    }
}

#[cfg(windows)]
impl WindowSystem for Win32Windows {
    fn find_window(&self, title: &str) -> Result<Option<WindowHandle>, ComboPadError> {
        use windows_sys::Win32::UI::WindowsAndMessaging::FindWindowW;

        let wide: Vec<u16> = title.encode_utf16().chain(std::iter::once(0)).collect();
        // SAFETY: `wide` is NUL-terminated and outlives the call
        let hwnd = unsafe { FindWindowW(std::ptr::null(), wide.as_ptr()) };
        if hwnd.is_null() {
            Ok(None)
        } else {
            Ok(Some(WindowHandle(hwnd as isize)))
        }
    }

    fn restore(&self, window: WindowHandle) -> Result<(), ComboPadError> {
        use windows_sys::Win32::UI::WindowsAndMessaging::ShowWindow;

        // Return value is the previous visibility, not an error flag
        // SAFETY: a stale HWND is rejected by the OS, not dereferenced
        unsafe { ShowWindow(window.0 as _, self.show_command) };
        Ok(())
    }

    fn bring_to_foreground(&self, window: WindowHandle) -> Result<(), ComboPadError> {
        use windows_sys::Win32::UI::WindowsAndMessaging::SetForegroundWindow;

        // Refused when another process holds the foreground lock
        // SAFETY: a stale HWND is rejected by the OS, not dereferenced
        if unsafe { SetForegroundWindow(window.0 as _) } == 0 {
            warn!("SetForegroundWindow refused for {:?}", window);
        }
        Ok(())
    }
}

/// X11 window API using EWMH hints
#[cfg(target_os = "linux")]
pub struct X11Windows {
    conn: x11rb::rust_connection::RustConnection,
    root: u32,
    net_client_list: u32,
    net_active_window: u32,
    net_wm_name: u32,
    utf8_string: u32,
}

#[cfg(target_os = "linux")]
fn x11_error(e: impl std::fmt::Display) -> ComboPadError {
    ComboPadError::FocusDetection(format!("X11: {}", e))
}

#[cfg(target_os = "linux")]
impl X11Windows {
    /// Connect to the X server named by $DISPLAY
    pub fn new() -> Result<Self, ComboPadError> {
        use x11rb::connection::Connection;
        use x11rb::protocol::xproto::ConnectionExt;

        let (conn, screen_num) = x11rb::connect(None).map_err(|e| {
            ComboPadError::FocusDetection(format!("Failed to connect to X11: {}", e))
        })?;
        let root = conn.setup().roots[screen_num].root;

        let intern = |name: &[u8]| -> Result<u32, ComboPadError> {
            Ok(conn
                .intern_atom(false, name)
                .map_err(x11_error)?
                .reply()
                .map_err(x11_error)?
                .atom)
        };
        let net_client_list = intern(b"_NET_CLIENT_LIST")?;
        let net_active_window = intern(b"_NET_ACTIVE_WINDOW")?;
        let net_wm_name = intern(b"_NET_WM_NAME")?;
        let utf8_string = intern(b"UTF8_STRING")?;

        Ok(Self {
            conn,
            root,
            net_client_list,
            net_active_window,
            net_wm_name,
            utf8_string,
        })
    }

    fn window_title(&self, window: u32) -> Option<String> {
        use x11rb::protocol::xproto::{AtomEnum, ConnectionExt};

        // Try _NET_WM_NAME first (UTF-8)
        let name_reply = self
            .conn
            .get_property(false, window, self.net_wm_name, self.utf8_string, 0, 256)
            .ok()?
            .reply()
            .ok()?;
        if !name_reply.value.is_empty() {
            return String::from_utf8(name_reply.value).ok();
        }

        // Fall back to WM_NAME (legacy)
        let wm_name_reply = self
            .conn
            .get_property(false, window, AtomEnum::WM_NAME, AtomEnum::STRING, 0, 256)
            .ok()?
            .reply()
            .ok()?;
        if !wm_name_reply.value.is_empty() {
            return String::from_utf8(wm_name_reply.value).ok();
        }

        None
    }
}

#[cfg(target_os = "linux")]
impl WindowSystem for X11Windows {
    fn find_window(&self, title: &str) -> Result<Option<WindowHandle>, ComboPadError> {
        use x11rb::protocol::xproto::{AtomEnum, ConnectionExt};

        let reply = self
            .conn
            .get_property(false, self.root, self.net_client_list, AtomEnum::WINDOW, 0, u32::MAX)
            .map_err(x11_error)?
            .reply()
            .map_err(x11_error)?;

        let Some(windows) = reply.value32() else {
            return Ok(None);
        };
        for window in windows {
            if self.window_title(window).as_deref() == Some(title) {
                return Ok(Some(WindowHandle(window as isize)));
            }
        }
        Ok(None)
    }

    fn restore(&self, window: WindowHandle) -> Result<(), ComboPadError> {
        use x11rb::connection::Connection;
        use x11rb::protocol::xproto::ConnectionExt;

        self.conn.map_window(window.0 as u32).map_err(x11_error)?;
        self.conn.flush().map_err(x11_error)?;
        Ok(())
    }

    fn bring_to_foreground(&self, window: WindowHandle) -> Result<(), ComboPadError> {
        use x11rb::connection::Connection;
        use x11rb::protocol::xproto::{
            ClientMessageEvent, ConfigureWindowAux, ConnectionExt, EventMask, StackMode,
        };

        let window = window.0 as u32;
        // source indication 1 = normal application
        let event = ClientMessageEvent::new(32, window, self.net_active_window, [1u32, 0, 0, 0, 0]);
        self.conn
            .send_event(
                false,
                self.root,
                EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
                event,
            )
            .map_err(x11_error)?;
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE))
            .map_err(x11_error)?;
        self.conn.flush().map_err(x11_error)?;
        Ok(())
    }
}

/// Create the window system for this platform
#[cfg(windows)]
pub fn create_window_system(config: &Config) -> Result<Box<dyn WindowSystem>, ComboPadError> {
    Ok(Box::new(Win32Windows::new(config.window_show_command)))
}

/// Create the window system for this platform
#[cfg(target_os = "linux")]
pub fn create_window_system(_config: &Config) -> Result<Box<dyn WindowSystem>, ComboPadError> {
    Ok(Box::new(X11Windows::new()?))
}

/// Create the window system for this platform
#[cfg(not(any(windows, target_os = "linux")))]
pub fn create_window_system(_config: &Config) -> Result<Box<dyn WindowSystem>, ComboPadError> {
    Err(ComboPadError::Unsupported(
        "no window focus backend for this OS".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// Window system that finds the window after `missing` failed lookups
    struct FakeWindows {
        missing: Cell<u32>,
        lookups: Cell<u32>,
        calls: RefCell<Vec<&'static str>>,
    }

    impl FakeWindows {
        fn new(missing: u32) -> Self {
            Self {
                missing: Cell::new(missing),
                lookups: Cell::new(0),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl WindowSystem for FakeWindows {
        fn find_window(&self, title: &str) -> Result<Option<WindowHandle>, ComboPadError> {
            assert_eq!(title, "Emulator");
            self.lookups.set(self.lookups.get() + 1);
            self.calls.borrow_mut().push("find");
            if self.missing.get() > 0 {
                self.missing.set(self.missing.get() - 1);
                return Ok(None);
            }
            Ok(Some(WindowHandle(42)))
        }

        fn restore(&self, window: WindowHandle) -> Result<(), ComboPadError> {
            assert_eq!(window, WindowHandle(42));
            self.calls.borrow_mut().push("restore");
            Ok(())
        }

        fn bring_to_foreground(&self, _window: WindowHandle) -> Result<(), ComboPadError> {
            self.calls.borrow_mut().push("foreground");
            Ok(())
        }
    }

    fn focuser(missing: u32, cooldown: Duration) -> WindowFocuser<FakeWindows> {
        WindowFocuser::new(FakeWindows::new(missing), "Emulator", cooldown, Duration::ZERO)
    }

    #[test]
    fn restores_then_raises() {
        let mut focuser = focuser(0, Duration::from_secs(10));
        assert!(focuser.focus(3));
        assert_eq!(
            *focuser.system().calls.borrow(),
            vec!["find", "restore", "foreground"]
        );
        assert!(focuser.last_focus().is_some());
    }

    #[test]
    fn second_call_within_cooldown_skips_lookup() {
        let mut focuser = focuser(0, Duration::from_secs(10));
        assert!(focuser.focus(3));
        assert!(focuser.focus(3));
        assert_eq!(focuser.system().lookups.get(), 1);
    }

    #[test]
    fn zero_cooldown_looks_up_every_time() {
        let mut focuser = focuser(0, Duration::ZERO);
        assert!(focuser.focus(1));
        assert!(focuser.focus(1));
        assert_eq!(focuser.system().lookups.get(), 2);
    }

    #[test]
    fn retries_until_window_appears() {
        let mut focuser = focuser(2, Duration::from_secs(10));
        assert!(focuser.focus(3));
        assert_eq!(focuser.system().lookups.get(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut focuser = focuser(5, Duration::from_secs(10));
        assert!(!focuser.focus(3));
        assert_eq!(focuser.system().lookups.get(), 3);
        assert!(focuser.last_focus().is_none());
    }

    struct BrokenWindows;

    impl WindowSystem for BrokenWindows {
        fn find_window(&self, _title: &str) -> Result<Option<WindowHandle>, ComboPadError> {
            Err(ComboPadError::FocusDetection("display gone".to_string()))
        }

        fn restore(&self, _window: WindowHandle) -> Result<(), ComboPadError> {
            unreachable!()
        }

        fn bring_to_foreground(&self, _window: WindowHandle) -> Result<(), ComboPadError> {
            unreachable!()
        }
    }

    #[test]
    fn lookup_errors_count_as_failed_attempts() {
        let mut focuser =
            WindowFocuser::new(BrokenWindows, "Emulator", Duration::ZERO, Duration::ZERO);
        assert!(!focuser.focus(2));
    }
}
