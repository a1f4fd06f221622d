pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActiveWindow {
    pub app_name: String,
    pub window_name: String,
}

impl ActiveWindow {
    pub fn new(app_name: impl Into<String>, window_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            window_name: window_name.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN)
    }
}

/// Source of the current foreground window. Implementations never fail;
/// platform errors collapse into [`ActiveWindow::unknown`].
pub trait WindowProbe {
    fn probe(&mut self) -> ActiveWindow;
}

impl<P: WindowProbe + ?Sized> WindowProbe for Box<P> {
    fn probe(&mut self) -> ActiveWindow {
        (**self).probe()
    }
}

/// Probe for platforms without window introspection.
#[derive(Debug, Default)]
pub struct UnknownProbe;

impl WindowProbe for UnknownProbe {
    fn probe(&mut self) -> ActiveWindow {
        ActiveWindow::unknown()
    }
}

/// Picks the probe for the running platform once, up front.
pub fn native_probe() -> Box<dyn WindowProbe> {
    #[cfg(target_os = "windows")]
    {
        Box::new(windows::WindowsProbe::new())
    }
    #[cfg(target_os = "linux")]
    {
        Box::new(linux::X11Probe::connect())
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        Box::new(UnknownProbe)
    }
}

#[cfg(target_os = "windows")]
pub mod windows {
    use std::collections::HashMap;
    use std::path::Path;

    use windows_sys::Win32::Foundation::{CloseHandle, FILETIME, HANDLE, HWND};
    use windows_sys::Win32::System::Threading::{
        GetProcessTimes, OpenProcess, QueryFullProcessImageNameW, PROCESS_QUERY_LIMITED_INFORMATION,
    };
    use windows_sys::Win32::UI::WindowsAndMessaging::{
        GetForegroundWindow, GetWindowTextLengthW, GetWindowTextW, GetWindowThreadProcessId,
    };

    use super::{ActiveWindow, WindowProbe};

    const PROCESS_CACHE_LIMIT: usize = 4096;

    #[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
    struct ProcessKey {
        pid: u32,
        creation_time: u64,
    }

    /// Foreground window via Win32. Executable names are cached per process
    /// instance so pid reuse cannot leak a stale name.
    #[derive(Default)]
    pub struct WindowsProbe {
        exe_cache: HashMap<ProcessKey, String>,
    }

    impl WindowsProbe {
        pub fn new() -> Self {
            Self::default()
        }

        fn resolve_exe_name(&mut self, pid: u32) -> Option<String> {
            let Some(creation_time) = process_creation_time(pid) else {
                return process_path(pid).and_then(|path| exe_name_from_path(&path));
            };

            let key = ProcessKey { pid, creation_time };
            if let Some(name) = self.exe_cache.get(&key) {
                return Some(name.clone());
            }

            let name = process_path(pid).and_then(|path| exe_name_from_path(&path))?;
            if self.exe_cache.len() >= PROCESS_CACHE_LIMIT {
                self.exe_cache.clear();
            }
            self.exe_cache.insert(key, name.clone());
            Some(name)
        }
    }

    impl WindowProbe for WindowsProbe {
        fn probe(&mut self) -> ActiveWindow {
            let hwnd = unsafe { GetForegroundWindow() };
            if hwnd.is_null() {
                tracing::debug!("no foreground window");
                return ActiveWindow::unknown();
            }

            let Some(pid) = window_pid(hwnd) else {
                tracing::debug!("foreground window has no owning process");
                return ActiveWindow::unknown();
            };

            match self.resolve_exe_name(pid) {
                Some(app_name) => ActiveWindow::new(app_name, window_title(hwnd)),
                None => {
                    tracing::debug!(pid, "unable to resolve process image name");
                    ActiveWindow::unknown()
                }
            }
        }
    }

    fn window_pid(hwnd: HWND) -> Option<u32> {
        let mut pid: u32 = 0;
        unsafe {
            GetWindowThreadProcessId(hwnd, &mut pid);
        }
        if pid == 0 {
            None
        } else {
            Some(pid)
        }
    }

    fn window_title(hwnd: HWND) -> String {
        let len = unsafe { GetWindowTextLengthW(hwnd) };
        if len <= 0 {
            return String::new();
        }

        let mut buffer: Vec<u16> = vec![0; len as usize + 1];
        let copied = unsafe { GetWindowTextW(hwnd, buffer.as_mut_ptr(), buffer.len() as i32) };
        if copied <= 0 {
            return String::new();
        }
        String::from_utf16_lossy(&buffer[..copied as usize])
    }

    fn process_creation_time(pid: u32) -> Option<u64> {
        with_process_handle(pid, |handle| {
            let mut creation = zero_filetime();
            let mut exit = zero_filetime();
            let mut kernel = zero_filetime();
            let mut user = zero_filetime();

            let ok =
                unsafe { GetProcessTimes(handle, &mut creation, &mut exit, &mut kernel, &mut user) };
            if ok == 0 {
                return None;
            }
            Some(((creation.dwHighDateTime as u64) << 32) | (creation.dwLowDateTime as u64))
        })
    }

    fn process_path(pid: u32) -> Option<String> {
        with_process_handle(pid, |handle| {
            let mut buffer: Vec<u16> = vec![0; 4096];
            let mut size: u32 = buffer.len() as u32;
            let ok =
                unsafe { QueryFullProcessImageNameW(handle, 0, buffer.as_mut_ptr(), &mut size) };
            if ok == 0 || size == 0 {
                return None;
            }
            Some(String::from_utf16_lossy(&buffer[..size as usize]))
        })
    }

    fn with_process_handle<T>(pid: u32, f: impl FnOnce(HANDLE) -> Option<T>) -> Option<T> {
        let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid) };
        if handle.is_null() {
            return None;
        }

        let result = f(handle);
        unsafe {
            CloseHandle(handle);
        }
        result
    }

    fn exe_name_from_path(path: &str) -> Option<String> {
        Path::new(path)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
    }

    fn zero_filetime() -> FILETIME {
        FILETIME {
            dwLowDateTime: 0,
            dwHighDateTime: 0,
        }
    }
}

#[cfg(target_os = "linux")]
pub mod linux {
    use std::fs;

    use x11rb::connection::Connection;
    use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt, Window};
    use x11rb::rust_connection::RustConnection;

    use super::{ActiveWindow, WindowProbe};

    struct Session {
        conn: RustConnection,
        root: Window,
        net_active_window: Atom,
        net_wm_name: Atom,
        net_wm_pid: Atom,
        utf8_string: Atom,
    }

    /// Foreground window via EWMH properties on the X11 root window. Without
    /// a reachable X server every probe reports Unknown.
    pub struct X11Probe {
        session: Option<Session>,
    }

    impl X11Probe {
        pub fn connect() -> Self {
            let session = match open_session() {
                Ok(session) => Some(session),
                Err(err) => {
                    tracing::warn!("X11 window probing unavailable: {err:#}");
                    None
                }
            };
            Self { session }
        }
    }

    impl WindowProbe for X11Probe {
        fn probe(&mut self) -> ActiveWindow {
            let Some(session) = self.session.as_ref() else {
                return ActiveWindow::unknown();
            };
            match session.active_window() {
                Ok(window) => window,
                Err(err) => {
                    tracing::debug!("X11 probe failed: {err:#}");
                    ActiveWindow::unknown()
                }
            }
        }
    }

    fn open_session() -> anyhow::Result<Session> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let root = conn.setup().roots[screen_num].root;
        let intern = |name: &[u8]| -> anyhow::Result<Atom> {
            Ok(conn.intern_atom(false, name)?.reply()?.atom)
        };
        let net_active_window = intern(b"_NET_ACTIVE_WINDOW")?;
        let net_wm_name = intern(b"_NET_WM_NAME")?;
        let net_wm_pid = intern(b"_NET_WM_PID")?;
        let utf8_string = intern(b"UTF8_STRING")?;
        Ok(Session {
            conn,
            root,
            net_active_window,
            net_wm_name,
            net_wm_pid,
            utf8_string,
        })
    }

    impl Session {
        fn active_window(&self) -> anyhow::Result<ActiveWindow> {
            let window = self
                .first_u32(self.root, self.net_active_window, AtomEnum::WINDOW.into())?
                .filter(|w| *w != 0)
                .ok_or_else(|| anyhow::anyhow!("no active window"))?;

            let window_name = match self.text(window, self.net_wm_name, self.utf8_string)? {
                Some(name) => name,
                None => self
                    .text(window, AtomEnum::WM_NAME.into(), AtomEnum::STRING.into())?
                    .unwrap_or_default(),
            };

            let pid = self
                .first_u32(window, self.net_wm_pid, AtomEnum::CARDINAL.into())?
                .ok_or_else(|| anyhow::anyhow!("window {window} has no _NET_WM_PID"))?;
            let app_name = fs::read_to_string(format!("/proc/{pid}/comm"))?
                .trim()
                .to_owned();

            Ok(ActiveWindow::new(app_name, window_name.trim()))
        }

        fn first_u32(&self, window: Window, property: Atom, kind: Atom) -> anyhow::Result<Option<u32>> {
            let reply = self
                .conn
                .get_property(false, window, property, kind, 0, 1)?
                .reply()?;
            Ok(reply.value32().and_then(|mut values| values.next()))
        }

        fn text(&self, window: Window, property: Atom, kind: Atom) -> anyhow::Result<Option<String>> {
            let reply = self
                .conn
                .get_property(false, window, property, kind, 0, 1024)?
                .reply()?;
            if reply.value.is_empty() {
                return Ok(None);
            }
            Ok(Some(String::from_utf8_lossy(&reply.value).into_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_probe_reports_sentinel_pair() {
        let mut probe = UnknownProbe;
        assert_eq!(probe.probe(), ActiveWindow::new("Unknown", "Unknown"));
    }

    #[test]
    fn boxed_probe_delegates() {
        let mut probe: Box<dyn WindowProbe> = Box::new(UnknownProbe);
        assert_eq!(probe.probe(), ActiveWindow::unknown());
    }

    #[test]
    #[ignore] // Requires a desktop session
    fn native_probe_reports_something() {
        let mut probe = native_probe();
        let window = probe.probe();
        println!("Active: {} - {}", window.app_name, window.window_name);
    }
}
