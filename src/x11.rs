//! X11 backend for the platform capability traits
//!
//! Window facts come from EWMH properties, monitors from RandR, process
//! facts from /proc. Atoms are interned once at connect time to avoid
//! repeated roundtrips.

use std::fs;
use std::process::Command;

use anyhow::{Context as _, Result};
use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::protocol::randr::ConnectionExt as RandrExt;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ClientMessageData, ClientMessageEvent, ConfigureWindowAux, ConnectionExt as _,
    EventMask, MapState, Screen, StackMode, Window, CLIENT_MESSAGE_EVENT,
};
use x11rb::rust_connection::RustConnection;

use crate::config::{SwpFlag, ZOrder};
use crate::errors::Error;
use crate::geometry::{Rect, WorkArea};
use crate::platform::{
    LaunchSpec, Monitor, ProcessInfo, ProcessSystem, WindowHandle, WindowSystem, names_equal,
};

/// Pre-cached X11 atoms, interned in one burst at connect time.
struct Atoms {
    net_client_list: Atom,
    net_wm_name: Atom,
    utf8_string: Atom,
    net_wm_pid: Atom,
    net_wm_state: Atom,
    net_wm_state_hidden: Atom,
    net_active_window: Atom,
}

impl Atoms {
    fn new(conn: &RustConnection) -> Result<Self> {
        let intern = |name: &[u8]| -> Result<Atom> {
            Ok(conn
                .intern_atom(false, name)
                .with_context(|| format!("failed to intern {}", String::from_utf8_lossy(name)))?
                .reply()
                .with_context(|| {
                    format!("failed to get atom reply for {}", String::from_utf8_lossy(name))
                })?
                .atom)
        };
        Ok(Self {
            net_client_list: intern(b"_NET_CLIENT_LIST")?,
            net_wm_name: intern(b"_NET_WM_NAME")?,
            utf8_string: intern(b"UTF8_STRING")?,
            net_wm_pid: intern(b"_NET_WM_PID")?,
            net_wm_state: intern(b"_NET_WM_STATE")?,
            net_wm_state_hidden: intern(b"_NET_WM_STATE_HIDDEN")?,
            net_active_window: intern(b"_NET_ACTIVE_WINDOW")?,
        })
    }
}

pub struct X11Platform {
    conn: RustConnection,
    screen_num: usize,
    atoms: Atoms,
}

impl X11Platform {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("failed to connect to X11")?;
        let atoms = Atoms::new(&conn)?;
        Ok(Self { conn, screen_num, atoms })
    }

    fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }

    fn window_property(&self, window: Window, property: Atom, kind: Atom) -> Option<Vec<u8>> {
        self.conn
            .get_property(false, window, property, kind, 0, 4096)
            .ok()?
            .reply()
            .ok()
            .map(|prop| prop.value)
    }

    fn window_property32(&self, window: Window, property: Atom, kind: AtomEnum) -> Vec<u32> {
        self.conn
            .get_property(false, window, property, kind, 0, 4096)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .and_then(|prop| prop.value32().map(|iter| iter.collect()))
            .unwrap_or_default()
    }

    /// Map pid -> one top-level window for that pid (the "main" window).
    fn window_of_pid(&self, pid: u32) -> Option<WindowHandle> {
        let handles = self.enumerate_top_level().ok()?;
        handles
            .into_iter()
            .find(|&h| self.owning_pid(h) == Some(pid))
    }
}

fn os_err<E: std::fmt::Display>(e: E) -> Error {
    Error::OsCall(e.to_string())
}

impl WindowSystem for X11Platform {
    fn enumerate_top_level(&self) -> Result<Vec<WindowHandle>> {
        let root = self.screen().root;
        let windows = self.window_property32(root, self.atoms.net_client_list, AtomEnum::WINDOW);
        Ok(windows.into_iter().map(WindowHandle::from).collect())
    }

    fn is_visible(&self, handle: WindowHandle) -> bool {
        self.conn
            .get_window_attributes(handle as Window)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .is_some_and(|attrs| attrs.map_state == MapState::VIEWABLE)
    }

    fn is_minimized(&self, handle: WindowHandle) -> bool {
        self.window_property32(handle as Window, self.atoms.net_wm_state, AtomEnum::ATOM)
            .contains(&self.atoms.net_wm_state_hidden)
    }

    fn title(&self, handle: WindowHandle) -> String {
        let utf8 =
            self.window_property(handle as Window, self.atoms.net_wm_name, self.atoms.utf8_string);
        let raw = match utf8 {
            Some(value) if !value.is_empty() => value,
            _ => self
                .window_property(
                    handle as Window,
                    AtomEnum::WM_NAME.into(),
                    AtomEnum::STRING.into(),
                )
                .unwrap_or_default(),
        };
        String::from_utf8_lossy(&raw).into_owned()
    }

    fn rect(&self, handle: WindowHandle) -> Option<Rect> {
        let geometry = self.conn.get_geometry(handle as Window).ok()?.reply().ok()?;
        // Root-relative origin; the window's own origin is frame-local.
        let translated = self
            .conn
            .translate_coordinates(handle as Window, self.screen().root, 0, 0)
            .ok()?
            .reply()
            .ok()?;
        Some(Rect::new(
            translated.dst_x as i32,
            translated.dst_y as i32,
            geometry.width as i32,
            geometry.height as i32,
        ))
    }

    fn owning_pid(&self, handle: WindowHandle) -> Option<u32> {
        self.window_property32(handle as Window, self.atoms.net_wm_pid, AtomEnum::CARDINAL)
            .first()
            .copied()
    }

    fn restore(&self, handle: WindowHandle) -> crate::errors::Result<()> {
        let window = handle as Window;
        self.conn.map_window(window).map_err(os_err)?;
        // Ask the WM to unhide/activate, the way pagers do.
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window,
            type_: self.atoms.net_active_window,
            data: ClientMessageData::from([2, x11rb::CURRENT_TIME, 0, 0, 0]),
        };
        self.conn
            .send_event(
                false,
                self.screen().root,
                EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
                &event,
            )
            .map_err(os_err)?;
        self.conn.flush().map_err(os_err)?;
        Ok(())
    }

    fn move_window(&self, handle: WindowHandle, rect: Rect) -> crate::errors::Result<()> {
        let aux = ConfigureWindowAux::new()
            .x(rect.x)
            .y(rect.y)
            .width(rect.width.max(1) as u32)
            .height(rect.height.max(1) as u32)
            .stack_mode(StackMode::ABOVE);
        self.conn
            .configure_window(handle as Window, &aux)
            .map_err(os_err)?
            .check()
            .map_err(os_err)?;
        self.conn.flush().map_err(os_err)?;
        Ok(())
    }

    fn set_window_pos(
        &self,
        handle: WindowHandle,
        insert_after: ZOrder,
        rect: Rect,
        flags: &[SwpFlag],
    ) -> crate::errors::Result<()> {
        let mut aux = ConfigureWindowAux::new();
        if !flags.contains(&SwpFlag::NoMove) {
            aux = aux.x(rect.x).y(rect.y);
        }
        if !flags.contains(&SwpFlag::NoSize) {
            aux = aux.width(rect.width.max(1) as u32).height(rect.height.max(1) as u32);
        }
        if !flags.contains(&SwpFlag::NoZOrder) {
            // X11 has no persistent always-on-top via configure; TopMost
            // degrades to a plain raise.
            let stack = match insert_after {
                ZOrder::Bottom => StackMode::BELOW,
                ZOrder::Top | ZOrder::TopMost | ZOrder::NoTopMost => StackMode::ABOVE,
            };
            aux = aux.stack_mode(stack);
        }
        self.conn
            .configure_window(handle as Window, &aux)
            .map_err(os_err)?
            .check()
            .map_err(os_err)?;
        if flags.contains(&SwpFlag::ShowWindow) {
            self.conn.map_window(handle as Window).map_err(os_err)?;
        }
        self.conn.flush().map_err(os_err)?;
        Ok(())
    }

    fn window_dpi(&self, _handle: WindowHandle) -> Option<u32> {
        // Core X11 has no per-window DPI.
        None
    }

    fn system_dpi(&self) -> u32 {
        let screen = self.screen();
        if screen.width_in_millimeters == 0 {
            return 96;
        }
        let dpi = screen.width_in_pixels as f64 * 25.4 / screen.width_in_millimeters as f64;
        dpi.round() as u32
    }

    fn monitors(&self) -> Result<Vec<Monitor>> {
        let root = self.screen().root;
        let reply = self
            .conn
            .randr_get_monitors(root, true)
            .context("failed to query RandR monitors")?
            .reply()
            .context("failed to get RandR monitors reply")?;
        let mut monitors = Vec::new();
        for (index, info) in reply.monitors.iter().enumerate() {
            let device = self
                .conn
                .get_atom_name(info.name)
                .ok()
                .and_then(|cookie| cookie.reply().ok())
                .map(|reply| String::from_utf8_lossy(&reply.name).into_owned())
                .unwrap_or_else(|| format!("MONITOR-{index}"));
            monitors.push(Monitor {
                index,
                device,
                work_area: WorkArea::new(
                    info.x as i32,
                    info.y as i32,
                    info.x as i32 + info.width as i32,
                    info.y as i32 + info.height as i32,
                ),
            });
        }
        debug!(count = monitors.len(), "enumerated monitors");
        Ok(monitors)
    }
}

impl ProcessSystem for X11Platform {
    fn find_by_name(&self, name: &str) -> Vec<ProcessInfo> {
        let mut found = Vec::new();
        let Ok(entries) = fs::read_dir("/proc") else {
            return found;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let Some(pid) = entry.file_name().to_string_lossy().parse::<u32>().ok() else {
                continue;
            };
            let Some(process_name) = self.name_of_pid(pid) else {
                continue;
            };
            if !names_equal(&process_name, name) {
                continue;
            }
            found.push(ProcessInfo {
                pid,
                name: process_name,
                start_time: proc_start_time(pid),
                main_window: self.window_of_pid(pid),
            });
        }
        found
    }

    fn name_of_pid(&self, pid: u32) -> Option<String> {
        fs::read_to_string(format!("/proc/{pid}/comm"))
            .ok()
            .map(|comm| comm.trim().to_string())
            .filter(|comm| !comm.is_empty())
    }

    fn is_running(&self, name: &str) -> bool {
        !self.find_by_name(name).is_empty()
    }

    fn launch(&self, spec: &LaunchSpec) -> crate::errors::Result<()> {
        if spec.elevated {
            warn!(path = %spec.path, "elevation is not supported on this platform, launching normally");
        }
        let mut command = Command::new(&spec.path);
        if let Some(args) = &spec.args {
            command.args(args.split_whitespace());
        }
        if let Some(cwd) = &spec.working_dir {
            command.current_dir(cwd);
        }
        command
            .spawn()
            .map(|_| ())
            .map_err(|e| Error::Launch(format!("failed to start '{}': {e}", spec.path)))
    }
}

/// Process start time in clock ticks since boot, from /proc/<pid>/stat
/// field 22. Comparable across processes; 0 when unreadable.
fn proc_start_time(pid: u32) -> u64 {
    let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return 0;
    };
    // comm may contain spaces, fields start after the closing paren.
    let Some(after_comm) = stat.rsplit_once(')').map(|(_, rest)| rest) else {
        return 0;
    };
    after_comm
        .split_whitespace()
        .nth(19)
        .and_then(|field| field.parse().ok())
        .unwrap_or(0)
}
