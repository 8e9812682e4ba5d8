//! Chat log sink.
//!
//! When enabled, appends every fanned-out message to per-channel log files
//! organized as `<log_dir>/<user>/<network_host>/<channel>.log`. Lobby
//! traffic is filed under the network host itself.

use crate::client::models::{Msg, MsgKind};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Appends rendered message lines to per-channel files.
///
/// File handles are cached for the lifetime of the logger to avoid repeated
/// opens. Failures are swallowed; the log sink must never take down a
/// session.
pub struct ChatLogger {
    enabled: bool,
    log_dir: PathBuf,
    handles: HashMap<PathBuf, File>,
}

impl ChatLogger {
    pub fn new(enabled: bool, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled,
            log_dir: log_dir.into(),
            handles: HashMap::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, PathBuf::new())
    }

    /// Append one message under `<user>/<host>/<chan>.log`.
    pub fn append(&mut self, user: &str, host: &str, chan: &str, msg: &Msg) {
        if !self.enabled {
            return;
        }

        let line = render_line(msg);
        let dir = self.log_dir.join(sanitize(user)).join(sanitize(host));
        let path = dir.join(format!("{}.log", sanitize(chan)));

        let handle = match self.handles.entry(path.clone()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => {
                let _ = fs::create_dir_all(&dir);
                match OpenOptions::new().create(true).append(true).open(&path) {
                    Ok(file) => v.insert(file),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "chat log unavailable");
                        return;
                    }
                }
            }
        };
        let _ = writeln!(handle, "{line}");
    }
}

fn render_line(msg: &Msg) -> String {
    let stamp = msg.time.format("%Y-%m-%d %H:%M:%S");
    match msg.kind {
        MsgKind::Message | MsgKind::Notice => {
            format!("[{stamp}] <{}> {}", msg.from, msg.text)
        }
        MsgKind::Action => format!("[{stamp}] * {} {}", msg.from, msg.text),
        MsgKind::Error => format!("[{stamp}] !!! {}", msg.text),
        _ => format!("[{stamp}] *** {} {}", msg.from, msg.text),
    }
}

fn sanitize(part: &str) -> String {
    let safe: String = part
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == '#' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        "_".to_string()
    } else {
        safe
    }
}
