#![forbid(unsafe_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Bounded, single-file session record for debugging transport issues.
///
/// stdout is the protocol channel and stderr may be swallowed by the client,
/// so the record goes to the state directory instead. Rewritten in place on
/// every note; never contains request bodies.
#[derive(Clone, Debug)]
pub(crate) struct SessionLog {
    path: PathBuf,
    start_rfc3339: String,
    pid: u32,
    build: String,
    cwd: String,
    args: Vec<String>,
    mode: Option<String>,
    last_method: Option<String>,
    last_error: Option<String>,
    exit: Option<String>,
}

impl SessionLog {
    pub(crate) fn new(state_dir: &Path) -> Self {
        let args = std::env::args().collect::<Vec<_>>();
        let is_daemon = args.iter().any(|arg| arg.as_str() == "--daemon");
        // The daemon gets its own file so a stdio session and a daemon on the
        // same state dir cannot overwrite each other's record.
        let path = if is_daemon {
            state_dir.join("workbench_last_session_daemon.txt")
        } else {
            state_dir.join("workbench_last_session.txt")
        };
        let cwd = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .to_string_lossy()
            .to_string();
        let this = Self {
            path,
            start_rfc3339: crate::now_rfc3339(),
            pid: std::process::id(),
            build: crate::build_fingerprint(),
            cwd,
            args,
            mode: None,
            last_method: None,
            last_error: None,
            exit: None,
        };
        this.flush();
        this
    }

    pub(crate) fn note_mode(&mut self, mode: &str) {
        self.mode = Some(mode.to_string());
        self.flush();
    }

    pub(crate) fn note_method(&mut self, method: &str) {
        let method = method.trim();
        if method.is_empty() {
            return;
        }
        self.last_method = Some(truncate(method, 96));
        self.flush();
    }

    pub(crate) fn note_error(&mut self, error: &str) {
        let error = error.trim();
        if error.is_empty() {
            return;
        }
        self.last_error = Some(truncate(error, 300));
        self.flush();
    }

    pub(crate) fn note_exit(&mut self, reason: &str) {
        self.exit = Some(truncate(reason.trim(), 120));
        self.flush();
    }

    fn flush(&self) {
        let mut out = String::new();
        let _ = writeln!(out, "start={}", self.start_rfc3339);
        let _ = writeln!(out, "pid={}", self.pid);
        let _ = writeln!(out, "build={}", self.build);
        let _ = writeln!(out, "cwd={}", self.cwd);
        let _ = writeln!(out, "args={:?}", self.args);
        if let Some(mode) = self.mode.as_deref() {
            let _ = writeln!(out, "mode={mode}");
        }
        if let Some(method) = self.last_method.as_deref() {
            let _ = writeln!(out, "last_method={method}");
        }
        if let Some(error) = self.last_error.as_deref() {
            let _ = writeln!(out, "last_error={error}");
        }
        if let Some(exit) = self.exit.as_deref() {
            let _ = writeln!(out, "exit={exit}");
        }

        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::write(&self.path, out);
    }
}

impl Drop for SessionLog {
    fn drop(&mut self) {
        if self.exit.is_none() {
            self.exit = Some("drop".to_string());
        }
        self.flush();
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut cut = max;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &text[..cut])
}
