#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

/// Process-wide configuration, read once at startup and immutable afterwards.
/// Handlers receive it by reference through the server context; nothing reads
/// the ambient environment after this is built.
#[derive(Clone, Debug)]
pub(crate) struct ServerConfig {
    pub(crate) workspace_root: PathBuf,
    pub(crate) state_dir: PathBuf,
    pub(crate) github_token: Option<String>,
    pub(crate) gitlab_token: Option<String>,
    pub(crate) gitlab_host: String,
    pub(crate) exec_timeout: Duration,
    pub(crate) exec_timeout_cap: Duration,
    pub(crate) install_timeout: Duration,
}

pub(crate) const DEFAULT_EXEC_TIMEOUT_MS: u64 = 30_000;
pub(crate) const DEFAULT_EXEC_TIMEOUT_CAP_MS: u64 = 600_000;
pub(crate) const DEFAULT_INSTALL_TIMEOUT_MS: u64 = 300_000;

impl ServerConfig {
    pub(crate) fn new(workspace_root: PathBuf) -> Self {
        let state_dir = workspace_root.join(".workbench");
        Self {
            workspace_root,
            state_dir,
            github_token: None,
            gitlab_token: None,
            gitlab_host: "https://gitlab.com".to_string(),
            exec_timeout: Duration::from_millis(DEFAULT_EXEC_TIMEOUT_MS),
            exec_timeout_cap: Duration::from_millis(DEFAULT_EXEC_TIMEOUT_CAP_MS),
            install_timeout: Duration::from_millis(DEFAULT_INSTALL_TIMEOUT_MS),
        }
    }

    /// Clamp a caller-supplied timeout override to the configured cap.
    pub(crate) fn clamp_timeout(&self, requested_ms: u64) -> Duration {
        let ms = requested_ms.clamp(1, self.exec_timeout_cap.as_millis() as u64);
        Duration::from_millis(ms)
    }
}
