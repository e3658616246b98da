#![forbid(unsafe_code)]

mod config;
mod dispatch;
mod entry;
mod envelope;
mod registry;
mod server;
mod support;
mod tools;

pub(crate) use support::*;

use config::ServerConfig;
use registry::ToolRegistry;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

// Protocol negotiation: keep the echoed protocol version at the widely
// deployed baseline; behavior stays forward-compatible.
const MCP_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "workbench-mcp";
const SERVER_VERSION: &str = "0.1.0";

/// Shared, read-only state handed to every handler: the immutable process
/// configuration and one HTTP client reused across remote calls.
#[derive(Clone)]
pub(crate) struct ServerContext {
    pub(crate) config: Arc<ServerConfig>,
    pub(crate) http: reqwest::blocking::Client,
}

impl ServerContext {
    pub(crate) fn new(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("{SERVER_NAME}/{SERVER_VERSION}"))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }
}

pub(crate) struct ToolServer {
    pub(crate) initialized: bool,
    pub(crate) ctx: ServerContext,
    pub(crate) registry: Arc<ToolRegistry>,
}

fn write_last_crash(state_dir: &std::path::Path, kind: &str, detail: &str) {
    // Best-effort crash record for debugging transport issues without
    // logging request bodies.
    let _ = std::fs::create_dir_all(state_dir);
    let path = state_dir.join("workbench_last_crash.txt");

    let mut out = String::new();
    let _ = writeln!(out, "ts={}", now_rfc3339());
    let _ = writeln!(out, "pid={}", std::process::id());
    let _ = writeln!(out, "kind={kind}");
    let _ = writeln!(out, "build={}", build_fingerprint());
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let _ = writeln!(out, "cwd={}", cwd.to_string_lossy());
    let _ = writeln!(out, "args={:?}", std::env::args().collect::<Vec<_>>());
    let _ = writeln!(out, "detail={detail}");

    let _ = std::fs::write(path, out);
}

fn install_crash_reporter(state_dir: PathBuf) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let mut detail = info.to_string();
        let backtrace = std::backtrace::Backtrace::force_capture();
        let _ = write!(&mut detail, "\nbacktrace:\n{backtrace}");
        write_last_crash(&state_dir, "panic", &detail);
        default_hook(info);
    }));
}

fn usage() -> &'static str {
    "wb_mcp — workbench MCP server (schema-validated dev tools over stdio)\n\n\
USAGE:\n\
  wb_mcp [--workspace-root DIR] [--daemon] [--socket PATH]\n\
\n\
FLAGS:\n\
  -h, --help       Print this help and exit\n\
  -V, --version    Print version/build and exit\n\
\n\
ENVIRONMENT:\n\
  WORKBENCH_WORKSPACE_ROOT  Workspace root (flag wins; default: cwd)\n\
  GITHUB_TOKEN              Credential for the github_* tools\n\
  GITLAB_TOKEN              Credential for the gitlab_* tools\n\
  GITLAB_HOST               GitLab base URL (default: https://gitlab.com)\n"
}

fn version_line() -> String {
    format!("wb_mcp {SERVER_VERSION} build={}", build_fingerprint())
}

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == flag {
            return iter.next().cloned();
        }
    }
    None
}

fn parse_env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let v = v.trim().to_string();
        if v.is_empty() { None } else { Some(v) }
    })
}

fn parse_workspace_root(args: &[String]) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let raw = parse_flag_value(args, "--workspace-root")
        .or_else(|| parse_env_nonempty("WORKBENCH_WORKSPACE_ROOT"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    // Canonicalize once at startup so per-call confinement can be purely
    // lexical against a stable absolute root.
    std::fs::canonicalize(&raw)
        .map_err(|e| format!("workspace root {} is not usable: {e}", raw.display()).into())
}

fn parse_config(args: &[String]) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let workspace_root = parse_workspace_root(args)?;
    let mut config = ServerConfig::new(workspace_root);
    config.github_token = parse_env_nonempty("GITHUB_TOKEN");
    config.gitlab_token = parse_env_nonempty("GITLAB_TOKEN");
    if let Some(host) = parse_env_nonempty("GITLAB_HOST") {
        config.gitlab_host = host.trim_end_matches('/').to_string();
    }
    Ok(config)
}

#[cfg(unix)]
fn parse_socket_path(args: &[String], state_dir: &std::path::Path) -> PathBuf {
    parse_flag_value(args, "--socket")
        .map(PathBuf::from)
        .unwrap_or_else(|| state_dir.join("workbench.sock"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = std::env::args().collect::<Vec<_>>();
    if args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print!("{}", usage());
        return Ok(());
    }
    if args
        .iter()
        .any(|arg| matches!(arg.as_str(), "-V" | "--version"))
    {
        println!("{}", version_line());
        return Ok(());
    }

    let config = parse_config(&args)?;
    let state_dir = config.state_dir.clone();
    let _ = std::fs::create_dir_all(&state_dir);
    install_crash_reporter(state_dir.clone());
    let mut session_log = SessionLog::new(&state_dir);

    // Duplicate tool names or malformed contracts are build-time
    // misconfiguration: abort startup loudly instead of serving a broken
    // catalog.
    let registry = match tools::all_specs().and_then(ToolRegistry::build) {
        Ok(registry) => Arc::new(registry),
        Err(err) => {
            write_last_crash(&state_dir, "registry", &err.message());
            session_log.note_exit("registry_error");
            return Err(err.into());
        }
    };

    let ctx = ServerContext::new(config)?;

    let daemon_mode = args.iter().any(|arg| arg.as_str() == "--daemon");
    if daemon_mode {
        #[cfg(unix)]
        {
            session_log.note_mode("daemon");
            let socket_path = parse_socket_path(&args, &state_dir);
            let result = entry::run_socket_daemon(entry::DaemonConfig {
                socket_path,
                ctx,
                registry,
            });
            if let Err(err) = &result {
                write_last_crash(&state_dir, "error", &format!("{err:?}"));
                session_log.note_exit("daemon_error");
            }
            return result;
        }

        #[cfg(not(unix))]
        {
            return Err("daemon mode is only supported on unix targets".into());
        }
    }

    let mut server = ToolServer {
        initialized: false,
        ctx,
        registry,
    };
    let result = entry::run_stdio(&mut server, &mut session_log);
    if let Err(err) = &result {
        write_last_crash(&state_dir, "error", &format!("{err:?}"));
        session_log.note_exit("stdio_error");
    }
    result
}
