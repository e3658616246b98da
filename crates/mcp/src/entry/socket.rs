#![forbid(unsafe_code)]

use super::framing::{parse_request, read_content_length_frame, write_content_length_json};
use crate::registry::ToolRegistry;
use crate::{ServerContext, ToolServer};
use serde_json::{Value, json};
use std::io::{BufReader, BufWriter};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub(crate) struct DaemonConfig {
    pub(crate) socket_path: PathBuf,
    pub(crate) ctx: ServerContext,
    pub(crate) registry: Arc<ToolRegistry>,
}

/// Unix-socket daemon entry: one thread per connection, Content-Length
/// framing. The registry and configuration are read-only and shared; each
/// connection gets its own initialization state.
pub(crate) fn run_socket_daemon(config: DaemonConfig) -> Result<(), Box<dyn std::error::Error>> {
    // Another live daemon already owns the socket: nothing to do.
    if UnixStream::connect(&config.socket_path).is_ok() {
        return Ok(());
    }

    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    let listener = match UnixListener::bind(&config.socket_path) {
        Ok(listener) => listener,
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            if UnixStream::connect(&config.socket_path).is_ok() {
                return Ok(());
            }
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    let _ = listener.set_nonblocking(true);
    let config = Arc::new(config);

    loop {
        match listener.accept() {
            Ok((stream, _addr)) => {
                let config = Arc::clone(&config);
                thread::spawn(move || {
                    let _ = handle_connection(stream, config);
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(_) => continue,
        }
    }
}

fn handle_connection(
    stream: UnixStream,
    config: Arc<DaemonConfig>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = BufWriter::new(stream);

    let mut server = ToolServer {
        initialized: false,
        ctx: config.ctx.clone(),
        registry: config.registry.clone(),
    };

    loop {
        let Some(body) = read_content_length_frame(&mut reader, None)? else {
            break;
        };

        let response: Option<Value> = match parse_request(&body) {
            Ok(request) => {
                // Internal maintenance methods, not part of the tool surface
                // (not discoverable via tools/list).
                if request.method == "workbench/daemon_shutdown" {
                    let resp = crate::json_rpc_response(request.id, json!({ "ok": true }));
                    let _ = std::fs::remove_file(&config.socket_path);
                    write_content_length_json(&mut writer, &resp)?;
                    std::process::exit(0);
                }

                if request.method == "workbench/daemon_info" {
                    Some(crate::json_rpc_response(
                        request.id,
                        json!({
                            "fingerprint": crate::build_fingerprint(),
                            "workspace_root": config.ctx.config.workspace_root.to_string_lossy(),
                            "socket_path": config.socket_path.to_string_lossy()
                        }),
                    ))
                } else {
                    server.handle(request)
                }
            }
            Err(err) => Some(err),
        };

        if let Some(resp) = response {
            write_content_length_json(&mut writer, &resp)?;
        }
    }

    Ok(())
}
