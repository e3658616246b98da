#![forbid(unsafe_code)]

mod framing;
#[cfg(unix)]
mod socket;
mod stdio;

#[cfg(unix)]
pub(crate) use socket::{DaemonConfig, run_socket_daemon};
pub(crate) use stdio::run_stdio;
