#![forbid(unsafe_code)]

use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

pub struct ExecRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

impl ExecRequest {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ExecOutcome {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug)]
pub enum ExecError {
    Spawn { program: String, source: std::io::Error },
    TimedOut { program: String, timeout: Duration, stdout: String, stderr: String },
    Wait { program: String, source: std::io::Error },
}

impl ExecError {
    pub fn message(&self) -> String {
        match self {
            Self::Spawn { program, source } => format!("failed to spawn {program}: {source}"),
            Self::TimedOut { program, timeout, .. } => format!(
                "{program} exceeded the {} ms timeout and was killed",
                timeout.as_millis()
            ),
            Self::Wait { program, source } => format!("failed to wait for {program}: {source}"),
        }
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Run a command to completion under a wall-clock timeout.
///
/// Output is drained on dedicated threads so a chatty child cannot deadlock
/// on a full pipe while we poll. On timeout the child is killed and reaped
/// before returning; the partial output captured so far rides along in the
/// error for diagnosis.
pub fn run(request: &ExecRequest) -> Result<ExecOutcome, ExecError> {
    let mut cmd = Command::new(&request.program);
    cmd.args(&request.args)
        .current_dir(&request.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in request.env.iter() {
        cmd.env(key, value);
    }

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: request.program.clone(),
        source,
    })?;

    let stdout_reader = child.stdout.take().map(spawn_drain);
    let stderr_reader = child.stderr.take().map(spawn_drain);

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecError::Wait {
                    program: request.program.clone(),
                    source,
                });
            }
        }

        if started.elapsed() >= request.timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExecError::TimedOut {
                program: request.program.clone(),
                timeout: request.timeout,
                stdout: join_drain(stdout_reader),
                stderr: join_drain(stderr_reader),
            });
        }

        std::thread::sleep(POLL_INTERVAL);
    };

    Ok(ExecOutcome {
        exit_code: status.code(),
        stdout: join_drain(stdout_reader),
        stderr: join_drain(stderr_reader),
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

fn spawn_drain<R: Read + Send + 'static>(mut stream: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_drain(handle: Option<std::thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cwd() -> PathBuf {
        std::env::temp_dir()
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let request = ExecRequest::new("sh", cwd(), Duration::from_secs(5))
            .arg("-c")
            .arg("echo hello");
        let outcome = run(&request).expect("run sh");
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stdout.trim(), "hello");
    }

    #[test]
    fn nonzero_exit_is_an_outcome_not_an_error() {
        let request = ExecRequest::new("sh", cwd(), Duration::from_secs(5))
            .arg("-c")
            .arg("echo oops >&2; exit 3");
        let outcome = run(&request).expect("run sh");
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stderr.trim(), "oops");
        assert!(!outcome.success());
    }

    #[test]
    fn timeout_kills_the_child_within_bounds() {
        let request = ExecRequest::new("sh", cwd(), Duration::from_millis(300))
            .arg("-c")
            .arg("sleep 5");
        let started = Instant::now();
        let err = run(&request).expect_err("must time out");
        assert!(matches!(err, ExecError::TimedOut { .. }));
        // Bounded: well under the child's own 5 s sleep.
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn env_vars_reach_the_child() {
        let request = ExecRequest::new("sh", cwd(), Duration::from_secs(5))
            .arg("-c")
            .arg("printf %s \"$WB_PROBE\"")
            .env("WB_PROBE", "present");
        let outcome = run(&request).expect("run sh");
        assert_eq!(outcome.stdout, "present");
    }

    #[test]
    fn spawn_failure_names_the_program() {
        let request = ExecRequest::new(
            "definitely-not-a-real-binary",
            cwd(),
            Duration::from_secs(1),
        );
        let err = run(&request).expect_err("must fail to spawn");
        assert!(err.message().contains("definitely-not-a-real-binary"));
    }
}
