#![forbid(unsafe_code)]

use serde_json::{Value, json};
use std::time::Duration;

/// Everything a handler can fail with, sorted into the error taxonomy the
/// envelope reports. Operational conditions (the external collaborator said
/// no) and programming defects (`Internal`) share the envelope shape but get
/// distinct codes so a caller — or the session log — can tell them apart.
#[derive(Debug)]
pub(crate) enum ToolError {
    InvalidInput(String),
    NotFound(String),
    PathOutsideRoot(String),
    Io {
        context: String,
        source: std::io::Error,
    },
    CommandFailed {
        program: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    Timeout {
        program: String,
        timeout: Duration,
    },
    MissingCredential {
        env_var: &'static str,
    },
    Http {
        status: u16,
        url: String,
        body: String,
    },
    HttpTransport(String),
    Internal(String),
}

impl ToolError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::PathOutsideRoot(_) => "PATH_OUTSIDE_ROOT",
            Self::Io { .. } => "IO_ERROR",
            Self::CommandFailed { .. } => "COMMAND_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::MissingCredential { .. } => "MISSING_CREDENTIAL",
            Self::Http { .. } => "HTTP_ERROR",
            Self::HttpTransport(_) => "HTTP_TRANSPORT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => msg.clone(),
            Self::NotFound(what) => format!("not found: {what}"),
            Self::PathOutsideRoot(msg) => msg.clone(),
            Self::Io { context, source } => format!("{context}: {source}"),
            Self::CommandFailed {
                program,
                exit_code,
                stderr,
                ..
            } => match exit_code {
                Some(code) => format!("{program} exited with code {code}: {}", stderr.trim()),
                None => format!("{program} was terminated by a signal: {}", stderr.trim()),
            },
            Self::Timeout { program, timeout } => format!(
                "{program} exceeded the {} ms timeout and was killed",
                timeout.as_millis()
            ),
            Self::MissingCredential { env_var } => {
                format!("credential not configured: set {env_var} in the server environment")
            }
            Self::Http { status, url, body } => {
                format!("HTTP {status} from {url}: {}", truncate_body(body))
            }
            Self::HttpTransport(msg) => format!("HTTP request failed: {msg}"),
            Self::Internal(msg) => format!("internal error (needs a code fix): {msg}"),
        }
    }

    /// Structured cause attached to the failure envelope where the message
    /// alone is not enough to diagnose the external condition.
    fn detail(&self) -> Option<Value> {
        match self {
            Self::CommandFailed {
                program,
                exit_code,
                stdout,
                stderr,
            } => Some(json!({
                "program": program,
                "exit_code": exit_code,
                "stdout": truncate_body(stdout),
                "stderr": truncate_body(stderr),
            })),
            Self::Http { status, url, .. } => Some(json!({ "status": status, "url": url })),
            _ => None,
        }
    }

    /// Programming defects are worth separating from external conditions in
    /// logs; everything else in the taxonomy is recoverable by the caller.
    pub(crate) fn is_defect(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl From<wb_core::PathError> for ToolError {
    fn from(err: wb_core::PathError) -> Self {
        match err {
            wb_core::PathError::Empty => Self::InvalidInput(err.message()),
            _ => Self::PathOutsideRoot(err.message()),
        }
    }
}

impl From<wb_exec::ExecError> for ToolError {
    fn from(err: wb_exec::ExecError) -> Self {
        match err {
            wb_exec::ExecError::TimedOut {
                program, timeout, ..
            } => Self::Timeout { program, timeout },
            wb_exec::ExecError::Spawn { program, source } => Self::Io {
                context: format!("spawn {program}"),
                source,
            },
            wb_exec::ExecError::Wait { program, source } => Self::Io {
                context: format!("wait for {program}"),
                source,
            },
        }
    }
}

pub(crate) fn io_error(context: impl Into<String>, source: std::io::Error) -> ToolError {
    if source.kind() == std::io::ErrorKind::NotFound {
        return ToolError::NotFound(context.into());
    }
    ToolError::Io {
        context: context.into(),
        source,
    }
}

/// Success envelope: the handler's raw data under `result`, nothing else set.
pub(crate) fn tool_ok(tool: &str, result: Value) -> Value {
    json!({
        "success": true,
        "tool": tool,
        "result": result,
        "error": null
    })
}

/// Failure envelope: `error` populated, `result` empty. Exactly one of the
/// two carries meaning in every envelope this server emits.
pub(crate) fn tool_fail(tool: &str, code: &str, message: &str) -> Value {
    json!({
        "success": false,
        "tool": tool,
        "result": {},
        "error": { "code": code, "message": message }
    })
}

pub(crate) fn tool_fail_from(tool: &str, err: &ToolError) -> Value {
    let mut error_obj = serde_json::Map::new();
    error_obj.insert("code".to_string(), Value::String(err.code().to_string()));
    error_obj.insert("message".to_string(), Value::String(err.message()));
    error_obj.insert(
        "category".to_string(),
        Value::String(
            if err.is_defect() { "defect" } else { "operational" }.to_string(),
        ),
    );
    if let Some(detail) = err.detail() {
        error_obj.insert("detail".to_string(), detail);
    }
    json!({
        "success": false,
        "tool": tool,
        "result": {},
        "error": Value::Object(error_obj)
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        return trimmed.to_string();
    }
    let mut cut = MAX;
    while cut > 0 && !trimmed.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &trimmed[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_failure_are_mutually_exclusive() {
        let ok = tool_ok("echo", json!({ "msg": "hi" }));
        assert_eq!(ok.get("success").and_then(|v| v.as_bool()), Some(true));
        assert!(ok.get("error").is_some_and(|v| v.is_null()));
        assert!(!ok.get("result").is_some_and(|v| v.is_null()));

        let fail = tool_fail("echo", "INVALID_INPUT", "msg is required");
        assert_eq!(fail.get("success").and_then(|v| v.as_bool()), Some(false));
        assert!(fail.get("error").is_some_and(|v| v.is_object()));
        assert_eq!(
            fail.get("result").and_then(|v| v.as_object()).map(|m| m.len()),
            Some(0)
        );
    }

    #[test]
    fn command_failure_carries_structured_detail() {
        let err = ToolError::CommandFailed {
            program: "git".to_string(),
            exit_code: Some(128),
            stdout: String::new(),
            stderr: "fatal: not a git repository".to_string(),
        };
        let envelope = tool_fail_from("git_status", &err);
        let detail = envelope
            .get("error")
            .and_then(|v| v.get("detail"))
            .expect("detail");
        assert_eq!(detail.get("exit_code").and_then(|v| v.as_i64()), Some(128));
        assert_eq!(
            envelope
                .get("error")
                .and_then(|v| v.get("category"))
                .and_then(|v| v.as_str()),
            Some("operational")
        );
    }

    #[test]
    fn internal_errors_are_flagged_as_defects_in_the_envelope() {
        let envelope = tool_fail_from("boom", &ToolError::Internal("oops".to_string()));
        assert_eq!(
            envelope
                .get("error")
                .and_then(|v| v.get("category"))
                .and_then(|v| v.as_str()),
            Some("defect")
        );
    }

    #[test]
    fn only_internal_errors_count_as_defects() {
        assert!(ToolError::Internal("boom".to_string()).is_defect());
        assert!(!ToolError::NotFound("x".to_string()).is_defect());
        assert!(
            !ToolError::MissingCredential { env_var: "GITHUB_TOKEN" }.is_defect()
        );
    }
}
