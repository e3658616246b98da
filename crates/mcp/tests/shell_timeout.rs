#![forbid(unsafe_code)]

mod support;

use serde_json::json;
use std::time::{Duration, Instant};
use support::*;

#[test]
fn successful_commands_report_output_and_duration() {
    let mut server = Server::start_initialized("shell_success");

    let body = server.call_tool("shell_exec", json!({ "command": "echo hi" }));
    assert_success(&body);
    let result = body.get("result").expect("result");
    assert_eq!(
        result.get("stdout").and_then(|v| v.as_str()).map(str::trim),
        Some("hi")
    );
    assert_eq!(result.get("exit_code").and_then(|v| v.as_i64()), Some(0));
}

#[test]
fn nonzero_exit_is_an_operational_failure_with_detail() {
    let mut server = Server::start_initialized("shell_nonzero");

    let body = server.call_tool(
        "shell_exec",
        json!({ "command": "echo oops >&2; exit 3" }),
    );
    assert_eq!(error_code(&body), Some("COMMAND_FAILED"));
    let detail = body
        .get("error")
        .and_then(|v| v.get("detail"))
        .expect("detail");
    assert_eq!(detail.get("exit_code").and_then(|v| v.as_i64()), Some(3));
    assert!(
        detail
            .get("stderr")
            .and_then(|v| v.as_str())
            .is_some_and(|s| s.contains("oops"))
    );
}

#[test]
fn timeout_kills_the_subprocess_and_returns_promptly() {
    let mut server = Server::start_initialized("shell_timeout_kill");

    let marker = format!("wb_timeout_probe_{}", std::process::id());
    let started = Instant::now();
    let body = server.call_tool(
        "shell_exec",
        json!({
            "command": format!("sleep 5; echo {marker}"),
            "timeout_ms": 1000
        }),
    );
    let elapsed = started.elapsed();

    assert_eq!(error_code(&body), Some("TIMEOUT"));
    // Bounded: the envelope arrives shortly after the 1 s deadline, not
    // after the child's full 5 s sleep.
    assert!(
        elapsed < Duration::from_secs(3),
        "timeout envelope took {elapsed:?}"
    );

    // The server keeps serving after a timed-out call.
    let next = server.call_tool("shell_exec", json!({ "command": "echo alive" }));
    assert_success(&next);
}

#[test]
fn env_overrides_reach_the_command() {
    let mut server = Server::start_initialized("shell_env");

    let body = server.call_tool(
        "shell_exec",
        json!({
            "command": "printf %s \"$WB_PROBE\"",
            "env": { "WB_PROBE": "from-args" }
        }),
    );
    assert_success(&body);
    assert_eq!(
        body.get("result")
            .and_then(|v| v.get("stdout"))
            .and_then(|v| v.as_str()),
        Some("from-args")
    );
}

#[test]
fn non_string_env_values_are_invalid_input() {
    let mut server = Server::start_initialized("shell_env_invalid");

    let body = server.call_tool(
        "shell_exec",
        json!({ "command": "true", "env": { "N": 1 } }),
    );
    assert_eq!(error_code(&body), Some("INVALID_INPUT"));
}
