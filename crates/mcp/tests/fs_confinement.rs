#![forbid(unsafe_code)]

mod support;

use serde_json::json;
use support::*;

#[test]
fn traversal_outside_the_root_is_rejected_before_any_read() {
    let mut server = Server::start_initialized("confinement_read");

    let body = server.call_tool("fs_read", json!({ "path": "../../etc/passwd" }));
    assert_eq!(error_code(&body), Some("PATH_OUTSIDE_ROOT"));
    assert!(
        body.get("result")
            .and_then(|v| v.as_object())
            .is_some_and(|m| m.is_empty()),
        "no file contents may leak on a rejected path: {body}"
    );
}

#[test]
fn absolute_paths_outside_the_root_are_rejected() {
    let mut server = Server::start_initialized("confinement_absolute");

    let body = server.call_tool(
        "fs_write",
        json!({ "path": "/etc/workbench_should_never_exist", "content": "x" }),
    );
    assert_eq!(error_code(&body), Some("PATH_OUTSIDE_ROOT"));
    assert!(!std::path::Path::new("/etc/workbench_should_never_exist").exists());
}

#[test]
fn dot_dot_inside_the_tree_still_resolves() {
    let mut server = Server::start_initialized("confinement_internal_dotdot");

    assert_success(&server.call_tool(
        "fs_write",
        json!({ "path": "sub/dir/file.txt", "content": "nested" }),
    ));
    let read = server.call_tool("fs_read", json!({ "path": "sub/dir/../dir/file.txt" }));
    assert_success(&read);
    assert_eq!(
        read.get("result")
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str()),
        Some("nested")
    );
}

#[test]
fn confinement_applies_to_subprocess_working_directories() {
    let mut server = Server::start_initialized("confinement_cwd");

    let body = server.call_tool(
        "shell_exec",
        json!({ "command": "pwd", "cwd": "../.." }),
    );
    assert_eq!(error_code(&body), Some("PATH_OUTSIDE_ROOT"));
}

#[test]
fn removing_the_workspace_root_is_refused() {
    let mut server = Server::start_initialized("confinement_remove_root");

    let body = server.call_tool("fs_remove", json!({ "path": ".", "recursive": true }));
    assert_eq!(error_code(&body), Some("INVALID_INPUT"));
    assert!(server.workspace().exists());
}
