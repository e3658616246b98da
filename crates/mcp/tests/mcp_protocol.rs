#![forbid(unsafe_code)]

mod support;
use support::*;

use serde_json::json;

#[test]
fn initialize_reports_server_identity_and_tools_capability() {
    let mut server = Server::start("initialize_identity");

    let init = server.request(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": { "protocolVersion": "2024-11-05", "capabilities": {}, "clientInfo": { "name": "test", "version": "0" } }
    }));
    let result = init.get("result").expect("initialize must return result");
    assert_eq!(
        result
            .get("serverInfo")
            .and_then(|v| v.get("name"))
            .and_then(|v| v.as_str()),
        Some("workbench-mcp")
    );
    assert!(
        result
            .get("capabilities")
            .and_then(|v| v.get("tools"))
            .is_some()
    );
}

#[test]
fn tools_list_advertises_contracts_before_any_call() {
    let mut server = Server::start_initialized("tools_list_contracts");

    let tools_list = server.request(json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/list",
        "params": {}
    }));
    let tools = tools_list
        .get("result")
        .and_then(|v| v.get("tools"))
        .and_then(|v| v.as_array())
        .expect("result.tools");
    assert!(!tools.is_empty());

    // Every advertised tool carries a name, a description, and an object
    // schema for its arguments.
    for tool in tools {
        assert!(tool.get("name").and_then(|v| v.as_str()).is_some());
        assert!(tool.get("description").and_then(|v| v.as_str()).is_some());
        assert_eq!(
            tool.get("inputSchema")
                .and_then(|v| v.get("type"))
                .and_then(|v| v.as_str()),
            Some("object")
        );
    }

    let fs_read = tools
        .iter()
        .find(|tool| tool.get("name").and_then(|v| v.as_str()) == Some("fs_read"))
        .expect("fs_read advertised");
    let required = fs_read
        .get("inputSchema")
        .and_then(|v| v.get("required"))
        .and_then(|v| v.as_array())
        .expect("required list");
    assert!(required.iter().any(|v| v.as_str() == Some("path")));
}

#[test]
fn calls_before_initialize_are_rejected() {
    let mut server = Server::start("not_initialized_gate");

    let resp = server.request(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/list",
        "params": {}
    }));
    assert_eq!(
        resp.get("error").and_then(|v| v.get("code")).and_then(|v| v.as_i64()),
        Some(-32002)
    );
}

#[test]
fn write_then_read_round_trips_through_the_envelope() {
    let mut server = Server::start_initialized("write_read_roundtrip");

    let write = server.call_tool(
        "fs_write",
        json!({ "path": "notes/hello.txt", "content": "hi from the protocol test" }),
    );
    assert_success(&write);

    let read = server.call_tool("fs_read", json!({ "path": "notes/hello.txt" }));
    assert_success(&read);
    assert_eq!(
        read.get("result")
            .and_then(|v| v.get("content"))
            .and_then(|v| v.as_str()),
        Some("hi from the protocol test")
    );
}

#[test]
fn missing_required_field_cites_the_field() {
    let mut server = Server::start_initialized("missing_field_cited");

    let body = server.call_tool("fs_read", json!({}));
    assert_eq!(error_code(&body), Some("INVALID_INPUT"));
    assert!(
        body.get("error")
            .and_then(|v| v.get("message"))
            .and_then(|v| v.as_str())
            .is_some_and(|msg| msg.contains("path")),
        "validation error must cite the missing field: {body}"
    );
}

#[test]
fn extra_unknown_fields_are_tolerated() {
    let mut server = Server::start_initialized("unknown_field_tolerated");

    let write = server.call_tool(
        "fs_write",
        json!({ "path": "a.txt", "content": "x", "unknown_future_option": 42 }),
    );
    assert_success(&write);
}

#[test]
fn malformed_json_line_gets_a_parse_error_not_a_crash() {
    let mut server = Server::start_initialized("parse_error_recovery");

    server.send(json!({ "jsonrpc": "2.0", "id": 7, "method": "ping" }));
    let _ = server.recv();

    // Deliberately malformed line straight into the transport; the server
    // reports -32700 and keeps serving.
    server.write_raw("{this is not json\n");
    let err = server.recv();
    assert_eq!(
        err.get("error").and_then(|v| v.get("code")).and_then(|v| v.as_i64()),
        Some(-32700)
    );

    let pong = server.request(json!({ "jsonrpc": "2.0", "id": 8, "method": "ping" }));
    assert!(pong.get("result").is_some());
}

#[test]
fn unknown_method_is_reported_as_method_not_found() {
    let mut server = Server::start_initialized("unknown_method");

    let resp = server.request(json!({
        "jsonrpc": "2.0",
        "id": 9,
        "method": "tools/teleport",
        "params": {}
    }));
    assert_eq!(
        resp.get("error").and_then(|v| v.get("code")).and_then(|v| v.as_i64()),
        Some(-32601)
    );
}

#[test]
fn missing_credential_fails_the_remote_tool_only() {
    let mut server = Server::start_initialized("missing_credential");

    let body = server.call_tool(
        "github_repo",
        json!({ "owner": "octocat", "repo": "hello-world" }),
    );
    assert_eq!(error_code(&body), Some("MISSING_CREDENTIAL"));

    // The server is still healthy for local tools afterwards.
    let info = server.call_tool("server_info", json!({}));
    assert_success(&info);
    assert_eq!(
        info.get("result")
            .and_then(|v| v.get("credentials"))
            .and_then(|v| v.get("github"))
            .and_then(|v| v.as_bool()),
        Some(false)
    );
}
