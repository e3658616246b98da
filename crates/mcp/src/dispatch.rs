#![forbid(unsafe_code)]

use crate::envelope::{ToolError, tool_fail, tool_fail_from, tool_ok};
use crate::registry::ToolRegistry;
use crate::{ServerContext, tool_text_content};
use serde_json::{Value, json};
use std::panic::AssertUnwindSafe;

/// The single choke point every call flows through.
///
/// Three linear outcomes per call — unknown tool, validation failure, handler
/// success-or-error — all terminating in exactly one response envelope. The
/// handler runs inside `catch_unwind`, so even a panicking handler cannot take
/// the process down or leak an unstructured error to the transport.
pub(crate) fn dispatch(
    ctx: &ServerContext,
    registry: &ToolRegistry,
    name: &str,
    raw_args: &Value,
) -> Value {
    let Some(spec) = registry.lookup(name) else {
        return tool_fail(name, "UNKNOWN_TOOL", &format!("Unknown tool: {name}"));
    };

    let validated = match wb_core::validate(&spec.contract, raw_args) {
        Ok(args) => args,
        Err(err) => return tool_fail(name, "INVALID_INPUT", &err.message()),
    };

    match std::panic::catch_unwind(AssertUnwindSafe(|| (spec.handler)(ctx, &validated))) {
        Ok(Ok(result)) => tool_ok(name, result),
        Ok(Err(err)) => tool_fail_from(name, &err),
        Err(panic) => {
            let defect = ToolError::Internal(panic_message(panic.as_ref()));
            tool_fail_from(name, &defect)
        }
    }
}

/// Wrap a dispatch envelope into the `tools/call` result shape: one text
/// content block plus the error flag.
pub(crate) fn call_result(body: &Value) -> Value {
    json!({
        "content": [tool_text_content(body)],
        "isError": !body.get("success").and_then(|v| v.as_bool()).unwrap_or(false)
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        return (*msg).to_string();
    }
    if let Some(msg) = panic.downcast_ref::<String>() {
        return msg.clone();
    }
    "handler panicked".to_string()
}
