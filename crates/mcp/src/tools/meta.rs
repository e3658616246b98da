#![forbid(unsafe_code)]

use crate::envelope::ToolError;
use crate::registry::{RegistryError, ToolSpec};
use crate::ServerContext;
use serde_json::{Map, Value, json};

pub(crate) fn specs() -> Result<Vec<ToolSpec>, RegistryError> {
    Ok(vec![ToolSpec::new(
        "server_info",
        "Server identity, workspace root, and which credentials are configured.",
        Vec::new(),
        tool_server_info,
    )?])
}

fn tool_server_info(ctx: &ServerContext, _args: &Map<String, Value>) -> Result<Value, ToolError> {
    // Credential presence only; the values never leave the process.
    Ok(json!({
        "name": crate::SERVER_NAME,
        "version": crate::SERVER_VERSION,
        "build": crate::build_fingerprint(),
        "workspace_root": ctx.config.workspace_root.to_string_lossy(),
        "credentials": {
            "github": ctx.config.github_token.is_some(),
            "gitlab": ctx.config.gitlab_token.is_some()
        }
    }))
}
