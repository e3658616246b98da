#![forbid(unsafe_code)]

use super::resolve_cwd;
use crate::envelope::ToolError;
use crate::registry::{RegistryError, ToolSpec};
use crate::{ServerContext, obj_arg, str_arg, u64_arg};
use serde_json::{Map, Value, json};
use wb_core::{FieldKind, FieldSpec};
use wb_exec::ExecRequest;

pub(crate) fn specs() -> Result<Vec<ToolSpec>, RegistryError> {
    Ok(vec![ToolSpec::new(
        "shell_exec",
        "Run a shell command in the workspace with a wall-clock timeout.",
        vec![
            FieldSpec::required("command", FieldKind::String),
            FieldSpec::optional("cwd", FieldKind::String),
            FieldSpec::with_default(
                "timeout_ms",
                FieldKind::Integer,
                json!(crate::config::DEFAULT_EXEC_TIMEOUT_MS),
            ),
            FieldSpec::optional("env", FieldKind::Object),
        ],
        tool_shell_exec,
    )?])
}

fn tool_shell_exec(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let command = str_arg(args, "command");
    if command.trim().is_empty() {
        return Err(ToolError::InvalidInput("command must not be empty".to_string()));
    }
    let cwd = resolve_cwd(ctx, args)?;
    let timeout = ctx.config.clamp_timeout(u64_arg(
        args,
        "timeout_ms",
        ctx.config.exec_timeout.as_millis() as u64,
    ));

    let mut request = ExecRequest::new("sh", cwd, timeout).arg("-c").arg(command);
    if let Some(env) = obj_arg(args, "env") {
        for (key, value) in env.iter() {
            let Some(value) = value.as_str() else {
                return Err(ToolError::InvalidInput(format!(
                    "env.{key} must be a string"
                )));
            };
            request = request.env(key.clone(), value.to_string());
        }
    }

    let outcome = wb_exec::run(&request)?;
    if !outcome.success() {
        return Err(ToolError::CommandFailed {
            program: command.to_string(),
            exit_code: outcome.exit_code,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        });
    }

    Ok(json!({
        "command": command,
        "exit_code": outcome.exit_code,
        "stdout": outcome.stdout,
        "stderr": outcome.stderr,
        "duration_ms": outcome.duration_ms,
        "timed_out": false
    }))
}
