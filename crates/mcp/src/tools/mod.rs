#![forbid(unsafe_code)]

mod fs;
mod git;
mod logs;
mod meta;
mod pkg;
mod remote;
mod shell;

use crate::ServerContext;
use crate::envelope::ToolError;
use crate::registry::{RegistryError, ToolSpec};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Assemble the full tool surface by concatenating each capability module's
/// group, in a fixed order. Name collisions surface as a registry build
/// error and abort startup.
pub(crate) fn all_specs() -> Result<Vec<ToolSpec>, RegistryError> {
    let mut specs = Vec::new();
    specs.extend(fs::specs()?);
    specs.extend(shell::specs()?);
    specs.extend(git::specs()?);
    specs.extend(pkg::specs()?);
    specs.extend(logs::specs()?);
    specs.extend(remote::specs()?);
    specs.extend(meta::specs()?);
    Ok(specs)
}

/// Resolve a path argument against the workspace root. Confinement happens
/// here, before any I/O is attempted.
pub(crate) fn resolve_arg_path(
    ctx: &ServerContext,
    args: &Map<String, Value>,
    key: &str,
    fallback: &str,
) -> Result<PathBuf, ToolError> {
    let requested = crate::opt_str_arg(args, key).unwrap_or(fallback);
    Ok(wb_core::resolve_under_root(
        &ctx.config.workspace_root,
        requested,
    )?)
}

/// Working directory for subprocess-backed tools: optional `cwd` argument,
/// confined, defaulting to the workspace root.
pub(crate) fn resolve_cwd(
    ctx: &ServerContext,
    args: &Map<String, Value>,
) -> Result<PathBuf, ToolError> {
    resolve_arg_path(ctx, args, "cwd", ".")
}

/// Run an external command, mapping a non-zero exit to an operational
/// failure that carries the collaborator's own output verbatim.
pub(crate) fn run_checked(request: &wb_exec::ExecRequest) -> Result<wb_exec::ExecOutcome, ToolError> {
    let outcome = wb_exec::run(request)?;
    if !outcome.success() {
        return Err(ToolError::CommandFailed {
            program: request.program.clone(),
            exit_code: outcome.exit_code,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        });
    }
    Ok(outcome)
}
