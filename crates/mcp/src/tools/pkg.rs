#![forbid(unsafe_code)]

use super::{resolve_cwd, run_checked};
use crate::envelope::ToolError;
use crate::registry::{RegistryError, ToolSpec};
use crate::{ServerContext, bool_arg, str_arg, str_list_arg};
use serde_json::{Map, Value, json};
use wb_core::{FieldKind, FieldSpec};
use wb_exec::ExecRequest;

static MANAGERS: &[&str] = &["npm", "pip"];

pub(crate) fn specs() -> Result<Vec<ToolSpec>, RegistryError> {
    Ok(vec![
        ToolSpec::new(
            "pkg_install",
            "Install dependencies via npm or pip (long timeout).",
            vec![
                FieldSpec::required("manager", FieldKind::Enum(MANAGERS)),
                FieldSpec::optional("packages", FieldKind::Array(Box::new(FieldKind::String))),
                FieldSpec::with_default("dev", FieldKind::Boolean, json!(false)),
                FieldSpec::optional("cwd", FieldKind::String),
            ],
            tool_pkg_install,
        )?,
        ToolSpec::new(
            "pkg_run",
            "Run an npm script.",
            vec![
                FieldSpec::required("script", FieldKind::String),
                FieldSpec::optional("args", FieldKind::Array(Box::new(FieldKind::String))),
                FieldSpec::optional("cwd", FieldKind::String),
            ],
            tool_pkg_run,
        )?,
        ToolSpec::new(
            "pkg_list",
            "List installed top-level packages for npm or pip.",
            vec![
                FieldSpec::required("manager", FieldKind::Enum(MANAGERS)),
                FieldSpec::optional("cwd", FieldKind::String),
            ],
            tool_pkg_list,
        )?,
    ])
}

fn tool_pkg_install(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let cwd = resolve_cwd(ctx, args)?;
    let manager = str_arg(args, "manager");
    let packages = str_list_arg(args, "packages");
    let dev = bool_arg(args, "dev", false);

    let cmd_args = install_args(manager, &packages, dev)?;
    let request =
        ExecRequest::new(manager, cwd, ctx.config.install_timeout).args(cmd_args);
    let outcome = run_checked(&request)?;

    Ok(json!({
        "manager": manager,
        "packages": packages,
        "output": outcome.stdout,
        "duration_ms": outcome.duration_ms
    }))
}

fn install_args(manager: &str, packages: &[String], dev: bool) -> Result<Vec<String>, ToolError> {
    match manager {
        "npm" => {
            let mut out = vec!["install".to_string()];
            if dev {
                out.push("--save-dev".to_string());
            }
            out.extend(packages.iter().cloned());
            Ok(out)
        }
        "pip" => {
            // pip has no "install everything" default; an empty package list
            // would just print usage and confuse the caller.
            if packages.is_empty() {
                return Err(ToolError::InvalidInput(
                    "packages is required for manager=pip".to_string(),
                ));
            }
            let mut out = vec!["install".to_string()];
            out.extend(packages.iter().cloned());
            Ok(out)
        }
        _ => unreachable!("manager is enum-validated"),
    }
}

fn tool_pkg_run(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let cwd = resolve_cwd(ctx, args)?;
    let script = str_arg(args, "script");
    if script.trim().is_empty() {
        return Err(ToolError::InvalidInput("script must not be empty".to_string()));
    }
    let extra = str_list_arg(args, "args");

    let mut cmd_args = vec!["run".to_string(), script.to_string()];
    if !extra.is_empty() {
        cmd_args.push("--".to_string());
        cmd_args.extend(extra.iter().cloned());
    }

    let request = ExecRequest::new("npm", cwd, ctx.config.exec_timeout).args(cmd_args);
    let outcome = run_checked(&request)?;
    Ok(json!({
        "script": script,
        "output": outcome.stdout,
        "duration_ms": outcome.duration_ms
    }))
}

fn tool_pkg_list(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let cwd = resolve_cwd(ctx, args)?;
    let manager = str_arg(args, "manager");

    let cmd_args: Vec<String> = match manager {
        "npm" => ["ls", "--depth=0", "--json"]
            .into_iter()
            .map(String::from)
            .collect(),
        "pip" => ["list", "--format=json"]
            .into_iter()
            .map(String::from)
            .collect(),
        _ => unreachable!("manager is enum-validated"),
    };

    let request = ExecRequest::new(manager, cwd, ctx.config.exec_timeout).args(cmd_args);
    let outcome = run_checked(&request)?;

    // Both managers emit JSON; fall back to the raw text if parsing fails so
    // the caller still sees what the collaborator said.
    match serde_json::from_str::<Value>(&outcome.stdout) {
        Ok(parsed) => Ok(json!({ "manager": manager, "packages": parsed })),
        Err(_) => Ok(json!({ "manager": manager, "raw": outcome.stdout })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn npm_install_with_dev_flag() {
        let args = install_args("npm", &["left-pad".to_string()], true).expect("args");
        assert_eq!(args, vec!["install", "--save-dev", "left-pad"]);
    }

    #[test]
    fn npm_install_without_packages_installs_the_manifest() {
        let args = install_args("npm", &[], false).expect("args");
        assert_eq!(args, vec!["install"]);
    }

    #[test]
    fn pip_install_requires_packages() {
        let err = install_args("pip", &[], false).unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
