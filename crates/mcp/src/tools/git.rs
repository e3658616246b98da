#![forbid(unsafe_code)]

use super::{resolve_arg_path, resolve_cwd, run_checked};
use crate::envelope::ToolError;
use crate::registry::{RegistryError, ToolSpec};
use crate::{ServerContext, bool_arg, opt_str_arg, str_arg, str_list_arg, u64_arg};
use serde_json::{Map, Value, json};
use std::path::Path;
use wb_core::{FieldKind, FieldSpec};
use wb_exec::ExecRequest;

static BRANCH_OPS: &[&str] = &["list", "create", "delete", "checkout"];
static STASH_OPS: &[&str] = &["push", "pop", "list"];

pub(crate) fn specs() -> Result<Vec<ToolSpec>, RegistryError> {
    Ok(vec![
        ToolSpec::new(
            "git_status",
            "Working-tree status (porcelain) for a repository in the workspace.",
            vec![FieldSpec::optional("cwd", FieldKind::String)],
            tool_git_status,
        )?,
        ToolSpec::new(
            "git_log",
            "Recent commits, newest first.",
            vec![
                FieldSpec::optional("cwd", FieldKind::String),
                FieldSpec::with_default("max_count", FieldKind::Integer, json!(20)),
                FieldSpec::optional("path", FieldKind::String),
            ],
            tool_git_log,
        )?,
        ToolSpec::new(
            "git_diff",
            "Diff the working tree, the index, or a named revision.",
            vec![
                FieldSpec::optional("cwd", FieldKind::String),
                FieldSpec::optional("target", FieldKind::String),
                FieldSpec::optional("path", FieldKind::String),
                FieldSpec::with_default("staged", FieldKind::Boolean, json!(false)),
            ],
            tool_git_diff,
        )?,
        ToolSpec::new(
            "git_branch",
            "List, create, delete, or checkout branches.",
            vec![
                FieldSpec::with_default("op", FieldKind::Enum(BRANCH_OPS), json!("list")),
                FieldSpec::optional("name", FieldKind::String),
                FieldSpec::optional("cwd", FieldKind::String),
            ],
            tool_git_branch,
        )?,
        ToolSpec::new(
            "git_add",
            "Stage paths for the next commit.",
            vec![
                FieldSpec::required("paths", FieldKind::Array(Box::new(FieldKind::String))),
                FieldSpec::optional("cwd", FieldKind::String),
            ],
            tool_git_add,
        )?,
        ToolSpec::new(
            "git_commit",
            "Create a commit from the staged changes.",
            vec![
                FieldSpec::required("message", FieldKind::String),
                FieldSpec::with_default("all", FieldKind::Boolean, json!(false)),
                FieldSpec::optional("cwd", FieldKind::String),
            ],
            tool_git_commit,
        )?,
        ToolSpec::new(
            "git_push",
            "Push the current or named branch to a remote.",
            vec![
                FieldSpec::with_default("remote", FieldKind::String, json!("origin")),
                FieldSpec::optional("branch", FieldKind::String),
                FieldSpec::optional("cwd", FieldKind::String),
            ],
            tool_git_push,
        )?,
        ToolSpec::new(
            "git_pull",
            "Pull from a remote.",
            vec![
                FieldSpec::with_default("remote", FieldKind::String, json!("origin")),
                FieldSpec::optional("branch", FieldKind::String),
                FieldSpec::optional("cwd", FieldKind::String),
            ],
            tool_git_pull,
        )?,
        ToolSpec::new(
            "git_clone",
            "Clone a repository to a destination inside the workspace root.",
            vec![
                FieldSpec::required("url", FieldKind::String),
                FieldSpec::optional("dest", FieldKind::String),
            ],
            tool_git_clone,
        )?,
        ToolSpec::new(
            "git_stash",
            "Stash, pop, or list stashed changes.",
            vec![
                FieldSpec::with_default("op", FieldKind::Enum(STASH_OPS), json!("list")),
                FieldSpec::optional("message", FieldKind::String),
                FieldSpec::optional("cwd", FieldKind::String),
            ],
            tool_git_stash,
        )?,
    ])
}

fn run_git(
    ctx: &ServerContext,
    cwd: &Path,
    args: Vec<String>,
) -> Result<wb_exec::ExecOutcome, ToolError> {
    let request = ExecRequest::new("git", cwd, ctx.config.exec_timeout).args(args);
    run_checked(&request)
}

fn tool_git_status(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let cwd = resolve_cwd(ctx, args)?;
    let outcome = run_git(ctx, &cwd, status_args())?;
    Ok(json!({ "status": outcome.stdout }))
}

fn status_args() -> Vec<String> {
    vec![
        "status".to_string(),
        "--porcelain=v1".to_string(),
        "--branch".to_string(),
    ]
}

fn tool_git_log(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let cwd = resolve_cwd(ctx, args)?;
    let max_count = u64_arg(args, "max_count", 20).clamp(1, 1_000);
    let outcome = run_git(ctx, &cwd, log_args(max_count, opt_str_arg(args, "path")))?;

    let commits = outcome
        .stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut parts = line.splitn(4, '\t');
            json!({
                "sha": parts.next().unwrap_or(""),
                "author": parts.next().unwrap_or(""),
                "date": parts.next().unwrap_or(""),
                "subject": parts.next().unwrap_or("")
            })
        })
        .collect::<Vec<_>>();

    Ok(json!({ "commits": commits }))
}

fn log_args(max_count: u64, path: Option<&str>) -> Vec<String> {
    let mut out = vec![
        "log".to_string(),
        format!("--max-count={max_count}"),
        "--pretty=format:%H%x09%an%x09%ad%x09%s".to_string(),
        "--date=iso-strict".to_string(),
    ];
    if let Some(path) = path {
        out.push("--".to_string());
        out.push(path.to_string());
    }
    out
}

fn tool_git_diff(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let cwd = resolve_cwd(ctx, args)?;
    let diff_args = diff_args(
        opt_str_arg(args, "target"),
        opt_str_arg(args, "path"),
        bool_arg(args, "staged", false),
    );
    let outcome = run_git(ctx, &cwd, diff_args)?;
    Ok(json!({ "diff": outcome.stdout }))
}

fn diff_args(target: Option<&str>, path: Option<&str>, staged: bool) -> Vec<String> {
    let mut out = vec!["diff".to_string()];
    if staged {
        out.push("--staged".to_string());
    }
    if let Some(target) = target {
        out.push(target.to_string());
    }
    if let Some(path) = path {
        out.push("--".to_string());
        out.push(path.to_string());
    }
    out
}

fn tool_git_branch(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let cwd = resolve_cwd(ctx, args)?;
    let op = str_arg(args, "op");
    let name = opt_str_arg(args, "name");

    let git_args = match (op, name) {
        ("list", _) => vec![
            "branch".to_string(),
            "--list".to_string(),
            "--format=%(refname:short)%09%(objectname:short)%09%(HEAD)".to_string(),
        ],
        ("create", Some(name)) => vec!["branch".to_string(), name.to_string()],
        ("delete", Some(name)) => vec!["branch".to_string(), "-d".to_string(), name.to_string()],
        ("checkout", Some(name)) => vec!["checkout".to_string(), name.to_string()],
        (op, None) => {
            return Err(ToolError::InvalidInput(format!(
                "name is required for op={op}"
            )));
        }
        _ => unreachable!("op is enum-validated"),
    };

    let outcome = run_git(ctx, &cwd, git_args)?;
    if op == "list" {
        let branches = outcome
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let mut parts = line.splitn(3, '\t');
                let name = parts.next().unwrap_or("");
                let sha = parts.next().unwrap_or("");
                let head = parts.next().unwrap_or("");
                json!({ "name": name, "sha": sha, "current": head == "*" })
            })
            .collect::<Vec<_>>();
        return Ok(json!({ "branches": branches }));
    }
    Ok(json!({ "op": op, "output": outcome.stdout }))
}

fn tool_git_add(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let cwd = resolve_cwd(ctx, args)?;
    let paths = str_list_arg(args, "paths");
    if paths.is_empty() {
        return Err(ToolError::InvalidInput("paths must not be empty".to_string()));
    }

    let mut git_args = vec!["add".to_string(), "--".to_string()];
    git_args.extend(paths.iter().cloned());
    run_git(ctx, &cwd, git_args)?;
    Ok(json!({ "staged": paths }))
}

fn tool_git_commit(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let cwd = resolve_cwd(ctx, args)?;
    let message = str_arg(args, "message");
    if message.trim().is_empty() {
        return Err(ToolError::InvalidInput("message must not be empty".to_string()));
    }

    let outcome = run_git(ctx, &cwd, commit_args(message, bool_arg(args, "all", false)))?;
    Ok(json!({ "output": outcome.stdout }))
}

fn commit_args(message: &str, all: bool) -> Vec<String> {
    let mut out = vec!["commit".to_string()];
    if all {
        out.push("-a".to_string());
    }
    out.push("-m".to_string());
    out.push(message.to_string());
    out
}

fn tool_git_push(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let cwd = resolve_cwd(ctx, args)?;
    let outcome = run_git(
        ctx,
        &cwd,
        remote_args("push", str_arg(args, "remote"), opt_str_arg(args, "branch")),
    )?;
    Ok(json!({ "output": merged_output(&outcome) }))
}

fn tool_git_pull(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let cwd = resolve_cwd(ctx, args)?;
    let outcome = run_git(
        ctx,
        &cwd,
        remote_args("pull", str_arg(args, "remote"), opt_str_arg(args, "branch")),
    )?;
    Ok(json!({ "output": merged_output(&outcome) }))
}

fn remote_args(verb: &str, remote: &str, branch: Option<&str>) -> Vec<String> {
    let mut out = vec![verb.to_string(), remote.to_string()];
    if let Some(branch) = branch {
        out.push(branch.to_string());
    }
    out
}

fn tool_git_clone(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let url = str_arg(args, "url");
    if url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url must not be empty".to_string()));
    }

    let dest = match opt_str_arg(args, "dest") {
        Some(dest) => resolve_arg_path(ctx, args, "dest", dest)?,
        None => {
            let derived = derive_clone_dir(url);
            wb_core::resolve_under_root(&ctx.config.workspace_root, &derived)?
        }
    };

    let request = ExecRequest::new("git", &ctx.config.workspace_root, ctx.config.install_timeout)
        .arg("clone")
        .arg(url)
        .arg(dest.to_string_lossy().to_string());
    let outcome = run_checked(&request)?;
    Ok(json!({
        "dest": dest.to_string_lossy(),
        "output": merged_output(&outcome)
    }))
}

/// `git clone` derives the checkout directory from the URL; mirror that so
/// the confined destination can be computed before the subprocess runs.
fn derive_clone_dir(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        "repository".to_string()
    } else {
        name.to_string()
    }
}

fn tool_git_stash(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let cwd = resolve_cwd(ctx, args)?;
    let op = str_arg(args, "op");

    let mut git_args = vec!["stash".to_string()];
    match op {
        "push" => {
            git_args.push("push".to_string());
            if let Some(message) = opt_str_arg(args, "message") {
                git_args.push("-m".to_string());
                git_args.push(message.to_string());
            }
        }
        "pop" => git_args.push("pop".to_string()),
        "list" => git_args.push("list".to_string()),
        _ => unreachable!("op is enum-validated"),
    }

    let outcome = run_git(ctx, &cwd, git_args)?;
    Ok(json!({ "op": op, "output": outcome.stdout }))
}

// git writes progress for push/pull to stderr even on success.
fn merged_output(outcome: &wb_exec::ExecOutcome) -> String {
    if outcome.stdout.trim().is_empty() {
        return outcome.stderr.clone();
    }
    if outcome.stderr.trim().is_empty() {
        return outcome.stdout.clone();
    }
    format!("{}\n{}", outcome.stdout.trim_end(), outcome.stderr.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_args_scope_to_a_path_after_the_separator() {
        let args = log_args(5, Some("src/lib.rs"));
        assert_eq!(args[1], "--max-count=5");
        let sep = args.iter().position(|a| a == "--").expect("separator");
        assert_eq!(args[sep + 1], "src/lib.rs");
    }

    #[test]
    fn diff_args_combine_staged_target_and_path() {
        assert_eq!(diff_args(None, None, false), vec!["diff"]);
        assert_eq!(diff_args(None, None, true), vec!["diff", "--staged"]);
        assert_eq!(
            diff_args(Some("main"), Some("README.md"), false),
            vec!["diff", "main", "--", "README.md"]
        );
    }

    #[test]
    fn commit_args_order_keeps_message_last() {
        assert_eq!(
            commit_args("fix: thing", true),
            vec!["commit", "-a", "-m", "fix: thing"]
        );
    }

    #[test]
    fn clone_dir_is_derived_from_the_url() {
        assert_eq!(derive_clone_dir("https://example.com/owner/repo.git"), "repo");
        assert_eq!(derive_clone_dir("git@host:owner/repo.git"), "repo");
        assert_eq!(derive_clone_dir("https://example.com/owner/repo/"), "repo");
    }
}
