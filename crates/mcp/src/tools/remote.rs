#![forbid(unsafe_code)]

use crate::envelope::ToolError;
use crate::registry::{RegistryError, ToolSpec};
use crate::{ServerContext, opt_str_arg, str_arg, u64_arg};
use serde_json::{Map, Value, json};
use wb_core::{FieldKind, FieldSpec};

static PR_STATES: &[&str] = &["open", "closed", "all"];
static MR_STATES: &[&str] = &["opened", "closed", "merged", "all"];

pub(crate) fn specs() -> Result<Vec<ToolSpec>, RegistryError> {
    Ok(vec![
        ToolSpec::new(
            "github_repo",
            "Repository metadata from the GitHub API.",
            vec![
                FieldSpec::required("owner", FieldKind::String),
                FieldSpec::required("repo", FieldKind::String),
            ],
            tool_github_repo,
        )?,
        ToolSpec::new(
            "github_pulls",
            "List pull requests for a GitHub repository.",
            vec![
                FieldSpec::required("owner", FieldKind::String),
                FieldSpec::required("repo", FieldKind::String),
                FieldSpec::with_default("state", FieldKind::Enum(PR_STATES), json!("open")),
                FieldSpec::with_default("per_page", FieldKind::Integer, json!(20)),
            ],
            tool_github_pulls,
        )?,
        ToolSpec::new(
            "github_workflow_runs",
            "Recent GitHub Actions workflow runs.",
            vec![
                FieldSpec::required("owner", FieldKind::String),
                FieldSpec::required("repo", FieldKind::String),
                FieldSpec::optional("branch", FieldKind::String),
                FieldSpec::with_default("per_page", FieldKind::Integer, json!(10)),
            ],
            tool_github_workflow_runs,
        )?,
        ToolSpec::new(
            "gitlab_pipelines",
            "Recent GitLab CI pipelines for a project.",
            vec![
                FieldSpec::required("project", FieldKind::String),
                FieldSpec::optional("ref", FieldKind::String),
                FieldSpec::with_default("per_page", FieldKind::Integer, json!(10)),
            ],
            tool_gitlab_pipelines,
        )?,
        ToolSpec::new(
            "gitlab_merge_requests",
            "List merge requests for a GitLab project.",
            vec![
                FieldSpec::required("project", FieldKind::String),
                FieldSpec::with_default("state", FieldKind::Enum(MR_STATES), json!("opened")),
                FieldSpec::with_default("per_page", FieldKind::Integer, json!(20)),
            ],
            tool_gitlab_merge_requests,
        )?,
    ])
}

fn github_token(ctx: &ServerContext) -> Result<&str, ToolError> {
    ctx.config
        .github_token
        .as_deref()
        .ok_or(ToolError::MissingCredential { env_var: "GITHUB_TOKEN" })
}

fn gitlab_token(ctx: &ServerContext) -> Result<&str, ToolError> {
    ctx.config
        .gitlab_token
        .as_deref()
        .ok_or(ToolError::MissingCredential { env_var: "GITLAB_TOKEN" })
}

fn get_json(
    ctx: &ServerContext,
    url: &str,
    headers: &[(&str, String)],
) -> Result<Value, ToolError> {
    let mut request = ctx.http.get(url);
    for (key, value) in headers {
        request = request.header(*key, value.as_str());
    }

    let response = request
        .send()
        .map_err(|e| ToolError::HttpTransport(e.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| ToolError::HttpTransport(e.to_string()))?;

    if !status.is_success() {
        return Err(ToolError::Http {
            status: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| ToolError::HttpTransport(format!(
        "response from {url} is not valid JSON: {e}"
    )))
}

fn github_get(ctx: &ServerContext, path_and_query: &str) -> Result<Value, ToolError> {
    let token = github_token(ctx)?;
    let url = format!("https://api.github.com{path_and_query}");
    get_json(
        ctx,
        &url,
        &[
            ("Authorization", format!("Bearer {token}")),
            ("Accept", "application/vnd.github+json".to_string()),
            ("X-GitHub-Api-Version", "2022-11-28".to_string()),
        ],
    )
}

fn gitlab_get(ctx: &ServerContext, path_and_query: &str) -> Result<Value, ToolError> {
    let token = gitlab_token(ctx)?;
    let url = format!("{}/api/v4{path_and_query}", ctx.config.gitlab_host);
    get_json(ctx, &url, &[("PRIVATE-TOKEN", token.to_string())])
}

/// GitLab accepts a numeric project id or a URL-encoded full path.
fn encode_project(project: &str) -> String {
    project.replace('/', "%2F")
}

fn per_page(args: &Map<String, Value>, fallback: u64) -> u64 {
    u64_arg(args, "per_page", fallback).clamp(1, 100)
}

fn tool_github_repo(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let owner = str_arg(args, "owner");
    let repo = str_arg(args, "repo");
    let data = github_get(ctx, &format!("/repos/{owner}/{repo}"))?;

    Ok(json!({
        "full_name": data.get("full_name"),
        "description": data.get("description"),
        "default_branch": data.get("default_branch"),
        "visibility": data.get("visibility"),
        "stars": data.get("stargazers_count"),
        "forks": data.get("forks_count"),
        "open_issues": data.get("open_issues_count"),
        "pushed_at": data.get("pushed_at")
    }))
}

fn tool_github_pulls(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let owner = str_arg(args, "owner");
    let repo = str_arg(args, "repo");
    let state = str_arg(args, "state");
    let per_page = per_page(args, 20);

    let data = github_get(
        ctx,
        &format!("/repos/{owner}/{repo}/pulls?state={state}&per_page={per_page}"),
    )?;

    let pulls = data
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|pr| {
                    json!({
                        "number": pr.get("number"),
                        "title": pr.get("title"),
                        "state": pr.get("state"),
                        "author": pr.get("user").and_then(|u| u.get("login")),
                        "head": pr.get("head").and_then(|h| h.get("ref")),
                        "base": pr.get("base").and_then(|b| b.get("ref")),
                        "draft": pr.get("draft"),
                        "updated_at": pr.get("updated_at")
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(json!({ "pulls": pulls }))
}

fn tool_github_workflow_runs(
    ctx: &ServerContext,
    args: &Map<String, Value>,
) -> Result<Value, ToolError> {
    let owner = str_arg(args, "owner");
    let repo = str_arg(args, "repo");
    let per_page = per_page(args, 10);

    let mut path = format!("/repos/{owner}/{repo}/actions/runs?per_page={per_page}");
    if let Some(branch) = opt_str_arg(args, "branch") {
        path.push_str(&format!("&branch={branch}"));
    }
    let data = github_get(ctx, &path)?;

    let runs = data
        .get("workflow_runs")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|run| {
                    json!({
                        "id": run.get("id"),
                        "name": run.get("name"),
                        "head_branch": run.get("head_branch"),
                        "event": run.get("event"),
                        "status": run.get("status"),
                        "conclusion": run.get("conclusion"),
                        "updated_at": run.get("updated_at"),
                        "html_url": run.get("html_url")
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(json!({ "runs": runs }))
}

fn tool_gitlab_pipelines(
    ctx: &ServerContext,
    args: &Map<String, Value>,
) -> Result<Value, ToolError> {
    let project = encode_project(str_arg(args, "project"));
    let per_page = per_page(args, 10);

    let mut path = format!("/projects/{project}/pipelines?per_page={per_page}");
    if let Some(r) = opt_str_arg(args, "ref") {
        path.push_str(&format!("&ref={r}"));
    }
    let data = gitlab_get(ctx, &path)?;

    let pipelines = data
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|p| {
                    json!({
                        "id": p.get("id"),
                        "ref": p.get("ref"),
                        "status": p.get("status"),
                        "source": p.get("source"),
                        "updated_at": p.get("updated_at"),
                        "web_url": p.get("web_url")
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(json!({ "pipelines": pipelines }))
}

fn tool_gitlab_merge_requests(
    ctx: &ServerContext,
    args: &Map<String, Value>,
) -> Result<Value, ToolError> {
    let project = encode_project(str_arg(args, "project"));
    let state = str_arg(args, "state");
    let per_page = per_page(args, 20);

    let data = gitlab_get(
        ctx,
        &format!("/projects/{project}/merge_requests?state={state}&per_page={per_page}"),
    )?;

    let merge_requests = data
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|mr| {
                    json!({
                        "iid": mr.get("iid"),
                        "title": mr.get("title"),
                        "state": mr.get("state"),
                        "author": mr.get("author").and_then(|a| a.get("username")),
                        "source_branch": mr.get("source_branch"),
                        "target_branch": mr.get("target_branch"),
                        "updated_at": mr.get("updated_at"),
                        "web_url": mr.get("web_url")
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    Ok(json!({ "merge_requests": merge_requests }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    fn ctx_without_tokens() -> ServerContext {
        ServerContext::new(ServerConfig::new(std::env::temp_dir())).expect("ctx")
    }

    #[test]
    fn missing_github_token_fails_the_call_only() {
        let ctx = ctx_without_tokens();
        let mut args = Map::new();
        args.insert("owner".to_string(), json!("octocat"));
        args.insert("repo".to_string(), json!("hello-world"));

        let err = tool_github_repo(&ctx, &args).unwrap_err();
        assert!(matches!(
            err,
            ToolError::MissingCredential { env_var: "GITHUB_TOKEN" }
        ));
    }

    #[test]
    fn missing_gitlab_token_fails_the_call_only() {
        let ctx = ctx_without_tokens();
        let mut args = Map::new();
        args.insert("project".to_string(), json!("group/proj"));
        args.insert("state".to_string(), json!("opened"));

        let err = tool_gitlab_merge_requests(&ctx, &args).unwrap_err();
        assert!(matches!(
            err,
            ToolError::MissingCredential { env_var: "GITLAB_TOKEN" }
        ));
    }

    #[test]
    fn gitlab_project_paths_are_url_encoded() {
        assert_eq!(encode_project("group/sub/proj"), "group%2Fsub%2Fproj");
        assert_eq!(encode_project("12345"), "12345");
    }
}
