#![forbid(unsafe_code)]

use super::resolve_arg_path;
use crate::envelope::{ToolError, io_error};
use crate::registry::{RegistryError, ToolSpec};
use crate::{ServerContext, bool_arg, str_arg, u64_arg};
use serde_json::{Map, Value, json};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use wb_core::{FieldKind, FieldSpec};

const DEFAULT_READ_BYTES: u64 = 262_144;
const MAX_LIST_ENTRIES: u64 = 10_000;

pub(crate) fn specs() -> Result<Vec<ToolSpec>, RegistryError> {
    Ok(vec![
        ToolSpec::new(
            "fs_read",
            "Read a UTF-8 file inside the workspace root.",
            vec![
                FieldSpec::required("path", FieldKind::String),
                FieldSpec::with_default("max_bytes", FieldKind::Integer, json!(DEFAULT_READ_BYTES)),
                FieldSpec::with_default("offset", FieldKind::Integer, json!(0)),
            ],
            tool_fs_read,
        )?,
        ToolSpec::new(
            "fs_write",
            "Write (or append) a file inside the workspace root.",
            vec![
                FieldSpec::required("path", FieldKind::String),
                FieldSpec::required("content", FieldKind::String),
                FieldSpec::with_default("append", FieldKind::Boolean, json!(false)),
                FieldSpec::with_default("create_dirs", FieldKind::Boolean, json!(true)),
            ],
            tool_fs_write,
        )?,
        ToolSpec::new(
            "fs_list",
            "List directory entries inside the workspace root.",
            vec![
                FieldSpec::with_default("path", FieldKind::String, json!(".")),
                FieldSpec::with_default("recursive", FieldKind::Boolean, json!(false)),
                FieldSpec::with_default("max_entries", FieldKind::Integer, json!(500)),
            ],
            tool_fs_list,
        )?,
        ToolSpec::new(
            "fs_stat",
            "Stat a path inside the workspace root.",
            vec![FieldSpec::required("path", FieldKind::String)],
            tool_fs_stat,
        )?,
        ToolSpec::new(
            "fs_mkdir",
            "Create a directory (and parents) inside the workspace root.",
            vec![FieldSpec::required("path", FieldKind::String)],
            tool_fs_mkdir,
        )?,
        ToolSpec::new(
            "fs_remove",
            "Remove a file or directory inside the workspace root.",
            vec![
                FieldSpec::required("path", FieldKind::String),
                FieldSpec::with_default("recursive", FieldKind::Boolean, json!(false)),
            ],
            tool_fs_remove,
        )?,
        ToolSpec::new(
            "fs_search",
            "Search file names and UTF-8 file contents with a regex.",
            vec![
                FieldSpec::required("pattern", FieldKind::String),
                FieldSpec::with_default("path", FieldKind::String, json!(".")),
                FieldSpec::with_default("max_matches", FieldKind::Integer, json!(200)),
            ],
            tool_fs_search,
        )?,
    ])
}

fn tool_fs_read(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let path = resolve_arg_path(ctx, args, "path", "")?;
    let max_bytes = u64_arg(args, "max_bytes", DEFAULT_READ_BYTES);
    let offset = u64_arg(args, "offset", 0);

    let mut file = std::fs::File::open(&path)
        .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
    let total = file
        .metadata()
        .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?
        .len();

    if offset > 0 {
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
    }

    let mut buf = Vec::new();
    file.take(max_bytes)
        .read_to_end(&mut buf)
        .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
    let truncated = offset + (buf.len() as u64) < total;

    Ok(json!({
        "path": path.to_string_lossy(),
        "content": String::from_utf8_lossy(&buf),
        "size": total,
        "offset": offset,
        "truncated": truncated
    }))
}

fn tool_fs_write(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let path = resolve_arg_path(ctx, args, "path", "")?;
    let content = str_arg(args, "content");
    let append = bool_arg(args, "append", false);
    let create_dirs = bool_arg(args, "create_dirs", true);

    if create_dirs
        && let Some(parent) = path.parent()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| io_error(parent.to_string_lossy().to_string(), e))?;
    }

    let written = if append {
        use std::io::Write as _;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
        content.len()
    } else {
        std::fs::write(&path, content)
            .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
        content.len()
    };

    Ok(json!({
        "path": path.to_string_lossy(),
        "bytes_written": written,
        "append": append
    }))
}

fn tool_fs_list(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let path = resolve_arg_path(ctx, args, "path", ".")?;
    let recursive = bool_arg(args, "recursive", false);
    let max_entries = u64_arg(args, "max_entries", 500).min(MAX_LIST_ENTRIES) as usize;

    let mut entries = Vec::new();
    let mut truncated = false;
    walk(&path, recursive, max_entries, &mut entries, &mut truncated)?;

    Ok(json!({
        "path": path.to_string_lossy(),
        "entries": entries,
        "truncated": truncated
    }))
}

fn walk(
    dir: &Path,
    recursive: bool,
    max_entries: usize,
    out: &mut Vec<Value>,
    truncated: &mut bool,
) -> Result<(), ToolError> {
    let reader =
        std::fs::read_dir(dir).map_err(|e| io_error(dir.to_string_lossy().to_string(), e))?;

    let mut names = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|e| io_error(dir.to_string_lossy().to_string(), e))?;
        names.push(entry.path());
    }
    names.sort();

    for path in names {
        if out.len() >= max_entries {
            *truncated = true;
            return Ok(());
        }

        let meta = match std::fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            // Entry vanished between readdir and stat: skip it.
            Err(_) => continue,
        };
        let kind = if meta.is_dir() {
            "dir"
        } else if meta.file_type().is_symlink() {
            "symlink"
        } else {
            "file"
        };
        let size = if meta.is_file() { Some(meta.len()) } else { None };
        out.push(json!({
            "path": path.to_string_lossy(),
            "kind": kind,
            "size": size
        }));

        if recursive && meta.is_dir() {
            walk(&path, recursive, max_entries, out, truncated)?;
            if *truncated {
                return Ok(());
            }
        }
    }
    Ok(())
}

fn tool_fs_stat(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let path = resolve_arg_path(ctx, args, "path", "")?;
    let meta = std::fs::metadata(&path)
        .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;

    let modified = meta
        .modified()
        .ok()
        .map(crate::system_time_to_rfc3339);

    Ok(json!({
        "path": path.to_string_lossy(),
        "kind": if meta.is_dir() { "dir" } else { "file" },
        "size": meta.len(),
        "modified": modified
    }))
}

fn tool_fs_mkdir(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let path = resolve_arg_path(ctx, args, "path", "")?;
    std::fs::create_dir_all(&path)
        .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
    Ok(json!({ "path": path.to_string_lossy(), "created": true }))
}

fn tool_fs_remove(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let path = resolve_arg_path(ctx, args, "path", "")?;
    if path == ctx.config.workspace_root {
        return Err(ToolError::InvalidInput(
            "refusing to remove the workspace root itself".to_string(),
        ));
    }
    let recursive = bool_arg(args, "recursive", false);

    let meta = std::fs::symlink_metadata(&path)
        .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
    if meta.is_dir() {
        if recursive {
            std::fs::remove_dir_all(&path)
                .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
        } else {
            std::fs::remove_dir(&path)
                .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
        }
    } else {
        std::fs::remove_file(&path)
            .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
    }

    Ok(json!({ "path": path.to_string_lossy(), "removed": true }))
}

fn tool_fs_search(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let root = resolve_arg_path(ctx, args, "path", ".")?;
    let pattern = str_arg(args, "pattern");
    let max_matches = u64_arg(args, "max_matches", 200).min(5_000) as usize;

    let regex = regex::Regex::new(pattern)
        .map_err(|e| ToolError::InvalidInput(format!("pattern is not a valid regex: {e}")))?;

    let mut matches = Vec::new();
    let mut truncated = false;
    search_dir(&root, &regex, max_matches, &mut matches, &mut truncated)?;

    Ok(json!({
        "pattern": pattern,
        "matches": matches,
        "truncated": truncated
    }))
}

fn search_dir(
    dir: &Path,
    regex: &regex::Regex,
    max_matches: usize,
    out: &mut Vec<Value>,
    truncated: &mut bool,
) -> Result<(), ToolError> {
    let reader =
        std::fs::read_dir(dir).map_err(|e| io_error(dir.to_string_lossy().to_string(), e))?;
    let mut paths = Vec::new();
    for entry in reader {
        let entry = entry.map_err(|e| io_error(dir.to_string_lossy().to_string(), e))?;
        paths.push(entry.path());
    }
    paths.sort();

    for path in paths {
        if out.len() >= max_matches {
            *truncated = true;
            return Ok(());
        }
        let Ok(meta) = std::fs::symlink_metadata(&path) else {
            continue;
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if name == ".git" || name == ".workbench" || name == "node_modules" {
            continue;
        }

        if meta.is_dir() {
            search_dir(&path, regex, max_matches, out, truncated)?;
            if *truncated {
                return Ok(());
            }
            continue;
        }
        if !meta.is_file() {
            continue;
        }

        if regex.is_match(&name) {
            out.push(json!({
                "path": path.to_string_lossy(),
                "kind": "name"
            }));
            continue;
        }

        // Content search only makes sense for text; skip files that are not
        // valid UTF-8 rather than guessing an encoding.
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        for (idx, line) in text.lines().enumerate() {
            if out.len() >= max_matches {
                *truncated = true;
                return Ok(());
            }
            if regex.is_match(line) {
                out.push(json!({
                    "path": path.to_string_lossy(),
                    "kind": "content",
                    "line": idx + 1,
                    "text": line
                }));
            }
        }
    }
    Ok(())
}
