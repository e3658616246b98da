#![forbid(unsafe_code)]

use super::resolve_arg_path;
use crate::envelope::{ToolError, io_error};
use crate::registry::{RegistryError, ToolSpec};
use crate::{ServerContext, bool_arg, str_arg, u64_arg};
use serde_json::{Map, Value, json};
use std::io::{Read, Seek, SeekFrom};
use wb_core::{FieldKind, FieldSpec};

const MAX_TAIL_LINES: u64 = 5_000;
// Tail reads scan at most this much from the end of the file, so tailing a
// multi-gigabyte log stays cheap.
const TAIL_SCAN_BYTES: u64 = 4 * 1024 * 1024;

pub(crate) fn specs() -> Result<Vec<ToolSpec>, RegistryError> {
    Ok(vec![
        ToolSpec::new(
            "log_tail",
            "Tail the last N lines of a log file inside the workspace root.",
            vec![
                FieldSpec::required("path", FieldKind::String),
                FieldSpec::with_default("lines", FieldKind::Integer, json!(100)),
            ],
            tool_log_tail,
        )?,
        ToolSpec::new(
            "log_grep",
            "Filter a log file's lines with a regex.",
            vec![
                FieldSpec::required("path", FieldKind::String),
                FieldSpec::required("pattern", FieldKind::String),
                FieldSpec::with_default("max_matches", FieldKind::Integer, json!(200)),
                FieldSpec::with_default("ignore_case", FieldKind::Boolean, json!(false)),
            ],
            tool_log_grep,
        )?,
    ])
}

fn tool_log_tail(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let path = resolve_arg_path(ctx, args, "path", "")?;
    let lines = u64_arg(args, "lines", 100).clamp(1, MAX_TAIL_LINES) as usize;

    let mut file = std::fs::File::open(&path)
        .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
    let len = file
        .metadata()
        .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?
        .len();

    let start = len.saturating_sub(TAIL_SCAN_BYTES);
    if start > 0 {
        file.seek(SeekFrom::Start(start))
            .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
    }
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;
    let text = String::from_utf8_lossy(&buf);

    let mut all = text.lines().collect::<Vec<_>>();
    // Seeking into the middle of the file leaves a partial first line.
    if start > 0 && !all.is_empty() {
        all.remove(0);
    }
    let tail_start = all.len().saturating_sub(lines);
    let tail = all[tail_start..].to_vec();

    Ok(json!({
        "path": path.to_string_lossy(),
        "lines": tail,
        "returned": tail.len(),
        "file_size": len
    }))
}

fn tool_log_grep(ctx: &ServerContext, args: &Map<String, Value>) -> Result<Value, ToolError> {
    let path = resolve_arg_path(ctx, args, "path", "")?;
    let pattern = str_arg(args, "pattern");
    let max_matches = u64_arg(args, "max_matches", 200).clamp(1, MAX_TAIL_LINES) as usize;
    let ignore_case = bool_arg(args, "ignore_case", false);

    let regex = regex::RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| ToolError::InvalidInput(format!("pattern is not a valid regex: {e}")))?;

    let text = std::fs::read_to_string(&path)
        .map_err(|e| io_error(path.to_string_lossy().to_string(), e))?;

    let mut matches = Vec::new();
    let mut truncated = false;
    for (idx, line) in text.lines().enumerate() {
        if matches.len() >= max_matches {
            truncated = true;
            break;
        }
        if regex.is_match(line) {
            matches.push(json!({ "line": idx + 1, "text": line }));
        }
    }

    Ok(json!({
        "path": path.to_string_lossy(),
        "pattern": pattern,
        "matches": matches,
        "truncated": truncated
    }))
}
