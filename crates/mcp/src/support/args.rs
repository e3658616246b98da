#![forbid(unsafe_code)]

use serde_json::{Map, Value};

// Accessors for arguments that already passed contract validation. Required
// fields are guaranteed present with the declared kind, so these never fail;
// the fallbacks only cover optional fields without defaults.

pub(crate) fn str_arg<'a>(args: &'a Map<String, Value>, key: &str) -> &'a str {
    args.get(key).and_then(|v| v.as_str()).unwrap_or_default()
}

pub(crate) fn opt_str_arg<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

pub(crate) fn u64_arg(args: &Map<String, Value>, key: &str, fallback: u64) -> u64 {
    args.get(key).and_then(|v| v.as_u64()).unwrap_or(fallback)
}

pub(crate) fn bool_arg(args: &Map<String, Value>, key: &str, fallback: bool) -> bool {
    args.get(key).and_then(|v| v.as_bool()).unwrap_or(fallback)
}

pub(crate) fn str_list_arg(args: &Map<String, Value>, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn obj_arg<'a>(
    args: &'a Map<String, Value>,
    key: &str,
) -> Option<&'a Map<String, Value>> {
    args.get(key).and_then(|v| v.as_object())
}
