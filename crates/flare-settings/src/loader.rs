//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::FlareSettings;

/// Load settings, optionally from a JSON file, then apply `FLARE_*` env
/// overrides and validate the result.
///
/// A missing file is an error here: the path was asked for explicitly.
pub fn load_settings(path: Option<&Path>) -> Result<FlareSettings> {
    let defaults = serde_json::to_value(FlareSettings::default())?;

    let merged = match path {
        Some(path) => {
            debug!(?path, "loading settings from file");
            let content = std::fs::read_to_string(path)?;
            let user: Value = serde_json::from_str(&content)?;
            deep_merge(defaults, user)
        }
        None => defaults,
    };

    let mut settings: FlareSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut FlareSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Each variable has strict parsing rules; invalid values are logged and
/// ignored (falling back to file/default):
///
/// | Variable | Target | Range |
/// |----------|--------|-------|
/// | `FLARE_HOST` | `server.host` | non-empty |
/// | `FLARE_PORT` | `server.port` | 0–65535 |
/// | `FLARE_RETRY_MS` | `server.retryMs` | 0–3 600 000 |
/// | `FLARE_QUEUE_CAPACITY` | `server.queueCapacity` | 1–1 048 576 |
/// | `FLARE_DROP_LIMIT` | `server.dropLimit` | any `u64` |
/// | `FLARE_LOG_LEVEL` | `logging.level` | non-empty |
/// | `FLARE_LOG_JSON` | `logging.json` | boolean |
pub fn apply_overrides_from(
    settings: &mut FlareSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("FLARE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("FLARE_PORT")
        .and_then(|v| parse_logged(&v, "FLARE_PORT", |s| s.parse::<u16>().ok()))
    {
        settings.server.port = v;
    }
    if let Some(v) = read("FLARE_RETRY_MS")
        .and_then(|v| parse_logged(&v, "FLARE_RETRY_MS", |s| parse_u64_range(s, 0, 3_600_000)))
    {
        settings.server.retry_ms = v;
    }
    if let Some(v) = read("FLARE_QUEUE_CAPACITY").and_then(|v| {
        parse_logged(&v, "FLARE_QUEUE_CAPACITY", |s| {
            parse_usize_range(s, 1, 1_048_576)
        })
    }) {
        settings.server.queue_capacity = v;
    }
    if let Some(v) = read("FLARE_DROP_LIMIT")
        .and_then(|v| parse_logged(&v, "FLARE_DROP_LIMIT", |s| s.parse::<u64>().ok()))
    {
        settings.server.drop_limit = v;
    }
    if let Some(v) = read("FLARE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read("FLARE_LOG_JSON")
        .and_then(|v| parse_logged(&v, "FLARE_LOG_JSON", parse_bool))
    {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn parse_logged<T>(val: &str, key: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let result = parse(val);
    if result.is_none() {
        tracing::warn!(key, value = %val, "invalid env var, ignoring");
    }
    result
}
