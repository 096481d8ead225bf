//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`CourierSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `COURIER_*` environment variable overrides
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{CourierSettings, LogFormat};

/// Resolve the path to the settings file (`~/.courier/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".courier").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<CourierSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a value that fails
/// [`CourierSettings::validate`] is an error.
pub fn load_settings_from_path(path: &Path) -> Result<CourierSettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_layered(path: &Path) -> Result<CourierSettings> {
    let defaults = serde_json::to_value(CourierSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
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

/// Apply `COURIER_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut CourierSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are logged and ignored, leaving the file/default value.
pub fn apply_overrides_from<F>(settings: &mut CourierSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    if let Some(v) = env.u16_in("COURIER_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("COURIER_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.usize_in("COURIER_SEND_QUEUE", 1, 1_048_576) {
        settings.server.send_queue_capacity = v;
    }
    if let Some(v) = env.u16_in("COURIER_ADMIN_PORT", 0, 65535) {
        settings.server.admin_port = Some(v);
    }
    if let Some(v) = env.string("COURIER_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.string("COURIER_LOG_FORMAT") {
        match parse_log_format(&v) {
            Some(format) => settings.logging.format = format,
            None => tracing::warn!(key = "COURIER_LOG_FORMAT", value = %v, "invalid log format, ignoring"),
        }
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a log format name (case-insensitive).
pub fn parse_log_format(val: &str) -> Option<LogFormat> {
    match val.trim().to_lowercase().as_str() {
        "compact" | "text" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn u16_in(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = self.string(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn usize_in(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = self.string(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;
    use assert_matches::assert_matches;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({
            "server": {"port": 11211, "host": "0.0.0.0"}
        });
        let source = serde_json::json!({
            "server": {"port": 9000}
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9000);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4, 5]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4, 5]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 42);
    }

    // ── file loading ────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = read_layered(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.port, 11211);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9000, "adminPort": 9001}, "logging": {"format": "json"}}"#,
        )
        .unwrap();

        let settings = read_layered(&path).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.admin_port, Some(9001));
        assert_eq!(settings.server.send_queue_capacity, 1024);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        assert_matches!(read_layered(&path), Err(SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"sendQueueCapacity": 0}}"#).unwrap();

        assert_matches!(
            load_settings_from_path(&path),
            Err(SettingsError::InvalidValue(_))
        );
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut settings = CourierSettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("COURIER_PORT", "9100"),
                ("COURIER_HOST", "127.0.0.1"),
                ("COURIER_SEND_QUEUE", "64"),
                ("COURIER_ADMIN_PORT", "9101"),
                ("COURIER_LOG_LEVEL", "debug"),
                ("COURIER_LOG_FORMAT", "JSON"),
            ]),
        );
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.send_queue_capacity, 64);
        assert_eq!(settings.server.admin_port, Some(9101));
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = CourierSettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("COURIER_PORT", "99999"),
                ("COURIER_SEND_QUEUE", "0"),
                ("COURIER_LOG_FORMAT", "xml"),
                ("COURIER_HOST", ""),
            ]),
        );
        let defaults = CourierSettings::default();
        assert_eq!(settings.server.port, defaults.server.port);
        assert_eq!(settings.server.send_queue_capacity, defaults.server.send_queue_capacity);
        assert_eq!(settings.server.host, defaults.server.host);
        assert_eq!(settings.logging.format, LogFormat::Compact);
    }

    #[test]
    fn env_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 9000}}"#).unwrap();

        let mut settings = read_layered(&path).unwrap();
        apply_overrides_from(&mut settings, env(&[("COURIER_PORT", "9200")]));
        assert_eq!(settings.server.port, 9200);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_u16_valid_and_invalid() {
        assert_eq!(parse_u16_range("9090", 1, 65535), Some(9090));
        assert_eq!(parse_u16_range(" 80 ", 1, 65535), Some(80));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("99999", 1, 65535), None);
        assert_eq!(parse_u16_range("port", 1, 65535), None);
    }

    #[test]
    fn parse_usize_out_of_range() {
        assert_eq!(parse_usize_range("50", 1, 100), Some(50));
        assert_eq!(parse_usize_range("0", 1, 100), None);
        assert_eq!(parse_usize_range("200", 1, 100), None);
    }

    #[test]
    fn parse_log_format_variants() {
        assert_eq!(parse_log_format("compact"), Some(LogFormat::Compact));
        assert_eq!(parse_log_format("Text"), Some(LogFormat::Compact));
        assert_eq!(parse_log_format("json"), Some(LogFormat::Json));
        assert_eq!(parse_log_format("yaml"), None);
    }
}
