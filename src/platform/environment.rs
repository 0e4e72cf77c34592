//! Environment-sourced configuration lookup.
//!
//! Values come from, in order of precedence:
//! 1. individual `UTX_*` environment variables,
//! 2. the `UTX_CONFIG` variable (inline JSON, a path to a JSON file, or `key=value` pairs),
//! 3. a JSON file named by `UTX_CONFIG_PATH`,
//! 4. on wasm, the `__UTX_CONFIG__` global object.

use std::env;
use std::fs;
#[cfg(not(target_arch = "wasm32"))]
use std::path::Path;

use serde_json::{Map, Value};

/// Returns the merged configuration blob when one is available.
pub fn config_blob() -> Option<Map<String, Value>> {
    blob_from_env()
        .or_else(blob_from_path)
        .or_else(blob_from_global)
        .and_then(|value| value.as_object().cloned())
}

/// Looks up a single value: `env_key` wins over `blob_key` in the configuration blob.
pub fn config_value(blob_key: &str, env_key: &str) -> Option<String> {
    if let Ok(value) = env::var(env_key) {
        if !value.trim().is_empty() {
            return Some(value);
        }
    }

    let blob = config_blob()?;
    match blob.get(blob_key)? {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Interprets common truthy spellings (`1`, `true`, `yes`, `on`).
pub fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn blob_from_env() -> Option<Value> {
    let raw = env::var("UTX_CONFIG").ok()?;
    parse_config_source(&raw)
}

fn blob_from_path() -> Option<Value> {
    let path = env::var("UTX_CONFIG_PATH").ok()?;
    let content = fs::read_to_string(path).ok()?;
    parse_json_object(&content)
}

#[cfg(all(target_arch = "wasm32", feature = "wasm-web"))]
fn blob_from_global() -> Option<Value> {
    use wasm_bindgen::JsValue;

    let global = js_sys::global();
    let value = js_sys::Reflect::get(&global, &JsValue::from_str("__UTX_CONFIG__")).ok()?;
    if value.is_null() || value.is_undefined() {
        return None;
    }
    let serialized = js_sys::JSON::stringify(&value).ok()?.as_string()?;
    serde_json::from_str(&serialized).ok()
}

#[cfg(not(all(target_arch = "wasm32", feature = "wasm-web")))]
fn blob_from_global() -> Option<Value> {
    None
}

fn parse_json_object(raw: &str) -> Option<Value> {
    serde_json::from_str::<Value>(raw)
        .ok()
        .filter(Value::is_object)
}

fn parse_config_source(raw: &str) -> Option<Value> {
    if let Some(json) = parse_json_object(raw) {
        return Some(json);
    }

    if let Some(path) = treat_as_path(raw) {
        if let Ok(contents) = fs::read_to_string(&path) {
            if let Some(json) = parse_json_object(&contents) {
                return Some(json);
            }
        }
    }

    parse_key_value_config(raw)
}

#[cfg(not(target_arch = "wasm32"))]
fn treat_as_path(raw: &str) -> Option<String> {
    if raw.contains('=') {
        return None;
    }
    let trimmed = raw.trim();
    let path = Path::new(trimmed);
    if path.exists() {
        Some(trimmed.to_string())
    } else {
        None
    }
}

#[cfg(target_arch = "wasm32")]
fn treat_as_path(_raw: &str) -> Option<String> {
    None
}

fn parse_key_value_config(raw: &str) -> Option<Value> {
    let mut map = Map::new();
    for entry in raw.split(',') {
        let Some((key, value)) = entry.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_configs() {
        let value = parse_key_value_config("ga4GtagId=G-ABC, context=app").unwrap();
        let map = value.as_object().unwrap();
        assert_eq!(map.get("ga4GtagId").unwrap().as_str(), Some("G-ABC"));
        assert_eq!(map.get("context").unwrap().as_str(), Some("app"));
        assert!(parse_key_value_config("no pairs here").is_none());
    }

    #[test]
    fn parse_config_source_accepts_files_and_json() {
        let json = parse_config_source("{\"ga4GtagId\":\"G-JSON\"}").unwrap();
        assert_eq!(json["ga4GtagId"], "G-JSON");

        let mut path = std::env::temp_dir();
        path.push(format!(
            "utx_web_sdk_test_{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::write(&path, "{\"subContext\":\"docs\"}").unwrap();
        let path_str = path.to_string_lossy().to_string();
        let file_json = parse_config_source(&path_str).unwrap();
        assert_eq!(file_json["subContext"], "docs");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" YES "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
