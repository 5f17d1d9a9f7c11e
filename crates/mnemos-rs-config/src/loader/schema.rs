//! Schema validation helpers for Mnemos JSON5 configuration.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    let allowed = [
        "$schema",
        "server",
        "embedding",
        "vector_store",
        "chunking",
        "search",
    ];
    ensure_allowed_keys(map, &allowed, layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("server") {
        validate_server(value, layer, "server")?;
    }
    if let Some(value) = map.get("embedding") {
        validate_embedding(value, layer, "embedding")?;
    }
    if let Some(value) = map.get("vector_store") {
        validate_vector_store(value, layer, "vector_store")?;
    }
    if let Some(value) = map.get("chunking") {
        validate_chunking(value, layer, "chunking")?;
    }
    if let Some(value) = map.get("search") {
        validate_search(value, layer, "search")?;
    }

    Ok(())
}

/// Validate the "server" block.
fn validate_server(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["host", "port", "log_level"], layer, path)?;

    if let Some(value) = map.get("host") {
        expect_string(value, layer, &join_path(path, "host"))?;
    }
    if let Some(value) = map.get("port") {
        expect_u64(value, layer, &join_path(path, "port"))?;
    }
    if let Some(value) = map.get("log_level") {
        let level_path = join_path(path, "log_level");
        let level = value
            .as_str()
            .ok_or_else(|| invalid_field(layer, &level_path, "expected string"))?;
        if !matches!(
            level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error" | "off"
        ) {
            return Err(invalid_field(layer, &level_path, "unknown log level"));
        }
    }
    Ok(())
}

/// Validate the "embedding" block.
fn validate_embedding(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "provider",
            "model",
            "dimensions",
            "base_url",
            "api_key_env",
            "timeout_ms",
            "max_concurrency",
        ],
        layer,
        path,
    )?;

    for key in ["provider", "model", "api_key_env"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("base_url") {
        expect_optional_string(value, layer, &join_path(path, "base_url"))?;
    }
    for key in ["dimensions", "timeout_ms", "max_concurrency"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate the "vector_store" block.
fn validate_vector_store(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "provider",
            "url",
            "collection",
            "api_key",
            "timeout_ms",
            "max_batch_size",
        ],
        layer,
        path,
    )?;

    for key in ["provider", "url", "collection"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("api_key") {
        expect_optional_string(value, layer, &join_path(path, "api_key"))?;
    }
    if let Some(value) = map.get("timeout_ms") {
        expect_u64(value, layer, &join_path(path, "timeout_ms"))?;
    }
    if let Some(value) = map.get("max_batch_size")
        && !value.is_null()
    {
        expect_u64(value, layer, &join_path(path, "max_batch_size"))?;
    }
    Ok(())
}

/// Validate the "chunking" block.
fn validate_chunking(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "chunk_size",
            "chunk_overlap",
            "min_chunk_size",
            "lookback_ratio",
            "boundary_aware",
            "preserve_long_tokens",
        ],
        layer,
        path,
    )?;

    for key in ["chunk_size", "chunk_overlap", "min_chunk_size"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("lookback_ratio") {
        expect_f64(value, layer, &join_path(path, "lookback_ratio"))?;
    }
    for key in ["boundary_aware", "preserve_long_tokens"] {
        if let Some(value) = map.get(key) {
            expect_bool(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate the "search" block.
fn validate_search(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &["default_top_k", "max_top_k", "score_threshold"],
        layer,
        path,
    )?;

    for key in ["default_top_k", "max_top_k"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("score_threshold")
        && !value.is_null()
    {
        expect_f64(value, layer, &join_path(path, "score_threshold"))?;
    }
    Ok(())
}

fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid_field(layer, path, "expected object")),
    }
}

/// Expect a JSON string or return a typed error.
fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.as_str().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

/// Expect a JSON string or null.
fn expect_optional_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_null() || value.as_str().is_some() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string or null"))
    }
}

/// Expect a JSON boolean or return a typed error.
fn expect_bool(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if matches!(value, Value::Bool(_)) {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected bool"))
    }
}

/// Expect a non-negative JSON integer or return a typed error.
fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

/// Expect a JSON number or return a typed error.
fn expect_f64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_f64() || value.is_u64() || value.is_i64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected number"))
    }
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    for key in map.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid_field(layer, &join_path(path, key), "unknown key"));
        }
    }
    Ok(())
}

/// Join nested paths for better error messages.
fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Build a structured invalid-field error.
fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let normalized_path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{normalized_path}"),
        message: message.to_string(),
    }
}
