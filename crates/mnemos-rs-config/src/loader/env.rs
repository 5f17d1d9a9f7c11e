//! `MNEMOS_*` environment overrides, translated into a JSON overlay layer.

use crate::ConfigError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Value kind expected by an override, used to coerce the raw string.
#[derive(Debug, Clone, Copy)]
enum EnvKind {
    String,
    Integer,
    Float,
    Bool,
}

/// Supported overrides: variable name, config path, value kind.
const ENV_OVERRIDES: &[(&str, &[&str], EnvKind)] = &[
    ("MNEMOS_SERVER_HOST", &["server", "host"], EnvKind::String),
    ("MNEMOS_SERVER_PORT", &["server", "port"], EnvKind::Integer),
    ("MNEMOS_LOG_LEVEL", &["server", "log_level"], EnvKind::String),
    ("MNEMOS_EMBEDDING_MODEL", &["embedding", "model"], EnvKind::String),
    (
        "MNEMOS_EMBEDDING_DIMENSIONS",
        &["embedding", "dimensions"],
        EnvKind::Integer,
    ),
    (
        "MNEMOS_EMBEDDING_BASE_URL",
        &["embedding", "base_url"],
        EnvKind::String,
    ),
    (
        "MNEMOS_EMBEDDING_MAX_CONCURRENCY",
        &["embedding", "max_concurrency"],
        EnvKind::Integer,
    ),
    (
        "MNEMOS_VECTOR_STORE",
        &["vector_store", "provider"],
        EnvKind::String,
    ),
    ("MNEMOS_QDRANT_URL", &["vector_store", "url"], EnvKind::String),
    (
        "MNEMOS_QDRANT_COLLECTION",
        &["vector_store", "collection"],
        EnvKind::String,
    ),
    (
        "MNEMOS_QDRANT_API_KEY",
        &["vector_store", "api_key"],
        EnvKind::String,
    ),
    ("MNEMOS_CHUNK_SIZE", &["chunking", "chunk_size"], EnvKind::Integer),
    (
        "MNEMOS_CHUNK_OVERLAP",
        &["chunking", "chunk_overlap"],
        EnvKind::Integer,
    ),
    (
        "MNEMOS_MIN_CHUNK_SIZE",
        &["chunking", "min_chunk_size"],
        EnvKind::Integer,
    ),
    (
        "MNEMOS_BOUNDARY_AWARE",
        &["chunking", "boundary_aware"],
        EnvKind::Bool,
    ),
    ("MNEMOS_TOP_K", &["search", "default_top_k"], EnvKind::Integer),
    (
        "MNEMOS_SCORE_THRESHOLD",
        &["search", "score_threshold"],
        EnvKind::Float,
    ),
];

/// Build a JSON overlay from the recognized variables in `vars`.
///
/// Unknown `MNEMOS_*` variables are ignored; recognized ones with values that
/// do not parse fail the load instead of being silently dropped.
pub(super) fn overrides_from_vars(vars: &BTreeMap<String, String>) -> Result<Value, ConfigError> {
    let mut overlay = Value::Object(Map::new());
    for (name, path, kind) in ENV_OVERRIDES {
        let Some(raw) = vars.get(*name) else {
            continue;
        };
        let value = coerce(name, raw, *kind)?;
        insert_path(&mut overlay, path, value);
    }
    Ok(overlay)
}

fn coerce(name: &str, raw: &str, kind: EnvKind) -> Result<Value, ConfigError> {
    let raw = raw.trim();
    let invalid = |message: &str| ConfigError::InvalidEnv {
        var: name.to_string(),
        message: message.to_string(),
    };
    match kind {
        EnvKind::String => Ok(Value::String(raw.to_string())),
        EnvKind::Integer => raw
            .parse::<u64>()
            .map(Value::from)
            .map_err(|_| invalid("expected a non-negative integer")),
        EnvKind::Float => {
            let parsed = raw
                .parse::<f64>()
                .map_err(|_| invalid("expected a number"))?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| invalid("expected a finite number"))
        }
        EnvKind::Bool => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Value::Bool(true)),
            "0" | "false" | "no" | "off" => Ok(Value::Bool(false)),
            _ => Err(invalid("expected a boolean")),
        },
    }
}

fn insert_path(root: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut cursor = root;
    for segment in parents {
        let Value::Object(map) = cursor else {
            return;
        };
        cursor = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if let Value::Object(map) = cursor {
        map.insert(last.to_string(), value);
    }
}
