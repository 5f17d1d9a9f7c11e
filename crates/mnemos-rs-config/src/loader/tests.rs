//! Tests for layered configuration loading.

use super::*;
use crate::{ChunkingConfig, SearchConfig};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Write JSON5 contents to a path, creating parent directories if needed.
fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// Options that only see layers created inside the temp dir.
fn isolated_options(root: &Path, cwd: &Path) -> LayeredConfigOptions {
    let mut options = LayeredConfigOptions::new(cwd).with_env(EnvSource::Disabled);
    options.system_config_path = Some(root.join("system.json5"));
    options.user_config_path = Some(root.join("user.json5"));
    options
}

fn env(vars: &[(&str, &str)]) -> EnvSource {
    EnvSource::Fixed(
        vars.iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    )
}

/// Verify that a minimal config parses with defaults.
#[test]
fn parse_minimal_config() {
    let config = MnemosConfig::load_from_str("{}").expect("config");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.embedding.model, "text-embedding-3-small");
    assert_eq!(config.embedding.dimensions, 1536);
    assert_eq!(config.vector_store.collection, "mnemos-memories");
    assert_eq!(config.chunking.chunk_size, 1000);
    assert_eq!(config.chunking.chunk_overlap, 200);
    assert_eq!(config.search.default_top_k, 10);
    assert_eq!(config.search.score_threshold, None);
}

/// Reject unexpected top-level config keys.
#[test]
fn rejects_unknown_top_level_key() {
    let err = MnemosConfig::load_from_str(r#"{ unexpected: true }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("unknown key"));
}

/// Reject unknown nested keys with the full path.
#[test]
fn rejects_unknown_nested_key() {
    let err = MnemosConfig::load_from_str(r#"{ chunking: { size: 10 } }"#).unwrap_err();
    let msg = format!("{err}");
    assert!(msg.contains("chunking.size"), "{msg}");
}

/// Reject wrongly typed values.
#[test]
fn rejects_wrong_value_type() {
    let err = MnemosConfig::load_from_str(r#"{ server: { port: "eighty" } }"#).unwrap_err();
    assert!(format!("{err}").contains("server.port"));
}

#[test]
fn rejects_overlap_not_smaller_than_chunk_size() {
    let err = MnemosConfig::load_from_str(r#"{ chunking: { chunk_size: 100, chunk_overlap: 100 } }"#)
        .unwrap_err();
    match err {
        ConfigError::InvalidField { path, .. } => assert_eq!(path, "chunking.chunk_overlap"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn rejects_out_of_range_score_threshold() {
    let err = MnemosConfig::load_from_str(r#"{ search: { score_threshold: 1.5 } }"#).unwrap_err();
    assert!(format!("{err}").contains("search.score_threshold"));
}

#[test]
fn rejects_unknown_store_provider() {
    let err =
        MnemosConfig::load_from_str(r#"{ vector_store: { provider: "pinecone" } }"#).unwrap_err();
    assert!(format!("{err}").contains("vector_store.provider"));
}

/// Later layers win: system < user < cwd < runtime.
#[test]
fn layered_config_precedence() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    let cwd = root.join("work");
    fs::create_dir_all(&cwd).expect("cwd");

    write_json5(
        &root.join("system.json5"),
        "{ vector_store: { collection: \"system\" }, server: { port: 9000 } }",
    );
    write_json5(
        &root.join("user.json5"),
        "{ vector_store: { collection: \"user\" } }",
    );
    write_json5(
        &cwd.join(DEFAULT_CONFIG_FILE),
        "{ vector_store: { collection: \"cwd\" }, chunking: { chunk_size: 500, chunk_overlap: 50 } }",
    );
    let runtime = root.join("runtime.json5");
    write_json5(&runtime, "{ vector_store: { collection: \"runtime\" } }");

    let options = isolated_options(root, &cwd).with_runtime_path(&runtime);
    let layered = MnemosConfig::load_layered_with_options(options).expect("layered");

    assert_eq!(layered.config.vector_store.collection, "runtime");
    assert_eq!(layered.config.server.port, 9000);
    assert_eq!(layered.config.chunking.chunk_size, 500);
    let sources: Vec<ConfigLayerSource> =
        layered.layers.iter().map(|layer| layer.source).collect();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::System,
            ConfigLayerSource::User,
            ConfigLayerSource::Cwd,
            ConfigLayerSource::Runtime,
        ]
    );
}

#[test]
fn missing_optional_layers_are_skipped() {
    let temp = TempDir::new().expect("tmp");
    let options = isolated_options(temp.path(), temp.path());
    let layered = MnemosConfig::load_layered_with_options(options).expect("layered");
    assert!(layered.layers.is_empty());
    assert_eq!(layered.config.server.port, 8080);
}

#[test]
fn missing_runtime_layer_is_an_error() {
    let temp = TempDir::new().expect("tmp");
    let options =
        isolated_options(temp.path(), temp.path()).with_runtime_path(temp.path().join("nope.json5"));
    let err = MnemosConfig::load_layered_with_options(options).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFailed(_)));
}

/// Environment overrides sit above every file layer.
#[test]
fn env_overrides_take_precedence() {
    let temp = TempDir::new().expect("tmp");
    let root = temp.path();
    write_json5(
        &root.join(DEFAULT_CONFIG_FILE),
        "{ server: { port: 7000 }, vector_store: { url: \"http://file:6333\" } }",
    );

    let options = isolated_options(root, root).with_env(env(&[
        ("MNEMOS_SERVER_PORT", "7100"),
        ("MNEMOS_QDRANT_URL", "http://env:6333"),
        ("MNEMOS_BOUNDARY_AWARE", "false"),
        ("MNEMOS_SCORE_THRESHOLD", "0.5"),
        ("MNEMOS_UNRELATED", "ignored"),
    ]));
    let layered = MnemosConfig::load_layered_with_options(options).expect("layered");

    assert_eq!(layered.config.server.port, 7100);
    assert_eq!(layered.config.vector_store.url, "http://env:6333");
    assert!(!layered.config.chunking.boundary_aware);
    assert_eq!(layered.config.search.score_threshold, Some(0.5));
    assert_eq!(
        layered.layers.last().map(|layer| layer.source),
        Some(ConfigLayerSource::Env)
    );
}

#[test]
fn env_override_with_bad_value_fails() {
    let temp = TempDir::new().expect("tmp");
    let options = isolated_options(temp.path(), temp.path())
        .with_env(env(&[("MNEMOS_CHUNK_SIZE", "lots")]));
    let err = MnemosConfig::load_layered_with_options(options).unwrap_err();
    match err {
        ConfigError::InvalidEnv { var, .. } => assert_eq!(var, "MNEMOS_CHUNK_SIZE"),
        other => panic!("unexpected error: {other}"),
    }
}

/// Env overrides are validated like any other layer once merged.
#[test]
fn env_override_still_validated() {
    let temp = TempDir::new().expect("tmp");
    let options = isolated_options(temp.path(), temp.path())
        .with_env(env(&[("MNEMOS_CHUNK_OVERLAP", "1000")]));
    let err = MnemosConfig::load_layered_with_options(options).unwrap_err();
    assert!(format!("{err}").contains("chunking.chunk_overlap"));
}

#[test]
fn builder_replaces_sections() {
    let config = MnemosConfig::builder()
        .chunking(ChunkingConfig {
            chunk_size: 256,
            chunk_overlap: 32,
            ..ChunkingConfig::default()
        })
        .search(SearchConfig {
            score_threshold: Some(0.5),
            ..SearchConfig::default()
        })
        .build();
    config.validate().expect("valid");
    assert_eq!(config.chunking.chunk_size, 256);
    assert_eq!(config.search.score_threshold, Some(0.5));
}

#[test]
fn load_from_path_reads_single_file() {
    let temp = TempDir::new().expect("tmp");
    let path = temp.path().join("custom.json5");
    write_json5(
        &path,
        "// comments are fine in json5\n{ vector_store: { provider: \"memory\" } }",
    );
    let config = MnemosConfig::load_from_path(&path).expect("config");
    assert_eq!(config.vector_store.provider, "memory");
}
