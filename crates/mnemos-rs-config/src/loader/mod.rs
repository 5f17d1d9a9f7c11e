//! Layered configuration loader with environment overrides.
//!
//! Discovers configuration layers (system/user/cwd/runtime), validates their
//! schema, merges them, applies `MNEMOS_*` environment overrides, and produces
//! a final `MnemosConfig`.

mod env;
mod files;
mod merge;
mod schema;

#[cfg(test)]
mod tests;

use crate::{ConfigError, MnemosConfig};
use log::{debug, info};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config filename in local layers.
const DEFAULT_CONFIG_FILE: &str = "mnemos.json5";
/// Default config directory under the user's home.
const DEFAULT_CONFIG_DIR: &str = ".mnemos";
/// Prefix for environment overrides.
const ENV_PREFIX: &str = "MNEMOS_";

#[cfg(unix)]
/// Default system config path on Unix.
const SYSTEM_CONFIG_PATH: &str = "/etc/mnemos/mnemos.json5";
#[cfg(windows)]
/// Default system config path on Windows.
const SYSTEM_CONFIG_PATH: &str = "C:\\ProgramData\\mnemos\\mnemos.json5";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: MnemosConfig,
    /// Metadata for each layer applied during load.
    pub layers: Vec<ConfigLayer>,
}

/// Origin for a single config layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// System-wide configuration.
    System,
    /// User-specific configuration.
    User,
    /// Current working directory configuration.
    Cwd,
    /// Runtime overrides passed on the command line.
    Runtime,
    /// `MNEMOS_*` environment variables (highest precedence).
    Env,
}

impl fmt::Display for ConfigLayerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::System => "system",
            Self::User => "user",
            Self::Cwd => "cwd",
            Self::Runtime => "runtime",
            Self::Env => "env",
        })
    }
}

/// Metadata about an applied config layer.
#[derive(Debug, Clone)]
pub struct ConfigLayer {
    /// Layer origin (system, user, runtime, etc).
    pub source: ConfigLayerSource,
    /// Location on disk for file layers.
    pub path: Option<PathBuf>,
}

/// Where environment overrides are read from.
#[derive(Debug, Clone, Default)]
pub enum EnvSource {
    /// Read the process environment.
    #[default]
    Process,
    /// Use a fixed set of variables (tests, embedding callers).
    Fixed(BTreeMap<String, String>),
    /// Skip environment overrides entirely.
    Disabled,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to resolve the cwd layer.
    pub cwd: PathBuf,
    /// Optional system config path (defaults to `/etc/mnemos/mnemos.json5` on Unix).
    pub system_config_path: Option<PathBuf>,
    /// Optional user config path (defaults to `~/.mnemos/mnemos.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Runtime override config paths applied after file layers.
    pub runtime_paths: Vec<PathBuf>,
    /// Environment override source applied last.
    pub env: EnvSource,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: files::system_config_path(),
            user_config_path: files::user_config_path(),
            runtime_paths: Vec::new(),
            env: EnvSource::Process,
        }
    }

    /// Add a runtime override config path.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Replace the environment override source.
    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self
    }
}

impl MnemosConfig {
    /// Load a single config from a path (no layering, no env overrides).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        let value: Value = json5::from_str(&contents)?;
        config_from_value(value, "config")
    }

    /// Load a single config from JSON5 contents (no layering, no env overrides).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        info!(
            "loading layered config with defaults (cwd={})",
            cwd.as_ref().display()
        );
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load a layered config stack using explicit layer locations and overrides.
    ///
    /// Layer precedence (low -> high): system, user, cwd, runtime, env.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = files::resolve(&options.cwd)?;
        debug!("normalized cwd for config load: {}", cwd.display());
        let mut layers = Vec::new();
        let mut merged = Value::Object(serde_json::Map::new());
        let mut seen_paths = HashSet::new();

        let cwd_path = cwd.join(DEFAULT_CONFIG_FILE);
        let file_layers = [
            (ConfigLayerSource::System, options.system_config_path.clone()),
            (ConfigLayerSource::User, options.user_config_path.clone()),
            (ConfigLayerSource::Cwd, Some(cwd_path)),
        ];
        for (source, path) in file_layers {
            let Some(path) = path else {
                continue;
            };
            if !seen_paths.insert(files::resolve(&path)?) {
                debug!(
                    "skipping duplicate layer (source={}, path={})",
                    source,
                    path.display()
                );
                continue;
            }
            if let Some(LoadedLayer { meta, value }) = files::read_layer(source, &path)? {
                debug!("loaded {} layer", source);
                merge::merge_layer(&mut merged, value);
                layers.push(meta);
            }
        }

        for runtime_path in &options.runtime_paths {
            let LoadedLayer { meta, value } =
                files::require_layer(ConfigLayerSource::Runtime, runtime_path)?;
            debug!("loaded runtime layer (path={})", runtime_path.display());
            merge::merge_layer(&mut merged, value);
            layers.push(meta);
        }

        let env_vars = match options.env {
            EnvSource::Process => Some(
                std::env::vars()
                    .filter(|(key, _)| key.starts_with(ENV_PREFIX))
                    .collect::<BTreeMap<_, _>>(),
            ),
            EnvSource::Fixed(vars) => Some(vars),
            EnvSource::Disabled => None,
        };
        if let Some(vars) = env_vars {
            let overlay = env::overrides_from_vars(&vars)?;
            if overlay.as_object().is_some_and(|map| !map.is_empty()) {
                debug!("applying environment overrides");
                merge::merge_layer(&mut merged, overlay);
                layers.push(ConfigLayer {
                    source: ConfigLayerSource::Env,
                    path: None,
                });
            }
        }

        let config = config_from_value(merged, "effective")?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(invalid("chunking.chunk_size", "must be greater than zero"));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(invalid(
                "chunking.chunk_overlap",
                "must be less than chunking.chunk_size",
            ));
        }
        if chunking.min_chunk_size > chunking.chunk_size {
            return Err(invalid(
                "chunking.min_chunk_size",
                "must not exceed chunking.chunk_size",
            ));
        }
        if !(0.0..=1.0).contains(&chunking.lookback_ratio) {
            return Err(invalid("chunking.lookback_ratio", "must be within [0, 1]"));
        }

        if self.embedding.dimensions == 0 {
            return Err(invalid("embedding.dimensions", "must be greater than zero"));
        }
        if self.embedding.max_concurrency == 0 {
            return Err(invalid(
                "embedding.max_concurrency",
                "must be greater than zero",
            ));
        }
        if self.embedding.provider != "openai" {
            return Err(invalid("embedding.provider", "expected \"openai\""));
        }

        if !matches!(self.vector_store.provider.as_str(), "qdrant" | "memory") {
            return Err(invalid(
                "vector_store.provider",
                "expected \"qdrant\" or \"memory\"",
            ));
        }
        if self.vector_store.collection.trim().is_empty() {
            return Err(invalid("vector_store.collection", "must not be empty"));
        }
        if self.vector_store.max_batch_size == Some(0) {
            return Err(invalid(
                "vector_store.max_batch_size",
                "must be greater than zero",
            ));
        }

        let search = &self.search;
        if search.max_top_k == 0 {
            return Err(invalid("search.max_top_k", "must be greater than zero"));
        }
        if search.default_top_k == 0 || search.default_top_k > search.max_top_k {
            return Err(invalid(
                "search.default_top_k",
                "must be within 1..=search.max_top_k",
            ));
        }
        if let Some(threshold) = search.score_threshold
            && !(0.0..=1.0).contains(&threshold)
        {
            return Err(invalid("search.score_threshold", "must be within [0, 1]"));
        }

        Ok(())
    }
}

/// Internal representation of a loaded config layer.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value, label: &str) -> Result<MnemosConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: MnemosConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}

fn invalid(path: &str, message: &str) -> ConfigError {
    ConfigError::InvalidField {
        path: path.to_string(),
        message: message.to_string(),
    }
}
