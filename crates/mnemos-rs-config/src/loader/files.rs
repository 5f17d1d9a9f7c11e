//! Config layer files: default locations, reading and path resolution.

use super::{
    ConfigLayer, ConfigLayerSource, DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILE, LoadedLayer,
    SYSTEM_CONFIG_PATH, schema,
};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub(super) fn system_config_path() -> Option<PathBuf> {
    Some(PathBuf::from(SYSTEM_CONFIG_PATH))
}

/// `~/.mnemos/mnemos.json5`, when a home directory is known.
pub(super) fn user_config_path() -> Option<PathBuf> {
    let dirs = UserDirs::new()?;
    Some(
        dirs.home_dir()
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILE),
    )
}

/// Canonical form of `path`, or `path` unchanged when it does not exist.
pub(super) fn resolve(path: &Path) -> Result<PathBuf, ConfigError> {
    match path.canonicalize() {
        Ok(resolved) => Ok(resolved),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(err) => Err(err.into()),
    }
}

/// Read and schema-check a layer; `None` when the file is absent.
pub(super) fn read_layer(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<Option<LoadedLayer>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(
                "config layer absent (source={}, path={})",
                source,
                path.display()
            );
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    debug!(
        "parsing config layer (source={}, path={}, bytes={})",
        source,
        path.display(),
        contents.len()
    );
    let value: Value = json5::from_str(&contents)?;
    schema::validate_layer_schema(&value, &format!("{source}({})", path.display()))?;
    Ok(Some(LoadedLayer {
        meta: ConfigLayer {
            source,
            path: Some(path.to_path_buf()),
        },
        value,
    }))
}

/// Read a layer that must exist.
pub(super) fn require_layer(
    source: ConfigLayerSource,
    path: &Path,
) -> Result<LoadedLayer, ConfigError> {
    read_layer(source, path)?.ok_or_else(|| {
        ConfigError::ReadFailed(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{source} config {} does not exist", path.display()),
        ))
    })
}
