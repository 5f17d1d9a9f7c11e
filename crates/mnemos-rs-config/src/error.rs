use thiserror::Error;

/// Failure while reading, merging or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] json5::Error),
    /// The merged JSON did not deserialize into the schema types.
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// Dotted `path`, prefixed with `layer:` for schema errors.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// A `MNEMOS_*` variable held a value of the wrong type.
    #[error("invalid environment override {var}: {message}")]
    InvalidEnv { var: String, message: String },
}
