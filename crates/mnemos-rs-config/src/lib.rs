//! Mnemos configuration: the JSON5 schema, layered discovery and validation.
//!
//! The server binary is the only consumer. It loads a [`LayeredConfig`] and
//! maps each section onto the memory core's constructor arguments.

mod error;
mod loader;
mod model;

pub use error::ConfigError;
pub use loader::{ConfigLayer, ConfigLayerSource, EnvSource, LayeredConfig, LayeredConfigOptions};
pub use model::*;
