//! HTTP surface and process wiring for the Mnemos memory service.

pub mod error;
pub mod routes;
pub mod state;
pub mod wiring;

pub use error::{ApiError, kind_label};
pub use routes::{MAX_BODY_BYTES, router};
pub use state::AppState;
pub use wiring::{build_embedder, build_store, service_config};
