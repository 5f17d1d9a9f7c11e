//! Test helpers shared across Mnemos crates.

pub mod embedder;
pub mod store;

pub use embedder::{FlakyEmbedder, KEYWORDS, KeywordEmbedder, keyword_embedding};
pub use store::{RecordingStore, UnavailableStore};
