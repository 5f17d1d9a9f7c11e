use mnemos_rs_memory::MemoryService;
use std::sync::Arc;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MemoryService>,
    /// `top_k` used when a search request omits it.
    pub default_top_k: usize,
}

impl AppState {
    pub fn new(service: Arc<MemoryService>, default_top_k: usize) -> Self {
        Self {
            service,
            default_top_k,
        }
    }
}
