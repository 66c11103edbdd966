//! the session's one process-wide shared resource (§5, §9 design
//! notes: "bundle these into an explicit `Session` value passed by
//! reference; avoid true globals").

use anastasis_client::{ProviderCatalog, ProviderClient};
use std::sync::Arc;

#[derive(Clone)]
pub struct ReducerContext {
    pub catalog: ProviderCatalog,
    pub client: Arc<ProviderClient>,
}

impl Default for ReducerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ReducerContext {
    pub fn new() -> Self {
        Self {
            catalog: ProviderCatalog::new(),
            client: Arc::new(ProviderClient::new()),
        }
    }
}
