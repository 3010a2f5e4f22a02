//! Application state for the web layer.

use std::sync::Arc;

use crate::cache::PriceCache;
use crate::store::Store;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Cache read API over the station store.
    pub cache: Arc<PriceCache>,

    /// Store handle for the two cursor operations the web layer may
    /// perform (tracking a viewport, requesting a manual refresh).
    pub store: Store,
}

impl AppState {
    pub fn new(cache: PriceCache, store: Store) -> Self {
        Self {
            cache: Arc::new(cache),
            store,
        }
    }
}
