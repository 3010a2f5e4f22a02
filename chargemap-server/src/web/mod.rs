//! HTTP layer.
//!
//! Thin JSON endpoints over the cache read API for the map front end.
//! Handlers never call the upstream service; an upstream outage is
//! invisible here beyond data ages growing.

mod dto;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
