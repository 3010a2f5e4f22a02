//! Charging station price map server.
//!
//! Keeps a persisted snapshot of charging station prices and availability,
//! refreshed in the background against the DCS map API at a pace the
//! upstream tolerates, and serves it to a map front end without ever
//! blocking a request on network I/O.

pub mod cache;
pub mod dcs;
pub mod domain;
pub mod refresh;
pub mod store;
pub mod web;
