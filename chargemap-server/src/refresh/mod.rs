//! Background refresh subsystem.
//!
//! Two pieces: the [`Batcher`](batcher) paces upstream calls so the
//! informal rate limit is respected, and the [`Scheduler`](scheduler)
//! decides what is stale, drives the batcher and commits the results.
//! Neither is ever on a request path — user traffic only reads the store.

pub mod batcher;
pub mod scheduler;

pub use batcher::{BatchOutcome, BatcherConfig};
pub use scheduler::{RefreshConfig, RefreshError, Scheduler, TickReport};
