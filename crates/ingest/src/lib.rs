//! Brandpulse ingest library.
//!
//! Everything the ingest binary runs lives here so the integration test
//! crate can exercise it directly: webhook verification, the durable job
//! queue, workers, reconciliation, and the dashboard event bus.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod queue;
pub mod reconcile;
pub mod services;
pub mod shopify;
pub mod state;
pub mod webhooks;
pub mod workers;
