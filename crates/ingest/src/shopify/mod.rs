//! Shopify Admin REST API client and payload types.
//!
//! The ingest service talks to Shopify in two directions: webhooks push
//! order and refund payloads in, and reconciliation pulls the order list
//! for a day back out to spot deliveries that never arrived.

pub mod client;
pub mod types;

pub use client::ShopifyClient;
pub use types::{OrderPayload, RefundPayload, normalize_order, normalize_refund};

/// Errors from the Shopify Admin API.
#[derive(Debug, thiserror::Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Shopify returned a non-success status.
    #[error("Shopify API error: status {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// A payload field could not be interpreted.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Brand has no shop domain or access token stored.
    #[error("Brand {0} is not connected to Shopify")]
    NotConnected(i32),
}
