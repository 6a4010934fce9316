//! Core types for Brandpulse.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod shop;
pub mod status;

pub use id::*;
pub use shop::{ShopDomain, ShopDomainError};
pub use status::*;
