//! Domain services that coordinate across repositories.

pub mod redact;
