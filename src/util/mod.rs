//! Utility helpers: timeouts and log-friendly text truncation.

pub mod text;
pub mod timeout;
