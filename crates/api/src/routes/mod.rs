//! HTTP route handlers.

pub mod duels;
pub mod health;
pub mod metrics;
