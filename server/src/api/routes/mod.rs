//! API route modules

pub mod health;
pub mod metrics;
pub mod requests;
