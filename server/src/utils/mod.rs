//! Shared utility functions

pub mod json;
pub mod sql;
pub mod time;
