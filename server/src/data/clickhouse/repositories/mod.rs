//! Query repositories over the analytics tables

pub mod over_time;
pub mod requests;
