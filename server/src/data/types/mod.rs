//! Shared data-layer row types

pub mod raw;

pub use raw::{RAW_REQUEST_COLUMNS, RawLoggedRequest};
