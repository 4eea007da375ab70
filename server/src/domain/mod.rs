//! Domain layer: normalization and pricing

pub mod normalize;
pub mod pricing;
