//! Filter model and SQL compilation for dashboard queries

pub mod compile;
pub mod types;

pub use compile::{CompiledFilter, FilterError, QueryParam, compile_with_org, time_range_filter};
pub use types::{
    BooleanOperator, ColumnKind, FilterBranch, FilterLeaf, FilterNode, FilterOperator, FilterTable,
    FilterValue,
};
