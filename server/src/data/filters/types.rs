//! Filter tree definitions
//!
//! The dashboard expresses query predicates as a recursive tree of AND/OR
//! branches over leaf conditions. Trees arrive as JSON from the UI, are
//! compiled once per request, and are never mutated in place.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Tables a filter leaf may reference.
///
/// Every table carries an `organization_id` column used for the mandatory
/// tenant-scope predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterTable {
    RequestResponse,
    RateLimitLog,
    CacheMetrics,
}

impl FilterTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestResponse => "request_response",
            Self::RateLimitLog => "rate_limit_log",
            Self::CacheMetrics => "cache_metrics",
        }
    }

    /// Column holding the record creation time, used for time-range scoping
    pub fn created_at_column(&self) -> &'static str {
        match self {
            Self::RequestResponse => "request_created_at",
            Self::RateLimitLog => "created_at",
            Self::CacheMetrics => "created_at",
        }
    }

    /// Allow-listed filterable columns for this table.
    ///
    /// This is the authorization boundary for the filter UI: a leaf whose
    /// `(table, column)` pair is not listed here is rejected before any SQL
    /// is generated.
    pub fn allowed_columns(&self) -> &'static [(&'static str, ColumnKind)] {
        match self {
            Self::RequestResponse => &[
                ("request_id", ColumnKind::Text),
                ("organization_id", ColumnKind::Text),
                ("model", ColumnKind::Text),
                ("provider", ColumnKind::Text),
                ("user_id", ColumnKind::Text),
                ("path", ColumnKind::Text),
                ("country_code", ColumnKind::Text),
                ("target_url", ColumnKind::Text),
                ("request_body", ColumnKind::Text),
                ("response_body", ColumnKind::Text),
                ("cache_reference_id", ColumnKind::Text),
                ("status", ColumnKind::Number),
                ("latency", ColumnKind::Number),
                ("cost", ColumnKind::Number),
                ("time_to_first_token", ColumnKind::Number),
                ("prompt_tokens", ColumnKind::Number),
                ("completion_tokens", ColumnKind::Number),
                ("total_tokens", ColumnKind::Number),
                ("prompt_cache_read_tokens", ColumnKind::Number),
                ("prompt_cache_write_tokens", ColumnKind::Number),
                ("request_created_at", ColumnKind::Timestamp),
                ("response_created_at", ColumnKind::Timestamp),
                ("threat", ColumnKind::Boolean),
                ("cached", ColumnKind::Boolean),
            ],
            Self::RateLimitLog => &[
                ("organization_id", ColumnKind::Text),
                ("created_at", ColumnKind::Timestamp),
            ],
            Self::CacheMetrics => &[
                ("organization_id", ColumnKind::Text),
                ("request_id", ColumnKind::Text),
                ("model", ColumnKind::Text),
                ("created_at", ColumnKind::Timestamp),
                ("cache_hit_count", ColumnKind::Number),
                ("saved_latency_ms", ColumnKind::Number),
                ("saved_prompt_tokens", ColumnKind::Number),
                ("saved_completion_tokens", ColumnKind::Number),
            ],
        }
    }

    /// Look up the value kind of an allow-listed column
    pub fn column_kind(&self, column: &str) -> Option<ColumnKind> {
        self.allowed_columns()
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, kind)| *kind)
    }
}

impl fmt::Display for FilterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Value class of a filterable column, deciding which operators apply and how
/// the value is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Timestamp,
    Boolean,
}

/// Comparison operators accepted from the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Gte,
    Lte,
    Gt,
    Lt,
    Contains,
    NotContains,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not-equals",
            Self::Gte => "gte",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Contains => "contains",
            Self::NotContains => "not-contains",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Literal value of a leaf condition
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(f64),
    String(String),
}

/// AND/OR combinator of a branch node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanOperator {
    And,
    Or,
}

impl BooleanOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// One leaf condition: `table.column <operator> value`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FilterLeaf {
    pub table: FilterTable,
    pub column: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

/// One branch node combining two subtrees
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FilterBranch {
    pub left: FilterNode,
    pub operator: BooleanOperator,
    pub right: FilterNode,
}

/// A filter tree: the sentinel `"all"`, a leaf, or a branch.
///
/// Wire shapes:
/// - `"all"`
/// - `{"table": "request_response", "column": "model", "operator": "equals", "value": "gpt-4"}`
/// - `{"left": ..., "operator": "and", "right": ...}`
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    All,
    Leaf(FilterLeaf),
    Branch(Box<FilterBranch>),
}

impl FilterNode {
    pub fn leaf(
        table: FilterTable,
        column: impl Into<String>,
        operator: FilterOperator,
        value: FilterValue,
    ) -> Self {
        Self::Leaf(FilterLeaf {
            table,
            column: column.into(),
            operator,
            value,
        })
    }

    pub fn branch(left: FilterNode, operator: BooleanOperator, right: FilterNode) -> Self {
        Self::Branch(Box::new(FilterBranch {
            left,
            operator,
            right,
        }))
    }
}

impl Default for FilterNode {
    fn default() -> Self {
        Self::All
    }
}

impl<'de> Deserialize<'de> for FilterNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = JsonValue::deserialize(deserializer)?;
        match &value {
            JsonValue::String(s) if s == "all" => Ok(FilterNode::All),
            JsonValue::String(other) => Err(de::Error::custom(format!(
                "expected \"all\" or a filter object, found \"{}\"",
                other
            ))),
            JsonValue::Object(map) if map.contains_key("left") => {
                let branch: FilterBranch =
                    serde_json::from_value(value).map_err(de::Error::custom)?;
                Ok(FilterNode::Branch(Box::new(branch)))
            }
            JsonValue::Object(_) => {
                let leaf: FilterLeaf = serde_json::from_value(value).map_err(de::Error::custom)?;
                Ok(FilterNode::Leaf(leaf))
            }
            _ => Err(de::Error::custom("invalid filter node")),
        }
    }
}

impl Serialize for FilterNode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            FilterNode::All => serializer.serialize_str("all"),
            FilterNode::Leaf(leaf) => leaf.serialize(serializer),
            FilterNode::Branch(branch) => branch.serialize(serializer),
        }
    }
}
