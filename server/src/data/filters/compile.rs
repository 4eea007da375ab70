//! Filter compilation
//!
//! Turns a [`FilterNode`] tree into a parameterized SQL predicate. Values are
//! never interpolated into the SQL text; every literal becomes a `?`
//! placeholder bound through [`QueryParam`]. The tenant scope predicate is
//! added here unconditionally so a caller cannot forget it.

use clickhouse::query::Query;
use thiserror::Error;

use super::types::{
    BooleanOperator, ColumnKind, FilterLeaf, FilterNode, FilterOperator, FilterTable, FilterValue,
};
use crate::core::constants::DEFAULT_CACHE_REFERENCE_ID;
use crate::utils::sql::escape_like_pattern;
use crate::utils::time::parse_iso_timestamp;

/// Prefix for dynamic custom-property filters on `request_response`
const PROPERTY_COLUMN_PREFIX: &str = "properties.";

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("cannot filter by column: {table}.{column}")]
    ColumnNotAllowed { table: FilterTable, column: String },

    #[error("operator {operator} is not valid for column {table}.{column}")]
    OperatorMismatch {
        table: FilterTable,
        column: String,
        operator: FilterOperator,
    },

    #[error("filter value for column {table}.{column} must be a {expected}")]
    TypeMismatch {
        table: FilterTable,
        column: String,
        expected: &'static str,
    },

    #[error("invalid timestamp value for column {table}.{column}: {value}")]
    InvalidTimestamp {
        table: FilterTable,
        column: String,
        value: String,
    },

    #[error("property filter key cannot be empty")]
    EmptyPropertyKey,

    #[error("filter references table {found}, expected {expected}")]
    TableMismatch {
        expected: FilterTable,
        found: FilterTable,
    },
}

/// A value bound to a `?` placeholder in compiled SQL
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    String(String),
    Int64(i64),
    Float64(f64),
}

impl QueryParam {
    /// Bind this parameter to a ClickHouse query, consuming both
    pub fn bind_to(self, query: Query) -> Query {
        match self {
            Self::String(v) => query.bind(v),
            Self::Int64(v) => query.bind(v),
            Self::Float64(v) => query.bind(v),
        }
    }
}

/// Result of compiling a filter tree: a SQL predicate plus the parameters to
/// bind, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl CompiledFilter {
    /// Bind all parameters onto a query in order
    pub fn bind_all(&self, mut query: Query) -> Query {
        for param in &self.params {
            query = param.clone().bind_to(query);
        }
        query
    }
}

/// Compile a filter tree for `table`, AND-ing the mandatory tenant predicate.
///
/// The output predicate always has the shape
/// `({table}.organization_id = ?) AND (<tree>)`, with the organization id as
/// the first bound parameter. [`FilterNode::All`] compiles to `1=1` so the
/// shape is uniform.
pub fn compile_with_org(
    filter: &FilterNode,
    org_id: &str,
    table: FilterTable,
) -> Result<CompiledFilter, FilterError> {
    let mut params = vec![QueryParam::String(org_id.to_string())];
    let tree_sql = compile_node(filter, table, &mut params)?;
    let sql = format!("({}.organization_id = ?) AND ({})", table.as_str(), tree_sql);
    Ok(CompiledFilter { sql, params })
}

fn compile_node(
    node: &FilterNode,
    table: FilterTable,
    params: &mut Vec<QueryParam>,
) -> Result<String, FilterError> {
    match node {
        FilterNode::All => Ok("1=1".to_string()),
        FilterNode::Branch(branch) => {
            let left = compile_node(&branch.left, table, params)?;
            let right = compile_node(&branch.right, table, params)?;
            Ok(format!("({} {} {})", left, branch.operator.as_sql(), right))
        }
        FilterNode::Leaf(leaf) => compile_leaf(leaf, table, params),
    }
}

fn compile_leaf(
    leaf: &FilterLeaf,
    table: FilterTable,
    params: &mut Vec<QueryParam>,
) -> Result<String, FilterError> {
    if leaf.table != table {
        return Err(FilterError::TableMismatch {
            expected: table,
            found: leaf.table,
        });
    }

    if let Some(key) = leaf.column.strip_prefix(PROPERTY_COLUMN_PREFIX) {
        return compile_property_leaf(leaf, key, params);
    }

    let kind = table
        .column_kind(&leaf.column)
        .ok_or_else(|| FilterError::ColumnNotAllowed {
            table,
            column: leaf.column.clone(),
        })?;

    // Virtual column: "cached" is derived from the cache reference id
    if table == FilterTable::RequestResponse && leaf.column == "cached" {
        return compile_cached_leaf(leaf, params);
    }

    let column_sql = format!("{}.{}", table.as_str(), leaf.column);
    match kind {
        ColumnKind::Text => compile_text_condition(leaf, &column_sql, params),
        ColumnKind::Number => compile_number_condition(leaf, &column_sql, params),
        ColumnKind::Timestamp => compile_timestamp_condition(leaf, &column_sql, params),
        ColumnKind::Boolean => compile_boolean_condition(leaf, &column_sql),
    }
}

fn compile_property_leaf(
    leaf: &FilterLeaf,
    key: &str,
    params: &mut Vec<QueryParam>,
) -> Result<String, FilterError> {
    if leaf.table != FilterTable::RequestResponse {
        return Err(FilterError::ColumnNotAllowed {
            table: leaf.table,
            column: leaf.column.clone(),
        });
    }
    if key.is_empty() {
        return Err(FilterError::EmptyPropertyKey);
    }
    params.push(QueryParam::String(key.to_string()));
    let column_sql = format!("{}.properties[?]", leaf.table.as_str());
    compile_text_condition(leaf, &column_sql, params)
}

fn compile_cached_leaf(
    leaf: &FilterLeaf,
    params: &mut Vec<QueryParam>,
) -> Result<String, FilterError> {
    let FilterValue::Bool(cached) = leaf.value else {
        return Err(FilterError::TypeMismatch {
            table: leaf.table,
            column: leaf.column.clone(),
            expected: "boolean",
        });
    };
    let want_cached = match leaf.operator {
        FilterOperator::Equals => cached,
        FilterOperator::NotEquals => !cached,
        _ => {
            return Err(FilterError::OperatorMismatch {
                table: leaf.table,
                column: leaf.column.clone(),
                operator: leaf.operator,
            });
        }
    };
    params.push(QueryParam::String(DEFAULT_CACHE_REFERENCE_ID.to_string()));
    let comparison = if want_cached { "!=" } else { "=" };
    Ok(format!(
        "{}.cache_reference_id {} ?",
        leaf.table.as_str(),
        comparison
    ))
}

fn compile_text_condition(
    leaf: &FilterLeaf,
    column_sql: &str,
    params: &mut Vec<QueryParam>,
) -> Result<String, FilterError> {
    let FilterValue::String(value) = &leaf.value else {
        return Err(FilterError::TypeMismatch {
            table: leaf.table,
            column: leaf.column.clone(),
            expected: "string",
        });
    };
    let sql = match leaf.operator {
        FilterOperator::Equals => {
            params.push(QueryParam::String(value.clone()));
            format!("{} = ?", column_sql)
        }
        FilterOperator::NotEquals => {
            params.push(QueryParam::String(value.clone()));
            format!("{} != ?", column_sql)
        }
        FilterOperator::Contains => {
            params.push(QueryParam::String(format!(
                "%{}%",
                escape_like_pattern(value)
            )));
            format!("{} ILIKE ?", column_sql)
        }
        FilterOperator::NotContains => {
            params.push(QueryParam::String(format!(
                "%{}%",
                escape_like_pattern(value)
            )));
            format!("{} NOT ILIKE ?", column_sql)
        }
        other => {
            return Err(FilterError::OperatorMismatch {
                table: leaf.table,
                column: leaf.column.clone(),
                operator: other,
            });
        }
    };
    Ok(sql)
}

fn compile_number_condition(
    leaf: &FilterLeaf,
    column_sql: &str,
    params: &mut Vec<QueryParam>,
) -> Result<String, FilterError> {
    let FilterValue::Number(value) = leaf.value else {
        return Err(FilterError::TypeMismatch {
            table: leaf.table,
            column: leaf.column.clone(),
            expected: "number",
        });
    };
    let comparison = match leaf.operator {
        FilterOperator::Equals => "=",
        FilterOperator::NotEquals => "!=",
        FilterOperator::Gte => ">=",
        FilterOperator::Lte => "<=",
        FilterOperator::Gt => ">",
        FilterOperator::Lt => "<",
        other => {
            return Err(FilterError::OperatorMismatch {
                table: leaf.table,
                column: leaf.column.clone(),
                operator: other,
            });
        }
    };
    // Integral values bind as Int64 so integer column comparisons stay exact
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        params.push(QueryParam::Int64(value as i64));
    } else {
        params.push(QueryParam::Float64(value));
    }
    Ok(format!("{} {} ?", column_sql, comparison))
}

fn compile_timestamp_condition(
    leaf: &FilterLeaf,
    column_sql: &str,
    params: &mut Vec<QueryParam>,
) -> Result<String, FilterError> {
    let FilterValue::String(value) = &leaf.value else {
        return Err(FilterError::TypeMismatch {
            table: leaf.table,
            column: leaf.column.clone(),
            expected: "RFC 3339 timestamp string",
        });
    };
    let parsed = parse_iso_timestamp(value).ok_or_else(|| FilterError::InvalidTimestamp {
        table: leaf.table,
        column: leaf.column.clone(),
        value: value.clone(),
    })?;
    let comparison = match leaf.operator {
        FilterOperator::Equals => "=",
        FilterOperator::Gte => ">=",
        FilterOperator::Lte => "<=",
        FilterOperator::Gt => ">",
        FilterOperator::Lt => "<",
        other => {
            return Err(FilterError::OperatorMismatch {
                table: leaf.table,
                column: leaf.column.clone(),
                operator: other,
            });
        }
    };
    params.push(QueryParam::Int64(parsed.timestamp_micros()));
    Ok(format!(
        "{} {} fromUnixTimestamp64Micro(?)",
        column_sql, comparison
    ))
}

fn compile_boolean_condition(leaf: &FilterLeaf, column_sql: &str) -> Result<String, FilterError> {
    let FilterValue::Bool(value) = leaf.value else {
        return Err(FilterError::TypeMismatch {
            table: leaf.table,
            column: leaf.column.clone(),
            expected: "boolean",
        });
    };
    let comparison = match leaf.operator {
        FilterOperator::Equals => "=",
        FilterOperator::NotEquals => "!=",
        other => {
            return Err(FilterError::OperatorMismatch {
                table: leaf.table,
                column: leaf.column.clone(),
                operator: other,
            });
        }
    };
    // Booleans are a closed set, inline them instead of binding
    let literal = if value { "true" } else { "false" };
    Ok(format!("{} {} {}", column_sql, comparison, literal))
}

/// Build the time-range subtree `created_at >= start AND created_at <= end`
/// for a table, combinable with a user filter via [`FilterNode::branch`]
pub fn time_range_filter(
    table: FilterTable,
    start: chrono::DateTime<chrono::Utc>,
    end: chrono::DateTime<chrono::Utc>,
) -> FilterNode {
    let column = table.created_at_column();
    FilterNode::branch(
        FilterNode::leaf(
            table,
            column,
            FilterOperator::Gte,
            FilterValue::String(start.to_rfc3339()),
        ),
        BooleanOperator::And,
        FilterNode::leaf(
            table,
            column,
            FilterOperator::Lte,
            FilterValue::String(end.to_rfc3339()),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const ORG: &str = "org-123";

    #[test]
    fn all_compiles_to_org_scope_only() {
        let compiled =
            compile_with_org(&FilterNode::All, ORG, FilterTable::RequestResponse).unwrap();
        assert_eq!(
            compiled.sql,
            "(request_response.organization_id = ?) AND (1=1)"
        );
        assert_eq!(compiled.params, vec![QueryParam::String(ORG.to_string())]);
    }

    #[test]
    fn leaf_equals_binds_value_after_org() {
        let node = FilterNode::leaf(
            FilterTable::RequestResponse,
            "model",
            FilterOperator::Equals,
            FilterValue::String("gpt-4".to_string()),
        );
        let compiled = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap();
        assert_eq!(
            compiled.sql,
            "(request_response.organization_id = ?) AND (request_response.model = ?)"
        );
        assert_eq!(
            compiled.params,
            vec![
                QueryParam::String(ORG.to_string()),
                QueryParam::String("gpt-4".to_string()),
            ]
        );
    }

    #[test]
    fn contains_escapes_like_metacharacters() {
        let node = FilterNode::leaf(
            FilterTable::RequestResponse,
            "path",
            FilterOperator::Contains,
            FilterValue::String("100%_done".to_string()),
        );
        let compiled = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap();
        assert!(compiled.sql.ends_with("(request_response.path ILIKE ?)"));
        assert_eq!(
            compiled.params[1],
            QueryParam::String("%100\\%\\_done%".to_string())
        );
    }

    #[test]
    fn branch_nests_with_parentheses() {
        let node = FilterNode::branch(
            FilterNode::leaf(
                FilterTable::RequestResponse,
                "status",
                FilterOperator::Gte,
                FilterValue::Number(400.0),
            ),
            BooleanOperator::Or,
            FilterNode::leaf(
                FilterTable::RequestResponse,
                "status",
                FilterOperator::Lt,
                FilterValue::Number(0.0),
            ),
        );
        let compiled = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap();
        assert_eq!(
            compiled.sql,
            "(request_response.organization_id = ?) AND \
             ((request_response.status >= ? OR request_response.status < ?))"
        );
        assert_eq!(compiled.params[1], QueryParam::Int64(400));
        assert_eq!(compiled.params[2], QueryParam::Int64(0));
    }

    #[test]
    fn fractional_numbers_bind_as_float() {
        let node = FilterNode::leaf(
            FilterTable::RequestResponse,
            "cost",
            FilterOperator::Gt,
            FilterValue::Number(0.005),
        );
        let compiled = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap();
        assert_eq!(compiled.params[1], QueryParam::Float64(0.005));
    }

    #[test]
    fn timestamp_binds_micros_with_conversion() {
        let node = FilterNode::leaf(
            FilterTable::RequestResponse,
            "request_created_at",
            FilterOperator::Gte,
            FilterValue::String("2024-06-01T00:00:00Z".to_string()),
        );
        let compiled = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap();
        assert!(
            compiled
                .sql
                .contains("request_response.request_created_at >= fromUnixTimestamp64Micro(?)")
        );
        let expected = Utc
            .with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
            .unwrap()
            .timestamp_micros();
        assert_eq!(compiled.params[1], QueryParam::Int64(expected));
    }

    #[test]
    fn invalid_timestamp_is_rejected() {
        let node = FilterNode::leaf(
            FilterTable::RequestResponse,
            "request_created_at",
            FilterOperator::Gte,
            FilterValue::String("yesterday".to_string()),
        );
        let err = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap_err();
        assert!(matches!(err, FilterError::InvalidTimestamp { .. }));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let node = FilterNode::leaf(
            FilterTable::RequestResponse,
            "secret_column",
            FilterOperator::Equals,
            FilterValue::String("x".to_string()),
        );
        let err = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap_err();
        assert!(matches!(err, FilterError::ColumnNotAllowed { .. }));
    }

    #[test]
    fn operator_mismatch_is_rejected() {
        let node = FilterNode::leaf(
            FilterTable::RequestResponse,
            "model",
            FilterOperator::Gte,
            FilterValue::String("gpt".to_string()),
        );
        let err = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap_err();
        assert!(matches!(err, FilterError::OperatorMismatch { .. }));
    }

    #[test]
    fn cross_table_leaf_is_rejected() {
        let node = FilterNode::leaf(
            FilterTable::RateLimitLog,
            "created_at",
            FilterOperator::Gte,
            FilterValue::String("2024-01-01T00:00:00Z".to_string()),
        );
        let err = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap_err();
        assert!(matches!(err, FilterError::TableMismatch { .. }));
    }

    #[test]
    fn property_filter_binds_key_then_value() {
        let node = FilterNode::leaf(
            FilterTable::RequestResponse,
            "properties.environment",
            FilterOperator::Equals,
            FilterValue::String("production".to_string()),
        );
        let compiled = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap();
        assert!(compiled.sql.contains("request_response.properties[?] = ?"));
        assert_eq!(
            compiled.params,
            vec![
                QueryParam::String(ORG.to_string()),
                QueryParam::String("environment".to_string()),
                QueryParam::String("production".to_string()),
            ]
        );
    }

    #[test]
    fn empty_property_key_is_rejected() {
        let node = FilterNode::leaf(
            FilterTable::RequestResponse,
            "properties.",
            FilterOperator::Equals,
            FilterValue::String("x".to_string()),
        );
        let err = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap_err();
        assert!(matches!(err, FilterError::EmptyPropertyKey));
    }

    #[test]
    fn cached_true_rewrites_to_reference_id_check() {
        let node = FilterNode::leaf(
            FilterTable::RequestResponse,
            "cached",
            FilterOperator::Equals,
            FilterValue::Bool(true),
        );
        let compiled = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap();
        assert!(
            compiled
                .sql
                .contains("request_response.cache_reference_id != ?")
        );
        assert_eq!(
            compiled.params[1],
            QueryParam::String(DEFAULT_CACHE_REFERENCE_ID.to_string())
        );
    }

    #[test]
    fn threat_boolean_inlines_literal() {
        let node = FilterNode::leaf(
            FilterTable::RequestResponse,
            "threat",
            FilterOperator::Equals,
            FilterValue::Bool(true),
        );
        let compiled = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap();
        assert!(compiled.sql.contains("request_response.threat = true"));
        assert_eq!(compiled.params.len(), 1);
    }

    #[test]
    fn time_range_filter_builds_bounded_branch() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let node = time_range_filter(FilterTable::RequestResponse, start, end);
        let compiled = compile_with_org(&node, ORG, FilterTable::RequestResponse).unwrap();
        assert!(
            compiled
                .sql
                .contains("request_created_at >= fromUnixTimestamp64Micro(?)")
        );
        assert!(
            compiled
                .sql
                .contains("request_created_at <= fromUnixTimestamp64Micro(?)")
        );
        assert_eq!(compiled.params.len(), 3);
    }
}
