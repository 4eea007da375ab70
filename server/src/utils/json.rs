//! JSON utility functions
//!
//! Defensive accessors for provider payloads. Raw request/response bodies are
//! written by many upstream gateways and frequently violate their own schema;
//! every accessor here degrades to a default instead of failing.

use serde_json::Value as JsonValue;

/// Extract a string field, returning an empty string for anything that is not
/// a string.
pub fn str_or_empty(value: &JsonValue) -> &str {
    value.as_str().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn str_or_empty_for_non_strings() {
        assert_eq!(str_or_empty(&json!("hi")), "hi");
        assert_eq!(str_or_empty(&json!(42)), "");
        assert_eq!(str_or_empty(&JsonValue::Null), "");
    }

}
