//! Pricing service for LLM cost calculations
//!
//! Uses LiteLLM-shaped pricing data embedded at compile time. Lookup is
//! multi-strategy (exact → provider-prefixed → family) and case-insensitive.
//! An unknown model yields `None`, never a silent zero: a missing cost and a
//! free request are different facts.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Embedded pricing data (compile-time)
const EMBEDDED_PRICING_JSON: &str = include_str!("../../../data/model_prices.json");

#[derive(Error, Debug)]
pub enum PricingError {
    #[error("Failed to parse pricing data: {0}")]
    ParseError(String),
}

/// Parsed model pricing entry from LiteLLM-shaped JSON
#[derive(Debug, Clone, Default)]
pub struct ModelPricing {
    /// Cost per input token (USD)
    pub input_cost_per_token: f64,
    /// Cost per output token (USD)
    pub output_cost_per_token: f64,
    /// Cache read cost; 0 means "not specified", input cost is used instead
    pub cache_read_input_token_cost: f64,
    /// Cache creation cost; 0 means "not specified"
    pub cache_creation_input_token_cost: f64,
    /// LiteLLM provider name
    pub litellm_provider: String,
}

/// Token counts entering a cost calculation
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub prompt_cache_read_tokens: i64,
    pub prompt_cache_write_tokens: i64,
}

/// Parsed and indexed pricing data
#[derive(Debug)]
pub struct PricingData {
    /// Exact model key (lowercase) to pricing
    models: HashMap<String, ModelPricing>,
    pub model_count: usize,
}

impl PricingData {
    pub fn from_json_str(json: &str) -> Result<Self, PricingError> {
        let raw: JsonValue =
            serde_json::from_str(json).map_err(|e| PricingError::ParseError(e.to_string()))?;
        let obj = raw
            .as_object()
            .ok_or_else(|| PricingError::ParseError("expected top-level object".to_string()))?;

        let mut models = HashMap::new();
        for (key, entry) in obj {
            // LiteLLM ships a documentation entry under this key
            if key == "sample_spec" {
                continue;
            }
            let Some(entry) = entry.as_object() else {
                continue;
            };
            let cost = |field: &str| entry.get(field).and_then(JsonValue::as_f64).unwrap_or(0.0);
            models.insert(
                key.to_lowercase(),
                ModelPricing {
                    input_cost_per_token: cost("input_cost_per_token"),
                    output_cost_per_token: cost("output_cost_per_token"),
                    cache_read_input_token_cost: cost("cache_read_input_token_cost"),
                    cache_creation_input_token_cost: cost("cache_creation_input_token_cost"),
                    litellm_provider: entry
                        .get("litellm_provider")
                        .and_then(JsonValue::as_str)
                        .unwrap_or("")
                        .to_string(),
                },
            );
        }

        let model_count = models.len();
        Ok(Self {
            models,
            model_count,
        })
    }

    /// Look up pricing for a model with multi-strategy fallback.
    ///
    /// Lookup order:
    /// 1. Exact match on lowercased model name
    /// 2. Provider-prefixed key, e.g. "gemini/gemini-1.5-pro"
    /// 3. Slash prefix stripped, e.g. "openai/gpt-4o" → "gpt-4o"
    /// 4. Family match: "-latest" or a trailing version date stripped
    pub fn lookup(&self, provider: Option<&str>, model: &str) -> Option<&ModelPricing> {
        let model_lower = model.to_lowercase();

        if let Some(pricing) = self.models.get(&model_lower) {
            return Some(pricing);
        }

        if let Some(provider) = provider {
            let litellm_provider = map_provider(provider);
            if !litellm_provider.is_empty() {
                let prefixed = format!("{}/{}", litellm_provider, model_lower);
                if let Some(pricing) = self.models.get(&prefixed) {
                    return Some(pricing);
                }
            }
        }

        if let Some((_, model_part)) = model_lower.split_once('/')
            && !model_part.is_empty()
            && let Some(pricing) = self.models.get(model_part)
        {
            return Some(pricing);
        }

        if let Some(family) = strip_version_suffix(&model_lower)
            && let Some(pricing) = self.models.get(family.as_str())
        {
            return Some(pricing);
        }

        None
    }
}

/// Map a logged provider name to the LiteLLM provider used in pricing keys
fn map_provider(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "openai" | "azure" | "azure-openai" => "openai",
        "anthropic" => "anthropic",
        "google" | "gemini" | "google-ai" => "gemini",
        "mistral" | "mistralai" => "mistral",
        "groq" => "groq",
        "openrouter" => "openrouter",
        _ => "",
    }
}

/// Strip "-latest" or a trailing version date: "claude-3-opus-20240229" →
/// "claude-3-opus", "gpt-4o-2024-08-06" → "gpt-4o"
fn strip_version_suffix(model: &str) -> Option<String> {
    static VERSION_SUFFIX: OnceLock<Regex> = OnceLock::new();
    if let Some(base) = model.strip_suffix("-latest") {
        return Some(base.to_string());
    }
    let re =
        VERSION_SUFFIX.get_or_init(|| Regex::new(r"-(\d{8}|\d{4}-\d{2}-\d{2})$").unwrap());
    let stripped = re.replace(model, "");
    if stripped != model {
        Some(stripped.into_owned())
    } else {
        None
    }
}

/// Thread-safe pricing service. Read-heavy, so data sits behind a
/// parking_lot RwLock.
pub struct PricingService {
    data: RwLock<PricingData>,
}

impl PricingService {
    /// Build the service from the embedded pricing table
    pub fn init() -> Result<Self, PricingError> {
        let data = PricingData::from_json_str(EMBEDDED_PRICING_JSON)?;
        tracing::debug!(models = data.model_count, "PricingService initialized");
        Ok(Self {
            data: RwLock::new(data),
        })
    }

    pub fn model_count(&self) -> usize {
        self.data.read().model_count
    }

    /// USD cost of a request, or `None` when the model has no pricing entry.
    ///
    /// Cache-read tokens are assumed to be included in `prompt_tokens` and
    /// are re-priced at the cache-read rate. Cache-write tokens bill on top.
    pub fn model_cost(
        &self,
        provider: Option<&str>,
        model: &str,
        usage: &TokenUsage,
    ) -> Option<f64> {
        if model.is_empty() {
            return None;
        }
        let data = self.data.read();
        let pricing = data.lookup(provider, model)?;

        let cache_read_rate = if pricing.cache_read_input_token_cost > 0.0 {
            pricing.cache_read_input_token_cost
        } else {
            pricing.input_cost_per_token
        };
        let cache_write_rate = if pricing.cache_creation_input_token_cost > 0.0 {
            pricing.cache_creation_input_token_cost
        } else {
            pricing.input_cost_per_token
        };

        let cache_read = usage.prompt_cache_read_tokens.max(0) as f64;
        let billable_prompt = (usage.prompt_tokens - usage.prompt_cache_read_tokens).max(0) as f64;
        let completion = usage.completion_tokens.max(0) as f64;
        let cache_write = usage.prompt_cache_write_tokens.max(0) as f64;

        Some(
            billable_prompt * pricing.input_cost_per_token
                + cache_read * cache_read_rate
                + cache_write * cache_write_rate
                + completion * pricing.output_cost_per_token,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PricingService {
        PricingService::init().unwrap()
    }

    fn usage(prompt: i64, completion: i64) -> TokenUsage {
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            ..Default::default()
        }
    }

    #[test]
    fn embedded_table_parses() {
        assert!(service().model_count() > 10);
    }

    #[test]
    fn exact_match_gpt_4() {
        let cost = service()
            .model_cost(Some("OPENAI"), "gpt-4", &usage(1000, 1000))
            .unwrap();
        // 1000 * 0.00003 + 1000 * 0.00006
        assert!((cost - 0.09).abs() < 1e-9);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert!(
            service()
                .model_cost(None, "GPT-4", &usage(10, 10))
                .is_some()
        );
    }

    #[test]
    fn provider_prefix_reaches_gemini() {
        assert!(
            service()
                .model_cost(Some("GOOGLE"), "gemini-1.5-pro", &usage(10, 10))
                .is_some()
        );
    }

    #[test]
    fn slash_prefix_is_stripped() {
        assert!(
            service()
                .model_cost(None, "openai/gpt-4o", &usage(10, 10))
                .is_some()
        );
    }

    #[test]
    fn family_match_strips_version_date() {
        // No exact "gpt-4o-2024-08-06" entry; should land on gpt-4o
        assert!(
            service()
                .model_cost(None, "gpt-4o-2024-08-06", &usage(10, 10))
                .is_some()
        );
    }

    #[test]
    fn unknown_model_is_none_not_zero() {
        assert!(
            service()
                .model_cost(None, "my-basement-llm", &usage(1000, 1000))
                .is_none()
        );
    }

    #[test]
    fn empty_model_is_none() {
        assert!(service().model_cost(None, "", &usage(10, 10)).is_none());
    }

    #[test]
    fn cache_read_tokens_reprice_prompt_share() {
        let svc = service();
        let with_cache = svc
            .model_cost(
                Some("anthropic"),
                "claude-3-5-sonnet-20241022",
                &TokenUsage {
                    prompt_tokens: 1000,
                    completion_tokens: 0,
                    prompt_cache_read_tokens: 800,
                    prompt_cache_write_tokens: 0,
                },
            )
            .unwrap();
        let without_cache = svc
            .model_cost(
                Some("anthropic"),
                "claude-3-5-sonnet-20241022",
                &usage(1000, 0),
            )
            .unwrap();
        assert!(with_cache < without_cache);
    }
}
