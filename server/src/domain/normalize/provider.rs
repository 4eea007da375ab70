//! Payload shape detection
//!
//! Picks the extraction variant for a raw record from its logged provider,
//! model, request path, and request body shape. Total over all inputs: an
//! unrecognized shape falls back to [`ProviderKind::Custom`], never an error.

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI-style chat (`messages` array, `choices` in the response)
    Chat,
    /// Legacy completion shape (`prompt` in, `choices[].text` out)
    Completion,
    /// Anthropic messages (`content` blocks)
    Claude,
    /// Gemini (`contents` in, `candidates` out)
    Gemini,
    /// Image generation (`data[].url` / `data[].b64_json` out)
    Image,
    /// Chat with tool/function calling
    FunctionCall,
    /// Anything else: raw JSON echo
    Custom,
}

pub fn detect(provider: &str, model: &str, path: &str, request_body: &JsonValue) -> ProviderKind {
    let provider = provider.to_lowercase();
    let model = model.to_lowercase();

    if provider.contains("anthropic") || model.starts_with("claude") {
        return ProviderKind::Claude;
    }
    if provider.contains("google")
        || provider.contains("gemini")
        || model.starts_with("gemini")
        || request_body.get("contents").is_some()
    {
        return ProviderKind::Gemini;
    }
    if model.contains("dall-e")
        || model.contains("flux")
        || model.contains("stable-diffusion")
        || path.contains("images/generations")
    {
        return ProviderKind::Image;
    }
    if request_body.get("tools").is_some()
        || request_body.get("functions").is_some()
        || request_body.get("function_call").is_some()
    {
        return ProviderKind::FunctionCall;
    }
    if request_body
        .get("messages")
        .is_some_and(JsonValue::is_array)
    {
        return ProviderKind::Chat;
    }
    if request_body.get("prompt").is_some() {
        return ProviderKind::Completion;
    }
    ProviderKind::Custom
}
