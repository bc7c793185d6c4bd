//! Provider factory.

use std::sync::Arc;

use tracing::warn;

use atelier_core::LlmChoice;

use crate::anthropic::AnthropicProvider;
use crate::openai::OpenAiProvider;
use crate::provider::LlmProvider;

const OLLAMA_DEFAULT_BASE: &str = "http://localhost:11434/v1";

/// Resolves an [`LlmChoice`] and optional credential to a concrete provider.
///
/// Unknown provider keys fall back to the OpenAI-compatible provider, which
/// is the widest-spoken dialect; the fallback is logged.
pub fn create_provider(choice: &LlmChoice, api_key: Option<&str>) -> Arc<dyn LlmProvider> {
    match choice.provider.to_lowercase().as_str() {
        "anthropic" | "claude" => Arc::new(AnthropicProvider::new(&choice.model, api_key)),
        "ollama" => {
            let base = std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| OLLAMA_DEFAULT_BASE.to_string());
            Arc::new(OpenAiProvider::new(&choice.model, Some(&base), api_key))
        }
        "openai" => Arc::new(OpenAiProvider::new(&choice.model, None, api_key)),
        other => {
            warn!("Unknown provider '{}', falling back to openai", other);
            Arc::new(OpenAiProvider::new(&choice.model, None, api_key))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_providers_resolve_by_name() {
        let anthropic = create_provider(
            &LlmChoice { provider: "Anthropic".into(), model: "claude-sonnet-4-5".into() },
            Some("key"),
        );
        assert_eq!(anthropic.name(), "anthropic");

        let openai = create_provider(
            &LlmChoice { provider: "openai".into(), model: "gpt-4o".into() },
            None,
        );
        assert_eq!(openai.name(), "openai");
    }

    #[test]
    fn unknown_provider_falls_back_to_openai() {
        let provider = create_provider(
            &LlmChoice { provider: "mystery".into(), model: "m1".into() },
            None,
        );
        assert_eq!(provider.name(), "openai");
    }
}
