pub mod anthropic;
pub mod client;
pub mod ollama;
pub mod rewriter;

pub use anthropic::AnthropicProvider;
pub use client::{AiError, CommitContext, MessageProvider, MessageStyle};
pub use ollama::OllamaProvider;
pub use rewriter::{MessageRewriter, RewriteOutcome};

use crate::config::Config;

/// Build the configured message provider, or None when AI is disabled
/// or the anthropic provider has no API key available
pub fn provider_from_config(config: &Config) -> Option<Box<dyn MessageProvider>> {
    match config.ai.provider.as_str() {
        "anthropic" => {
            let api_key = config.get_api_key()?;
            Some(Box::new(AnthropicProvider::with_model(
                api_key,
                config.ai.model.clone(),
            )))
        }
        "ollama" => Some(Box::new(OllamaProvider::with_config(
            config.ai.ollama_base_url.clone(),
            config.ai.model.clone(),
        ))),
        _ => None,
    }
}
