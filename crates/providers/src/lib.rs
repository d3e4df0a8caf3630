//! LLM Provider implementations for parrot.
//!
//! All providers implement the `parrot_core::Provider` trait. Every
//! configured backend speaks the OpenAI chat-completions dialect, so
//! [`build_provider`] only has to pick a base URL and a key.

pub mod openai_compat;

use std::sync::Arc;

use parrot_config::ResolvedModel;
use parrot_core::error::ProviderError;
use parrot_core::provider::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Create the provider serving `model`.
pub fn build_provider(model: &ResolvedModel) -> Result<Arc<dyn Provider>, ProviderError> {
    if model.api_key.is_none() {
        tracing::warn!(
            provider = %model.provider_id,
            "No API key configured; requests will be sent without authentication"
        );
    }
    let provider = OpenAiCompatProvider::new(&model.provider_id, &model.base_url, model.api_key.clone())?;
    Ok(Arc::new(provider))
}
