//! Provider and model lookup.
//!
//! Providers and models live in two flat vectors. A model refers to its
//! provider by [`ProviderIndex`]; [`ModelRegistry::resolve`] joins the two
//! into a self-contained [`ResolvedModel`].

use crate::{AppConfig, ConfigError, SelectedModel};

/// Position of a provider inside a [`ModelRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderIndex(usize);

#[derive(Clone)]
pub struct ProviderEntry {
    pub id: String,
    pub name: String,
    pub base_url: String,
    /// Resolved key; `None` when neither the config nor the environment has one.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub id: String,
    pub name: String,
    pub provider: ProviderIndex,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

/// Everything needed to talk to one model, with config defaults applied.
#[derive(Clone)]
pub struct ResolvedModel {
    pub provider_id: String,
    pub provider_name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model_id: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: Option<f32>,
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("provider_id", &self.provider_id)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model_id", &self.model_id)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    providers: Vec<ProviderEntry>,
    models: Vec<ModelEntry>,
    default_max_tokens: u32,
    default_temperature: f32,
    default_top_p: Option<f32>,
}

/// Resolve a configured key: `env:VAR` reads the variable, anything else is
/// taken literally. Falls back to `PARROT_API_KEY` when nothing is found.
pub fn resolve_api_key(raw: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    let direct = match raw {
        Some(value) => match value.strip_prefix("env:") {
            Some(var) => lookup(var),
            None => Some(value.to_string()),
        },
        None => None,
    };
    direct
        .filter(|key| !key.is_empty())
        .or_else(|| lookup("PARROT_API_KEY").filter(|key| !key.is_empty()))
}

impl ModelRegistry {
    /// Build the registry, resolving API keys through `lookup`.
    pub fn from_config(config: &AppConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut registry = Self {
            default_max_tokens: config.max_tokens,
            default_temperature: config.temperature,
            default_top_p: config.top_p,
            ..Self::default()
        };
        for provider in &config.providers {
            let index = ProviderIndex(registry.providers.len());
            let api_key = resolve_api_key(provider.api_key.as_deref(), &lookup);
            if api_key.is_none() {
                tracing::debug!(provider = %provider.id, "No API key resolved");
            }
            registry.providers.push(ProviderEntry {
                id: provider.id.clone(),
                name: provider.name.clone(),
                base_url: provider.base_url.clone(),
                api_key,
            });
            registry.models.extend(provider.models.iter().map(|m| ModelEntry {
                id: m.id.clone(),
                name: m.name.clone(),
                provider: index,
                max_tokens: m.max_tokens,
                temperature: m.temperature,
                top_p: m.top_p,
            }));
        }
        registry
    }

    pub fn provider(&self, index: ProviderIndex) -> &ProviderEntry {
        &self.providers[index.0]
    }

    pub fn providers(&self) -> impl Iterator<Item = (ProviderIndex, &ProviderEntry)> {
        self.providers
            .iter()
            .enumerate()
            .map(|(i, p)| (ProviderIndex(i), p))
    }

    pub fn find_provider(&self, id: &str) -> Option<ProviderIndex> {
        self.providers.iter().position(|p| p.id == id).map(ProviderIndex)
    }

    pub fn models_for(&self, index: ProviderIndex) -> impl Iterator<Item = &ModelEntry> {
        self.models.iter().filter(move |m| m.provider == index)
    }

    /// Join a provider and one of its models.
    pub fn resolve(&self, provider_id: &str, model_id: &str) -> Result<ResolvedModel, ConfigError> {
        let index = self
            .find_provider(provider_id)
            .ok_or_else(|| ConfigError::UnknownProvider(provider_id.to_string()))?;
        let model = self
            .models_for(index)
            .find(|m| m.id == model_id)
            .ok_or_else(|| ConfigError::UnknownModel {
                provider: provider_id.to_string(),
                model: model_id.to_string(),
            })?;
        let provider = self.provider(index);

        Ok(ResolvedModel {
            provider_id: provider.id.clone(),
            provider_name: provider.name.clone(),
            base_url: provider.base_url.clone(),
            api_key: provider.api_key.clone(),
            model_id: model.id.clone(),
            model_name: model.name.clone(),
            max_tokens: model.max_tokens.unwrap_or(self.default_max_tokens),
            temperature: model.temperature.unwrap_or(self.default_temperature),
            top_p: model.top_p.or(self.default_top_p),
        })
    }

    pub fn resolve_selected(&self, selected: &SelectedModel) -> Result<ResolvedModel, ConfigError> {
        self.resolve(&selected.provider, &selected.model)
    }
}
