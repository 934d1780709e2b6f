//! Model registry for managing available LLM providers

use super::{all_models, LlmError, LlmRequest, LlmResponse, LlmService, LoggingService, OpenAIService, Provider};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

const PREFERRED_DEFAULT: &str = "claude-4.5-haiku";

/// Configuration for LLM providers
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    /// Chat-completions API root, e.g. a Workers AI account endpoint
    pub openai_base_url: Option<String>,
    /// Extra model served by that endpoint
    /// (e.g. `@cf/meta/llama-3.2-3b-instruct`)
    pub openai_model: Option<String>,
    /// Gateway URL; when set, providers are reached through it with an implicit key
    pub gateway: Option<String>,
    /// Default model ID
    pub default_model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            anthropic_api_key: get(Provider::Anthropic.api_key_env_var()),
            openai_api_key: get(Provider::OpenAI.api_key_env_var()),
            openai_base_url: get("OPENAI_BASE_URL"),
            openai_model: get("OPENAI_MODEL"),
            gateway: get("LLM_GATEWAY"),
            default_model: get("DEFAULT_MODEL"),
        }
    }

    fn api_key(&self, provider: Provider) -> Option<String> {
        if self.gateway.is_some() {
            return Some("implicit".to_string());
        }
        match provider {
            Provider::Anthropic => self.anthropic_api_key.clone(),
            Provider::OpenAI => self.openai_api_key.clone(),
        }
    }

    fn base_url(&self, provider: Provider) -> Option<String> {
        match (provider, &self.gateway) {
            (Provider::OpenAI, _) if self.openai_base_url.is_some() => self.openai_base_url.clone(),
            (Provider::OpenAI, Some(gw)) => Some(format!("{}/openai/v1", gw.trim_end_matches('/'))),
            (Provider::Anthropic, Some(gw)) => Some(gw.clone()),
            (_, None) => None,
        }
    }
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: BTreeMap<String, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    /// Create an empty registry for testing purposes
    #[allow(dead_code)]
    pub fn new_empty() -> Self {
        Self {
            services: BTreeMap::new(),
            default_model: PREFERRED_DEFAULT.to_string(),
        }
    }

    pub fn new(config: &LlmConfig) -> Self {
        let mut services: BTreeMap<String, Arc<dyn LlmService>> = BTreeMap::new();

        for model_def in all_models() {
            let Some(api_key) = config.api_key(model_def.provider) else {
                continue;
            };
            let base = config.base_url(model_def.provider);
            match (model_def.factory)(&api_key, base.as_deref()) {
                Ok(service) => {
                    services.insert(
                        model_def.id.to_string(),
                        Arc::new(LoggingService::new(service)),
                    );
                }
                Err(e) => {
                    tracing::warn!(model = model_def.id, error = %e, "Skipping model");
                }
            }
        }

        if let (Some(model), Some(api_key)) =
            (&config.openai_model, config.api_key(Provider::OpenAI))
        {
            let base = config.base_url(Provider::OpenAI);
            match OpenAIService::new(api_key, model.clone(), model.clone(), base.as_deref()) {
                Ok(service) => {
                    services.insert(
                        model.clone(),
                        Arc::new(LoggingService::new(Arc::new(service))),
                    );
                }
                Err(e) => tracing::warn!(model = %model, error = %e, "Skipping model"),
            }
        }

        let default_model = config
            .default_model
            .clone()
            .or_else(|| config.openai_model.clone())
            .or_else(|| {
                if services.contains_key(PREFERRED_DEFAULT) {
                    Some(PREFERRED_DEFAULT.to_string())
                } else {
                    services.keys().next().cloned()
                }
            })
            .unwrap_or_else(|| PREFERRED_DEFAULT.to_string());

        Self {
            services,
            default_model,
        }
    }

    /// Register a service directly (used by tests)
    #[allow(dead_code)]
    pub fn insert(&mut self, service: Arc<dyn LlmService>) {
        self.services.insert(service.model_id().to_string(), service);
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.get(&self.default_model)
    }

    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    pub fn available_models(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }
}

/// Adapter resolving a model from the registry on every call.
///
/// Falls back to the default model; reports a non-retryable error when
/// nothing is configured so the turn fails cleanly instead of at start-up.
pub struct RegistryService {
    registry: Arc<ModelRegistry>,
    model_id: String,
}

impl RegistryService {
    pub fn new(registry: Arc<ModelRegistry>, model_id: impl Into<String>) -> Self {
        Self {
            registry,
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl LlmService for RegistryService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let llm = self
            .registry
            .get(&self.model_id)
            .or_else(|| self.registry.default())
            .ok_or_else(|| LlmError::unavailable("No LLM configured"))?;
        llm.complete(request).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> LlmConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        LlmConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_empty_config_has_no_models() {
        let registry = ModelRegistry::new(&config(&[]));
        assert!(!registry.has_models());
        assert_eq!(registry.default_model_id(), PREFERRED_DEFAULT);
        assert!(registry.default().is_none());
    }

    #[test]
    fn test_anthropic_key_prefers_haiku() {
        let registry = ModelRegistry::new(&config(&[("ANTHROPIC_API_KEY", "sk-test")]));
        assert!(registry.get("claude-4.5-haiku").is_some());
        assert!(registry.get("gpt-4o-mini").is_none());
        assert_eq!(registry.default_model_id(), "claude-4.5-haiku");
    }

    #[test]
    fn test_blank_key_is_unset() {
        let registry = ModelRegistry::new(&config(&[("ANTHROPIC_API_KEY", "  ")]));
        assert!(!registry.has_models());
    }

    #[test]
    fn test_openai_compatible_custom_model_becomes_default() {
        let registry = ModelRegistry::new(&config(&[
            ("OPENAI_API_KEY", "token"),
            ("OPENAI_BASE_URL", "https://example.test/ai/v1"),
            ("OPENAI_MODEL", "@cf/meta/llama-3.2-3b-instruct"),
        ]));
        assert_eq!(registry.default_model_id(), "@cf/meta/llama-3.2-3b-instruct");
        assert!(registry.default().is_some());
    }

    #[test]
    fn test_gateway_enables_all_models() {
        let registry = ModelRegistry::new(&config(&[("LLM_GATEWAY", "http://gw.local/")]));
        assert_eq!(registry.available_models().len(), all_models().len());
    }

    #[tokio::test]
    async fn test_registry_service_without_models() {
        let service = RegistryService::new(Arc::new(ModelRegistry::new_empty()), "missing");
        let err = service
            .complete(&LlmRequest::prompt("hello"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Unavailable);
    }
}
