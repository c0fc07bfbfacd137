//! Provider Manager
//!
//! Registry of available LLM backends with environment-driven discovery.
//! The mock backend is always present so the agent works offline; the
//! first real backend found becomes the default.

use std::collections::HashMap;
use std::sync::Arc;

use assistant_core::{
    error::{AgentError, Result},
    provider::LlmProvider,
};

use crate::{AnthropicProvider, MockProvider, OpenAiProvider};

/// Routes by name to a registered LLM provider
pub struct ProviderManager {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    default_name: String,
}

impl ProviderManager {
    /// Create a manager holding only the mock backend
    pub fn new() -> Self {
        let mock: Arc<dyn LlmProvider> = Arc::new(MockProvider::new());
        let mut providers = HashMap::new();
        providers.insert(mock.name().to_string(), mock);
        Self {
            providers,
            default_name: "mock".to_string(),
        }
    }

    /// Discover backends from the environment.
    ///
    /// Checks `OPENAI_API_KEY` and `ANTHROPIC_API_KEY`; the first backend
    /// configured wins the default slot, falling back to mock.
    pub fn from_env() -> Self {
        let mut manager = Self::new();

        match OpenAiProvider::from_env() {
            Ok(provider) => manager.register(Arc::new(provider), true),
            Err(e) => tracing::debug!("openai backend not configured: {e}"),
        }
        match AnthropicProvider::from_env() {
            Ok(provider) => {
                let promote = manager.default_name == "mock";
                manager.register(Arc::new(provider), promote);
            }
            Err(e) => tracing::debug!("anthropic backend not configured: {e}"),
        }

        tracing::info!(default = %manager.default_name, "provider manager initialized");
        manager
    }

    /// Register a provider under its own name, optionally making it default
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>, make_default: bool) {
        let name = provider.name().to_string();
        if make_default {
            self.default_name.clone_from(&name);
        }
        self.providers.insert(name, provider);
    }

    /// Resolve a provider by name, or the default when `name` is `None`
    pub fn get(&self, name: Option<&str>) -> Result<Arc<dyn LlmProvider>> {
        let name = name.unwrap_or(&self.default_name);
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::ProviderUnavailable(format!("unknown provider '{name}'")))
    }

    /// The default provider (always resolvable)
    pub fn default_provider(&self) -> Arc<dyn LlmProvider> {
        self.providers
            .get(&self.default_name)
            .cloned()
            .unwrap_or_else(|| Arc::new(MockProvider::new()))
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Names of all registered providers (unordered)
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_is_always_registered_and_default() {
        let manager = ProviderManager::new();
        assert_eq!(manager.default_name(), "mock");
        assert_eq!(manager.default_provider().name(), "mock");
        assert!(manager.get(Some("mock")).is_ok());
    }

    #[test]
    fn test_registration_can_promote_default() {
        let mut manager = ProviderManager::new();
        manager.register(Arc::new(OpenAiProvider::new("test-key")), true);

        assert_eq!(manager.default_name(), "openai");
        assert_eq!(manager.get(None).unwrap().name(), "openai");
        // mock stays reachable by explicit name
        assert_eq!(manager.get(Some("mock")).unwrap().name(), "mock");
    }

    #[test]
    fn test_unknown_provider_is_an_error() {
        let manager = ProviderManager::new();
        let err = manager.get(Some("nonexistent")).err().unwrap();
        assert!(err.to_string().contains("nonexistent"));
    }
}
