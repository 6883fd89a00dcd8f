//! Provider registry keyed by selector string.

use crate::{anthropic::AnthropicProvider, openai::OpenAiProvider};
use hybridflow_core::{config::ProviderConfig, error::HybridflowError, traits::Provider};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// The closed set of LLM backends built at startup.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn Provider>>,
    default: String,
}

impl ProviderRegistry {
    /// Build every configured provider. The default selector is built even
    /// without its own section; naming anything else is a config error.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, HybridflowError> {
        let mut providers: BTreeMap<String, Arc<dyn Provider>> = BTreeMap::new();

        let anthropic = config
            .anthropic
            .clone()
            .or_else(|| (config.default == "anthropic").then(Default::default));
        if let Some(cfg) = anthropic {
            providers.insert(
                "anthropic".into(),
                Arc::new(AnthropicProvider::from_config(&cfg, config)?),
            );
        }

        let openai = config
            .openai
            .clone()
            .or_else(|| (config.default == "openai").then(Default::default));
        if let Some(cfg) = openai {
            providers.insert(
                "openai".into(),
                Arc::new(OpenAiProvider::from_config(&cfg, config)?),
            );
        }

        let registry = Self::new(&config.default, providers)?;
        info!(
            "Providers: {} (default: {})",
            registry.names().join(", "),
            registry.default
        );
        Ok(registry)
    }

    pub fn new(
        default: &str,
        providers: BTreeMap<String, Arc<dyn Provider>>,
    ) -> Result<Self, HybridflowError> {
        if !providers.contains_key(default) {
            return Err(HybridflowError::Config(format!(
                "unknown provider selector: {default}"
            )));
        }
        Ok(Self {
            providers,
            default: default.to_string(),
        })
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Resolve a selector. Unknown selectors fail as a generation error so a
    /// bad tenant override degrades to a recorded failure.
    pub fn resolve(&self, selector: &str) -> Result<Arc<dyn Provider>, HybridflowError> {
        self.providers.get(selector).cloned().ok_or_else(|| {
            HybridflowError::Generation(format!("provider not configured: {selector}"))
        })
    }
}
