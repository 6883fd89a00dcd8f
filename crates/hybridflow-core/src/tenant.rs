use serde::{Deserialize, Serialize};

/// A WhatsApp-enabled business account, addressed by its gateway instance name.
///
/// Read-only to the reply pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: i64,
    pub instance_name: String,
    /// Gateway base URL. `None` falls back to the process-wide default.
    pub server_url: Option<String>,
    /// Gateway credential. `None` falls back to the process-wide default.
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    /// Provider selector, e.g. `anthropic` or `openai`.
    pub llm_provider: Option<String>,
}

impl Tenant {
    /// The tenant prompt if set and non-blank, else `default`.
    pub fn prompt_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.system_prompt.as_deref() {
            Some(p) if !p.trim().is_empty() => p,
            _ => default,
        }
    }

    /// The tenant provider selector if set and non-blank, else `default`.
    pub fn provider_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.llm_provider.as_deref() {
            Some(p) if !p.trim().is_empty() => p,
            _ => default,
        }
    }
}
