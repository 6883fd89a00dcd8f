//! # hybridflow-providers
//!
//! LLM backends, the provider registry, and the external workflow hook.

pub mod anthropic;
pub mod openai;
pub mod registry;
pub mod workflow;

pub use registry::ProviderRegistry;
pub use workflow::WorkflowHook;

use hybridflow_core::error::HybridflowError;
use std::time::Duration;

/// reqwest client with a whole-request timeout.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, HybridflowError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| HybridflowError::Config(format!("failed to build http client: {e}")))
}
