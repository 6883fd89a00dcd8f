//! Default value functions used by serde for config deserialization.

pub fn default_true() -> bool {
    true
}

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    8000
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_log_format() -> String {
    "text".to_string()
}

pub fn default_db_path() -> String {
    "~/.hybridflow/data/hybridflow.db".to_string()
}

/// Placeholder secret shipped in example configs. Signature checks stay off
/// until it is replaced.
pub const DEFAULT_WEBHOOK_SECRET: &str = "change-me";

pub fn default_webhook_secret() -> String {
    DEFAULT_WEBHOOK_SECRET.to_string()
}

pub fn default_send_timeout_secs() -> u64 {
    10
}

pub fn default_lifecycle_timeout_secs() -> u64 {
    30
}

pub fn default_provider() -> String {
    "anthropic".to_string()
}

pub fn default_llm_timeout_secs() -> u64 {
    10
}

pub fn default_max_tokens() -> u32 {
    1024
}

pub fn default_temperature() -> f32 {
    0.7
}

pub fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

pub fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn default_system_prompt() -> String {
    "You are a helpful WhatsApp assistant. Respond professionally and concisely to customer inquiries."
        .to_string()
}

pub fn default_delay_min_ms() -> u64 {
    2000
}

pub fn default_delay_max_ms() -> u64 {
    5000
}

pub fn default_typing_initial_ms() -> u64 {
    5000
}

pub fn default_preview_chars() -> usize {
    100
}

pub fn default_alternate_suffixes() -> Vec<String> {
    vec!["@lid".to_string()]
}

pub fn default_workflow_name() -> String {
    "n8n".to_string()
}

pub fn default_workflow_path() -> String {
    "ai-reply".to_string()
}

pub fn default_workflow_timeout_secs() -> u64 {
    5
}

pub fn default_socket_mode() -> String {
    "global".to_string()
}

pub fn default_reconnect_delay_secs() -> u64 {
    5
}

pub fn default_reconnect_max_secs() -> u64 {
    30
}

pub fn default_connect_timeout_secs() -> u64 {
    15
}

pub fn default_resume_after_hours() -> i64 {
    2
}

pub fn default_ledger_retention_days() -> i64 {
    7
}

pub fn default_resume_interval_secs() -> u64 {
    900
}

pub fn default_cron_secret() -> String {
    "change-me-cron-secret".to_string()
}
