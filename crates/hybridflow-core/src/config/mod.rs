mod defaults;
mod providers;


pub use defaults::DEFAULT_WEBHOOK_SECRET;
pub use providers::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::HybridflowError;
use defaults::*;

/// Top-level HybridFlow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub reply: ReplyConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub socket: SocketConfig,
    #[serde(default)]
    pub resume: ResumeConfig,
    /// Tenants seeded into the store at startup.
    #[serde(default, rename = "tenant")]
    pub tenants: Vec<TenantSeed>,
}

/// HTTP server and process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `text` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Directory for daily rolling log files. Unset = stdout only.
    #[serde(default)]
    pub log_dir: Option<String>,
    /// Bearer token for `/api/*`. Empty = no auth (for local-only use).
    #[serde(default)]
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_dir: None,
            api_key: String::new(),
        }
    }
}

/// SQLite store config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Evolution gateway defaults, used when a tenant carries no own credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Shared secret for webhook HMAC. Checked only once changed from the default.
    #[serde(default = "default_webhook_secret")]
    pub webhook_secret: String,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    #[serde(default = "default_lifecycle_timeout_secs")]
    pub lifecycle_timeout_secs: u64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            api_key: String::new(),
            webhook_secret: default_webhook_secret(),
            send_timeout_secs: default_send_timeout_secs(),
            lifecycle_timeout_secs: default_lifecycle_timeout_secs(),
        }
    }
}

impl EvolutionConfig {
    /// Whether webhook signatures must be verified.
    pub fn signature_required(&self) -> bool {
        !self.webhook_secret.is_empty() && self.webhook_secret != DEFAULT_WEBHOOK_SECRET
    }
}

/// Direct-mode reply behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,
    #[serde(default = "default_true")]
    pub delay_enabled: bool,
    #[serde(default = "default_delay_min_ms")]
    pub delay_min_ms: u64,
    #[serde(default = "default_delay_max_ms")]
    pub delay_max_ms: u64,
    #[serde(default = "default_true")]
    pub typing_enabled: bool,
    /// Presence window announced before generation starts.
    #[serde(default = "default_typing_initial_ms")]
    pub typing_initial_ms: u64,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    /// Chat-id suffixes that mark alternate-addressing contacts.
    #[serde(default = "default_alternate_suffixes")]
    pub alternate_suffixes: Vec<String>,
    /// Prior chat messages passed to the LLM. 0 = none.
    #[serde(default)]
    pub history_messages: usize,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            default_system_prompt: default_system_prompt(),
            delay_enabled: true,
            delay_min_ms: default_delay_min_ms(),
            delay_max_ms: default_delay_max_ms(),
            typing_enabled: true,
            typing_initial_ms: default_typing_initial_ms(),
            preview_chars: default_preview_chars(),
            alternate_suffixes: default_alternate_suffixes(),
            history_messages: 0,
        }
    }
}

/// External workflow delegation (n8n-style webhook).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Prefix of the ledger action tags (`<name>_triggered`).
    #[serde(default = "default_workflow_name")]
    pub name: String,
    /// Path appended to `webhook_url`.
    #[serde(default = "default_workflow_path")]
    pub path: String,
    #[serde(default = "default_workflow_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: String::new(),
            api_key: String::new(),
            name: default_workflow_name(),
            path: default_workflow_path(),
            timeout_secs: default_workflow_timeout_secs(),
        }
    }
}

/// Socket.IO push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `global` or `instance`.
    #[serde(default = "default_socket_mode")]
    pub mode: String,
    /// Falls back to `evolution.server_url` when empty.
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: default_socket_mode(),
            server_url: String::new(),
            api_key: String::new(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            reconnect_max_secs: default_reconnect_max_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Auto-resume of paused sessions and ledger retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_resume_after_hours")]
    pub resume_after_hours: i64,
    #[serde(default = "default_ledger_retention_days")]
    pub ledger_retention_days: i64,
    #[serde(default = "default_resume_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_cron_secret")]
    pub cron_secret: String,
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resume_after_hours: default_resume_after_hours(),
            ledger_retention_days: default_ledger_retention_days(),
            interval_secs: default_resume_interval_secs(),
            cron_secret: default_cron_secret(),
        }
    }
}

/// A tenant declared in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSeed {
    pub instance_name: String,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub llm_provider: Option<String>,
}

impl Config {
    /// Override secrets and endpoints from well-known environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("EVOLUTION_SERVER_URL") {
            self.evolution.server_url = v;
        }
        if let Some(v) = get("EVOLUTION_API_KEY") {
            self.evolution.api_key = v;
        }
        if let Some(v) = get("EVOLUTION_WEBHOOK_SHARED_SECRET") {
            self.evolution.webhook_secret = v;
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.provider.anthropic.get_or_insert_with(Default::default).api_key = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.provider.openai.get_or_insert_with(Default::default).api_key = v;
        }
        if let Some(v) = get("N8N_WEBHOOK_URL") {
            self.workflow.webhook_url = v;
        }
        if let Some(v) = get("N8N_API_KEY") {
            self.workflow.api_key = v;
        }
        if let Some(v) = get("CRON_SECRET") {
            self.resume.cron_secret = v;
        }
        if let Some(v) = get("API_KEY") {
            self.server.api_key = v;
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), HybridflowError> {
        if self.reply.delay_min_ms > self.reply.delay_max_ms {
            return Err(HybridflowError::Config(format!(
                "reply.delay_min_ms ({}) exceeds reply.delay_max_ms ({})",
                self.reply.delay_min_ms, self.reply.delay_max_ms
            )));
        }
        match self.server.log_format.as_str() {
            "text" | "json" => {}
            other => {
                return Err(HybridflowError::Config(format!(
                    "unknown server.log_format: {other}"
                )))
            }
        }
        match self.socket.mode.as_str() {
            "global" | "instance" => {}
            other => {
                return Err(HybridflowError::Config(format!(
                    "unknown socket.mode: {other}"
                )))
            }
        }
        if self.resume.resume_after_hours < 0 || self.resume.ledger_retention_days < 0 {
            return Err(HybridflowError::Config(
                "resume windows must not be negative".into(),
            ));
        }
        if self.workflow.enabled && self.workflow.webhook_url.is_empty() {
            return Err(HybridflowError::Config(
                "workflow.enabled requires workflow.webhook_url".into(),
            ));
        }
        Ok(())
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Environment overrides
/// are applied and the result is validated either way.
pub fn load(path: &str) -> Result<Config, HybridflowError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HybridflowError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str::<Config>(&content)
            .map_err(|e| HybridflowError::Config(format!("failed to parse config: {e}")))?
    } else {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}
