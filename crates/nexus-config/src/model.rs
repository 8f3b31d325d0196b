// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Nexus bridge engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level Nexus configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NexusConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Credential vault settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// HTTP listener for webhooks and the management API.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Routing engine: dispatcher, replay and retry settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Upstream platform endpoints.
    #[serde(default)]
    pub platforms: PlatformsConfig,

    /// AI response orchestration.
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Anthropic API settings for the response scorer.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Internal workspace forwarding target.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Tenants served by this instance.
    #[serde(default)]
    pub tenants: Vec<TenantConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "nexus".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("nexus").join("nexus.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("nexus.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Credential vault configuration.
///
/// The process-wide `secret` is stretched with Argon2id into the AES-256-GCM
/// key that seals every bridge's credentials. It is usually supplied through
/// `NEXUS_VAULT_SECRET` rather than a file.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// Process-wide credential secret. `None` makes every vault call fail closed.
    #[serde(default)]
    pub secret: Option<String>,

    /// Deployment-wide KDF salt. Changing it invalidates stored credentials.
    #[serde(default = "default_key_salt")]
    pub key_salt: String,

    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB).
    #[serde(default = "default_kdf_memory_cost")]
    pub kdf_memory_cost: u32,

    /// Argon2id iteration count (default: 3).
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,

    /// Argon2id parallelism lanes (default: 4).
    #[serde(default = "default_kdf_parallelism")]
    pub kdf_parallelism: u32,
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("secret", &redacted(&self.secret))
            .field("key_salt", &self.key_salt)
            .field("kdf_memory_cost", &self.kdf_memory_cost)
            .field("kdf_iterations", &self.kdf_iterations)
            .field("kdf_parallelism", &self.kdf_parallelism)
            .finish()
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            secret: None,
            key_salt: default_key_salt(),
            kdf_memory_cost: default_kdf_memory_cost(),
            kdf_iterations: default_kdf_iterations(),
            kdf_parallelism: default_kdf_parallelism(),
        }
    }
}

fn default_key_salt() -> String {
    "nexus-bridge.credentials".to_string()
}

fn default_kdf_memory_cost() -> u32 {
    65536
}

fn default_kdf_iterations() -> u32 {
    3
}

fn default_kdf_parallelism() -> u32 {
    4
}

/// HTTP gateway configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Address to bind the server to.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for the management API. `None` rejects every management call.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Externally reachable base URL used to render webhook URLs.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("bearer_token", &redacted(&self.bearer_token))
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            public_base_url: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Routing engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Dispatcher worker tasks.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Bounded dispatcher queue length.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Seconds between sweeps that re-submit unprocessed webhook events.
    #[serde(default = "default_replay_interval_secs")]
    pub replay_interval_secs: u64,

    /// Webhook events with this many failed attempts are no longer replayed.
    #[serde(default = "default_max_webhook_retries")]
    pub max_webhook_retries: u32,

    /// Attempts for retried outbound sends, including the first.
    #[serde(default = "default_send_max_attempts")]
    pub send_max_attempts: u32,

    #[serde(default = "default_send_base_delay_ms")]
    pub send_base_delay_ms: u64,

    #[serde(default = "default_send_max_delay_secs")]
    pub send_max_delay_secs: u64,

    /// Upper bound on a setup-time connection test.
    #[serde(default = "default_test_timeout_secs")]
    pub test_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            replay_interval_secs: default_replay_interval_secs(),
            max_webhook_retries: default_max_webhook_retries(),
            send_max_attempts: default_send_max_attempts(),
            send_base_delay_ms: default_send_base_delay_ms(),
            send_max_delay_secs: default_send_max_delay_secs(),
            test_timeout_secs: default_test_timeout_secs(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_replay_interval_secs() -> u64 {
    60
}

fn default_max_webhook_retries() -> u32 {
    5
}

fn default_send_max_attempts() -> u32 {
    3
}

fn default_send_base_delay_ms() -> u64 {
    1000
}

fn default_send_max_delay_secs() -> u64 {
    30
}

fn default_test_timeout_secs() -> u64 {
    10
}

/// Upstream platform endpoints. Overridable for staging and tests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformsConfig {
    /// Meta Graph API base URL (WhatsApp, Instagram, Facebook).
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,

    #[serde(default = "default_graph_api_version")]
    pub graph_api_version: String,

    /// Telegram Bot API base URL.
    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,

    /// Fallback `signal-cli` binary when a bridge does not set its own.
    #[serde(default = "default_signal_cli_path")]
    pub signal_cli_path: String,

    #[serde(default = "default_signal_timeout_secs")]
    pub signal_timeout_secs: u64,

    /// Per-request timeout for HTTP platform calls.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            graph_api_base: default_graph_api_base(),
            graph_api_version: default_graph_api_version(),
            telegram_api_url: default_telegram_api_url(),
            signal_cli_path: default_signal_cli_path(),
            signal_timeout_secs: default_signal_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_api_version() -> String {
    "v18.0".to_string()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_signal_cli_path() -> String {
    "signal-cli".to_string()
}

fn default_signal_timeout_secs() -> u64 {
    10
}

fn default_http_timeout_secs() -> u64 {
    10
}

/// AI response orchestration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssistantConfig {
    /// Prior messages handed to the scorer.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Scorer calls slower than this degrade to "no suggestion".
    #[serde(default = "default_scorer_timeout_secs")]
    pub scorer_timeout_secs: u64,

    /// Used for tenants that do not define their own keyword list.
    #[serde(default = "default_escalation_keywords")]
    pub default_escalation_keywords: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            scorer_timeout_secs: default_scorer_timeout_secs(),
            default_escalation_keywords: default_escalation_keywords(),
        }
    }
}

fn default_history_limit() -> usize {
    5
}

fn default_scorer_timeout_secs() -> u64 {
    12
}

fn default_escalation_keywords() -> Vec<String> {
    ["human", "agent", "manager", "complaint", "refund", "lawyer"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Anthropic API configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` disables AI suggestions.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Anthropic API version string.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &redacted(&self.api_key))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f64 {
    0.7
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Internal workspace forwarding target.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Base URL of the workspace bridge service. `None` logs forwards instead.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub token: Option<String>,
}

impl fmt::Debug for WorkspaceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceConfig")
            .field("base_url", &self.base_url)
            .field("token", &redacted(&self.token))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and expose `/metrics`.
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// One tenant entry in the `[[tenants]]` array.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TenantConfig {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub industry: Option<String>,

    #[serde(default = "default_ai_enabled")]
    pub ai_enabled: bool,

    /// Allow AI replies to be sent without human review.
    #[serde(default)]
    pub auto_respond: bool,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Empty means "use `assistant.default_escalation_keywords`".
    #[serde(default)]
    pub escalation_keywords: Vec<String>,

    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_ai_enabled() -> bool {
    true
}

fn default_confidence_threshold() -> f64 {
    0.8
}

fn redacted(value: &Option<String>) -> &'static str {
    if value.is_some() { "[redacted]" } else { "None" }
}
