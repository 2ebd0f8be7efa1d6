//! TOML-based configuration for Careflow
//!
//! Server, language model, inventory, session and order-retention settings are
//! read from a TOML file (`careflow.toml`). Every section has defaults, so an
//! empty file is a valid configuration. Secrets are never stored in the file:
//! the OpenAI provider names the environment variable that holds its key.
//!
//! # Hot Reloading
//!
//! Configuration changes are automatically detected and applied at runtime.
//! Use [`ConfigManager`] for thread-safe access to the current configuration.
//! Settings read per request (suggestion tuning, history window, retention)
//! take effect immediately; listener address and LLM provider need a restart.

use crate::inventory::{InventoryRecord, DEFAULT_UNIT};
use crate::orders::RetentionPolicy;
use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Root configuration structure loaded from careflow.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CareflowConfig {
    pub server: ServerConfig,
    pub inventory: InventoryConfig,
    pub sessions: SessionsConfig,
    pub orders: OrdersConfig,
    pub llm: LlmConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,
    /// Dashboard events buffered per WebSocket client
    pub event_buffer: usize,
    /// Maximum request body in bytes
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            cors_origins: vec!["*".to_string()],
            event_buffer: crate::events::DEFAULT_EVENT_BUFFER,
            max_body_bytes: 64 * 1024,
        }
    }
}

// ============= Inventory Configuration =============

/// One `[[inventory.seed]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRecord {
    pub location: String,
    pub item: String,
    pub quantity: u32,
    pub min_threshold: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl From<&SeedRecord> for InventoryRecord {
    fn from(seed: &SeedRecord) -> Self {
        InventoryRecord::new(
            seed.location.clone(),
            seed.item.clone(),
            seed.quantity,
            seed.min_threshold,
        )
        .with_unit(seed.unit.clone().unwrap_or_else(|| DEFAULT_UNIT.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Reorders aim for `min_threshold * reorder_multiplier`
    pub reorder_multiplier: f64,
    pub max_transfer_candidates: usize,
    pub estimated_delivery: String,
    /// Starting stock; the demo seed is used when empty
    pub seed: Vec<SeedRecord>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            reorder_multiplier: crate::agents::suggestions::DEFAULT_REORDER_MULTIPLIER,
            max_transfer_candidates: crate::agents::suggestions::DEFAULT_MAX_TRANSFER_CANDIDATES,
            estimated_delivery: crate::agents::suggestions::DEFAULT_ESTIMATED_DELIVERY.to_string(),
            seed: Vec::new(),
        }
    }
}

impl InventoryConfig {
    /// Records to start the store with.
    pub fn records(&self) -> Vec<InventoryRecord> {
        if self.seed.is_empty() {
            demo_seed()
        } else {
            self.seed.iter().map(InventoryRecord::from).collect()
        }
    }

    pub fn suggestion_settings(&self) -> crate::agents::SuggestionSettings {
        crate::agents::SuggestionSettings {
            reorder_multiplier: self.reorder_multiplier,
            max_transfer_candidates: self.max_transfer_candidates,
            estimated_delivery: self.estimated_delivery.clone(),
        }
    }
}

/// Stock used when the configuration does not provide any.
pub fn demo_seed() -> Vec<InventoryRecord> {
    vec![
        InventoryRecord::new("ICU-01", "N95 Masks", 71, 75),
        InventoryRecord::new("ER-01", "N95 Masks", 30, 15),
        InventoryRecord::new("WARD-02", "N95 Masks", 40, 30),
        InventoryRecord::new("ICU-01", "Surgical Gloves", 180, 100).with_unit("pairs"),
        InventoryRecord::new("ER-01", "Surgical Gloves", 90, 100).with_unit("pairs"),
        InventoryRecord::new("WARD-02", "Surgical Gloves", 160, 80).with_unit("pairs"),
        InventoryRecord::new("ICU-01", "Saline Bags", 45, 40).with_unit("bags"),
        InventoryRecord::new("ER-01", "Saline Bags", 60, 30).with_unit("bags"),
        InventoryRecord::new("WARD-02", "Saline Bags", 20, 25).with_unit("bags"),
    ]
}

// ============= Session & Order Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Recent messages passed to the language model
    pub history_window: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            history_window: crate::memory::DEFAULT_HISTORY_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdersConfig {
    pub archive_after_hours: i64,
    pub purge_after_hours: i64,
    pub sweep_interval_secs: u64,
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            archive_after_hours: 24 * 7,
            purge_after_hours: 24 * 30,
            sweep_interval_secs: 3600,
        }
    }
}

impl OrdersConfig {
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy::from_hours(self.archive_after_hours, self.purge_after_hours)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        model: String,
    },
    Offline,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig::Ollama {
            base_url: default_ollama_url(),
            model: "llama3.2".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// One entry per attempt, in milliseconds
    pub attempt_timeouts_ms: Vec<u64>,
    pub offline_response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    // Tables must come after plain values when serialised
    pub provider: ProviderConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            attempt_timeouts_ms: crate::llm::DEFAULT_ATTEMPT_TIMEOUTS
                .iter()
                .map(|d| d.as_millis() as u64)
                .collect(),
            offline_response: crate::llm::DEFAULT_OFFLINE_RESPONSE.to_string(),
            system_prompt: None,
            provider: ProviderConfig::default(),
        }
    }
}

impl LlmConfig {
    pub fn attempt_timeouts(&self) -> Vec<Duration> {
        self.attempt_timeouts_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    DuplicateSeed,
    MissingEnvVar,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialise TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl CareflowConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: CareflowConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

        if self.server.port == 0 {
            return invalid("server.port must be non-zero".to_string());
        }
        if self.server.event_buffer == 0 {
            return invalid("server.event_buffer must be at least 1".to_string());
        }

        let inv = &self.inventory;
        if !inv.reorder_multiplier.is_finite() || inv.reorder_multiplier < 1.0 {
            return invalid(format!(
                "inventory.reorder_multiplier must be >= 1.0, got {}",
                inv.reorder_multiplier
            ));
        }
        for seed in &inv.seed {
            if seed.location.trim().is_empty() || seed.item.trim().is_empty() {
                return invalid("inventory.seed entries need a location and an item".to_string());
            }
        }

        if self.sessions.history_window == 0 {
            return invalid("sessions.history_window must be at least 1".to_string());
        }

        let orders = &self.orders;
        if orders.archive_after_hours < 0 || orders.purge_after_hours < 0 {
            return invalid("orders retention hours must not be negative".to_string());
        }
        if orders.purge_after_hours < orders.archive_after_hours {
            return invalid(format!(
                "orders.purge_after_hours ({}) must not be less than archive_after_hours ({})",
                orders.purge_after_hours, orders.archive_after_hours
            ));
        }
        if orders.sweep_interval_secs == 0 {
            return invalid("orders.sweep_interval_secs must be at least 1".to_string());
        }

        let llm = &self.llm;
        if llm.attempt_timeouts_ms.is_empty() || llm.attempt_timeouts_ms.contains(&0) {
            return invalid(
                "llm.attempt_timeouts_ms needs at least one non-zero timeout".to_string(),
            );
        }
        match &llm.provider {
            ProviderConfig::Ollama { model, .. } | ProviderConfig::OpenAI { model, .. }
                if model.trim().is_empty() =>
            {
                return invalid("llm.provider.model must not be empty".to_string());
            }
            ProviderConfig::OpenAI { api_key_env, .. } if api_key_env.trim().is_empty() => {
                return invalid("llm.provider.api_key_env must not be empty".to_string());
            }
            _ => {}
        }

        Ok(())
    }

    /// Validate and collect non-fatal warnings
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;
        let mut warnings = Vec::new();

        let mut seen = HashSet::new();
        for seed in &self.inventory.seed {
            let key = (seed.location.to_lowercase(), seed.item.to_lowercase());
            if !seen.insert(key) {
                warnings.push(ConfigWarning {
                    kind: ConfigWarningKind::DuplicateSeed,
                    message: format!(
                        "Seed for {} at {} appears more than once; the last entry wins",
                        seed.item, seed.location
                    ),
                });
            }
        }

        if let ProviderConfig::OpenAI { api_key_env, .. } = &self.llm.provider {
            if self.resolve_env(api_key_env).is_none() {
                warnings.push(ConfigWarning {
                    kind: ConfigWarningKind::MissingEnvVar,
                    message: format!(
                        "Environment variable '{}' is not set; chat will use the offline reply",
                        api_key_env
                    ),
                });
            }
        }

        Ok(warnings)
    }

    /// Resolve an environment variable by name
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Written by `careflow-server init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Careflow server configuration

[server]
host = "127.0.0.1"
port = 3000
log_level = "info"       # or use RUST_LOG
log_format = "pretty"    # "pretty" or "json"
cors_origins = ["*"]
event_buffer = 256

[inventory]
reorder_multiplier = 2.0
max_transfer_candidates = 3
estimated_delivery = "2-3 business days"

# Starting stock. Without any [[inventory.seed]] entries a demo seed is used.
[[inventory.seed]]
location = "ICU-01"
item = "N95 Masks"
quantity = 71
min_threshold = 75

[[inventory.seed]]
location = "ER-01"
item = "N95 Masks"
quantity = 30
min_threshold = 15

[[inventory.seed]]
location = "WARD-02"
item = "N95 Masks"
quantity = 40
min_threshold = 30

[sessions]
history_window = 10

[orders]
archive_after_hours = 168
purge_after_hours = 720
sweep_interval_secs = 3600

[llm]
attempt_timeouts_ms = [10000, 8000]

[llm.provider]
type = "ollama"
base_url = "http://localhost:11434"
model = "llama3.2"

# [llm.provider]
# type = "openai"
# api_key_env = "OPENAI_API_KEY"
# api_base = "https://api.openai.com/v1"
# model = "gpt-4o-mini"
"#;

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ConfigManager {
    config: Arc<ArcSwap<CareflowConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
}

impl ConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = CareflowConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
        })
    }

    /// Create a config manager directly from a config (useful for testing)
    /// This won't have file watching capabilities.
    pub fn from_config(config: CareflowConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("careflow.toml"),
            watcher: RwLock::new(None),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<CareflowConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = CareflowConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&mut self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);
        let file_name = config_path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if ours && (event.kind.is_modify() || event.kind.is_create()) {
                        // Debounced in the receiver
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        // Editors often replace the file, so watch the directory
        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let mut last_reload: Option<std::time::Instant> = None;
            let debounce_duration = Duration::from_millis(500);

            while rx.recv().await.is_some() {
                if last_reload.is_some_and(|t| t.elapsed() < debounce_duration) {
                    continue;
                }

                // Let the write finish
                tokio::time::sleep(Duration::from_millis(100)).await;

                match CareflowConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = Some(std::time::Instant::now());
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }
}

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
        }
    }
}
