//! Configuration loading, validation, and management for Issola.
//!
//! Loads configuration from `~/.issola/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.issola/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model used for the main decision loop
    #[serde(default = "default_smart_model")]
    pub smart_model: String,

    /// Model used for summaries, JSON repair, sub-agents and `ask_myself`
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Agent loop behavior
    #[serde(default)]
    pub agent: AgentSettings,

    /// Model-call retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Durable store locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Web search API
    #[serde(default)]
    pub search: SearchConfig,

    /// Background research worker pool
    #[serde(default)]
    pub research: ResearchConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_smart_model() -> String {
    "gpt-4".into()
}
fn default_fast_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4000
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("smart_model", &self.smart_model)
            .field("fast_model", &self.fast_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("retry", &self.retry)
            .field("storage", &self.storage)
            .field("search", &self.search)
            .field("research", &self.research)
            .finish()
    }
}

/// Persona, loop guards and run modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_ai_name")]
    pub name: String,

    #[serde(default = "default_ai_role")]
    pub role: String,

    #[serde(default = "default_goals")]
    pub goals: Vec<String>,

    /// Token budget for the replayed conversation (excluding the preamble)
    #[serde(default = "default_memory_budget")]
    pub memory_budget_tokens: usize,

    /// Stop after this many iterations; unset means no limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    /// Run without asking the operator before each command
    #[serde(default)]
    pub continuous: bool,

    /// Narrate thoughts
    #[serde(default)]
    pub speak: bool,

    /// Verbose logging, including JSON repair attempts
    #[serde(default)]
    pub debug: bool,

    /// Ask the model to fix its own malformed JSON
    #[serde(default = "default_true")]
    pub repair_with_model: bool,

    /// Memories recalled into each prompt
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,

    /// Length of a `take_break` pause
    #[serde(default = "default_break_secs")]
    pub break_secs: u64,
}

fn default_ai_name() -> String {
    "Issola".into()
}
fn default_ai_role() -> String {
    "an AI designed to fetch a task and complete it using the available resources and those available online as needed.".into()
}
fn default_goals() -> Vec<String> {
    vec![
        "Research the assigned topic thoroughly".into(),
        "Record findings in the workspace".into(),
        "Mark the task complete when finished".into(),
    ]
}
fn default_memory_budget() -> usize {
    7000
}
fn default_true() -> bool {
    true
}
fn default_recall_limit() -> usize {
    5
}
fn default_break_secs() -> u64 {
    1_800
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            name: default_ai_name(),
            role: default_ai_role(),
            goals: default_goals(),
            memory_budget_tokens: default_memory_budget(),
            max_iterations: None,
            continuous: false,
            speak: false,
            debug: false,
            repair_with_model: true,
            recall_limit: default_recall_limit(),
            break_secs: default_break_secs(),
        }
    }
}

/// Bounded exponential backoff for the model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Per-attempt timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Where the durable stores live. Relative paths resolve against `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Defaults to `~/.issola`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    #[serde(default = "default_visited_file")]
    pub visited_file: PathBuf,

    #[serde(default = "default_topics_file")]
    pub topics_file: PathBuf,

    #[serde(default = "default_collection_file")]
    pub collection_file: PathBuf,

    #[serde(default = "default_memory_file")]
    pub memory_file: PathBuf,

    #[serde(default = "default_tasks_file")]
    pub tasks_file: PathBuf,

    /// Appended with every new research summary
    #[serde(default = "default_research_log")]
    pub research_log: PathBuf,

    /// Sandbox for the file commands
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
}

fn default_visited_file() -> PathBuf {
    "visited_urls.json".into()
}
fn default_topics_file() -> PathBuf {
    "researched_topics.json".into()
}
fn default_collection_file() -> PathBuf {
    "collection.json".into()
}
fn default_memory_file() -> PathBuf {
    "memories.jsonl".into()
}
fn default_tasks_file() -> PathBuf {
    "research_tasks.json".into()
}
fn default_research_log() -> PathBuf {
    "research.txt".into()
}
fn default_workspace() -> PathBuf {
    "workspace".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            visited_file: default_visited_file(),
            topics_file: default_topics_file(),
            collection_file: default_collection_file(),
            memory_file: default_memory_file(),
            tasks_file: default_tasks_file(),
            research_log: default_research_log(),
            workspace: default_workspace(),
        }
    }
}

impl StorageConfig {
    /// The base directory for every relative store path.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(AppConfig::config_dir)
    }

    /// Resolve a configured path against the data directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }
}

/// JSON search API (RapidAPI-style `results[].url`).
#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_host")]
    pub api_host: String,

    #[serde(default = "default_num_results")]
    pub num_results: usize,
}

fn default_search_url() -> String {
    "https://google-web-search1.p.rapidapi.com/".into()
}
fn default_search_host() -> String {
    "google-web-search1.p.rapidapi.com".into()
}
fn default_num_results() -> usize {
    3
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_url: default_search_url(),
            api_key: None,
            api_host: default_search_host(),
            num_results: default_num_results(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("api_host", &self.api_host)
            .field("num_results", &self.num_results)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Number of background workers; 0 disables the pool
    #[serde(default)]
    pub workers: usize,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 {
    2_000
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.issola/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from a specific path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    ///
    /// - `ISSOLA_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `ISSOLA_API_URL`, `ISSOLA_SMART_MODEL`, `ISSOLA_FAST_MODEL`
    /// - `ISSOLA_SEARCH_API_KEY`
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ISSOLA_API_KEY").or_else(|| {
            self.api_key.is_none().then(|| lookup("OPENAI_API_KEY")).flatten()
        }) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("ISSOLA_API_URL") {
            self.api_url = url;
        }
        if let Some(model) = lookup("ISSOLA_SMART_MODEL") {
            self.smart_model = model;
        }
        if let Some(model) = lookup("ISSOLA_FAST_MODEL") {
            self.fast_model = model;
        }
        if let Some(key) = lookup("ISSOLA_SEARCH_API_KEY") {
            self.search.api_key = Some(key);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".issola")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.memory_budget_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "agent.memory_budget_tokens must be > 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.research.workers > 16 {
            return Err(ConfigError::ValidationError(
                "research.workers must be at most 16".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            smart_model: default_smart_model(),
            fast_model: default_fast_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentSettings::default(),
            retry: RetryConfig::default(),
            storage: StorageConfig::default(),
            search: SearchConfig::default(),
            research: ResearchConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
