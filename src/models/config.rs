use serde::{Deserialize, Serialize};

use super::search::OutputFormat;

pub const DEFAULT_CATALOG_URL: &str = "https://api.igdb.com/v4/games";
pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11411";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:16334";
pub const DEFAULT_COLLECTION: &str = "gamedex";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    pub fn config_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|p| p.join("gamedex").join("config.toml"))
    }

    pub fn load() -> Result<Self, crate::error::ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            return Ok(config);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<(), crate::error::ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            crate::error::ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }
}

/// External catalog API settings. Credentials come from the environment
/// (`TWITCH_CLIENT_ID`, `TWITCH_APP_ACCESS_TOKEN`) unless set here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_url")]
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_catalog_url() -> String {
    DEFAULT_CATALOG_URL.to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            client_id: None,
            access_token: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl CatalogConfig {
    /// Resolve the client id, preferring the config file over the environment.
    pub fn resolve_client_id(&self) -> Option<String> {
        self.client_id
            .clone()
            .or_else(|| std::env::var("TWITCH_CLIENT_ID").ok())
    }

    /// Resolve the access token, preferring the config file over the environment.
    pub fn resolve_access_token(&self) -> Option<String> {
        self.access_token
            .clone()
            .or_else(|| std::env::var("TWITCH_APP_ACCESS_TOKEN").ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_embed_batch_size")]
    pub batch_size: u32,

    /// Vector dimension produced by the embedding model.
    #[serde(default = "default_dimension")]
    pub dimension: u32,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_embed_batch_size() -> u32 {
    8
}

fn default_dimension() -> u32 {
    1024
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            timeout_secs: default_timeout(),
            batch_size: default_embed_batch_size(),
            dimension: default_dimension(),
        }
    }
}

/// Which vector store backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreDriver {
    #[default]
    Qdrant,
    /// In-process store, useful for dry runs and tests.
    Memory,
}

impl std::str::FromStr for StoreDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(StoreDriver::Qdrant),
            "memory" => Ok(StoreDriver::Memory),
            _ => Err(format!("unknown vector store driver: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: StoreDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: StoreDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
        }
    }
}

/// Sweep geometry and queue tuning for the two pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// First offset of the catalog sweep.
    #[serde(default = "default_sweep_start")]
    pub sweep_start: u64,

    /// Last offset the sweep must cover (inclusive).
    #[serde(default = "default_sweep_end")]
    pub sweep_end: u64,

    /// Records requested per catalog page.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// Gather units per dispatch batch at seed time.
    #[serde(default = "default_gather_batch_size")]
    pub gather_batch_size: u32,

    /// Catalog records per index-queue dispatch batch.
    #[serde(default = "default_index_batch_size")]
    pub index_batch_size: u32,

    /// Pacing step in seconds; dispatch batch k is delayed k steps.
    #[serde(default = "default_pace_secs")]
    pub pace_secs: u64,

    /// Delay before a failed work unit is redelivered.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Delivery attempts before a message is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Max sentences per text chunk.
    #[serde(default = "default_max_sentences")]
    pub max_sentences: u32,
}

fn default_sweep_start() -> u64 {
    50_000
}

fn default_sweep_end() -> u64 {
    300_000
}

fn default_page_limit() -> u32 {
    500
}

fn default_gather_batch_size() -> u32 {
    4
}

fn default_index_batch_size() -> u32 {
    100
}

fn default_pace_secs() -> u64 {
    1
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_sentences() -> u32 {
    3
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sweep_start: default_sweep_start(),
            sweep_end: default_sweep_end(),
            page_limit: default_page_limit(),
            gather_batch_size: default_gather_batch_size(),
            index_batch_size: default_index_batch_size(),
            pace_secs: default_pace_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            max_attempts: default_max_attempts(),
            max_sentences: default_max_sentences(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        if self.page_limit == 0 {
            return Err(crate::error::ConfigError::ValidationError(
                "page_limit must be at least 1".to_string(),
            ));
        }
        if self.sweep_end < self.sweep_start {
            return Err(crate::error::ConfigError::ValidationError(format!(
                "sweep_end {} is before sweep_start {}",
                self.sweep_end, self.sweep_start
            )));
        }
        if self.gather_batch_size == 0 || self.index_batch_size == 0 {
            return Err(crate::error::ConfigError::ValidationError(
                "batch sizes must be at least 1".to_string(),
            ));
        }
        if self.max_sentences == 0 {
            return Err(crate::error::ConfigError::ValidationError(
                "max_sentences must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    #[serde(default)]
    pub default_format: OutputFormat,
}

fn default_limit() -> u32 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_format: OutputFormat::Text,
        }
    }
}
