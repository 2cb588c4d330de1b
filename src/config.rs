use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub max_concurrent: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub health_check_url: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            health_check_url: None,
        }
    }
}

impl ScraperConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MercadoLibreConfig {
    pub search_query: String,
    pub seed_urls: Vec<String>,
}

impl Default for MercadoLibreConfig {
    fn default() -> Self {
        Self {
            search_query: "smartphone".to_string(),
            seed_urls: [
                "https://example.com/product/smartphone-samsung-a54",
                "https://example.com/product/iphone-13-128gb",
                "https://example.com/product/xiaomi-redmi-note-12",
                "https://example.com/product/motorola-edge-30",
                "https://example.com/product/samsung-galaxy-s23",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OlxConfig {
    pub category: String,
    pub base_url: String,
}

impl Default for OlxConfig {
    fn default() -> Self {
        Self {
            category: "electronics".to_string(),
            base_url: "https://example-olx.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SitesConfig {
    pub mercadolibre: MercadoLibreConfig,
    pub olx: OlxConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog_path: PathBuf,
    pub scraper: ScraperConfig,
    pub api: ApiConfig,
    pub sites: SitesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("products.json"),
            scraper: ScraperConfig::default(),
            api: ApiConfig::default(),
            sites: SitesConfig::default(),
        }
    }
}

/// Loads the JSON config. A missing file means "use defaults".
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(AppConfig::default()),
        Err(source) => {
            return Err(ConfigError::Io { path: path.to_path_buf(), source });
        }
    };
    let config: AppConfig = serde_json::from_str(&content)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
    Ok(config)
}
