use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub sentiment: SentimentConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default = "default_locations")]
    pub locations: Vec<LocationFactorConfig>,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactsConfig {
    pub columns_path: String,
    pub model_path: String,
    pub hpi_csv_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_order")]
    pub order: [usize; 3],
    #[serde(default = "default_fit_timeout")]
    pub fit_timeout_secs: u64,
    #[serde(default)]
    pub fallback_growth_rate: f64,
    #[serde(default)]
    pub fallback_volatility: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
            fit_timeout_secs: default_fit_timeout(),
            fallback_growth_rate: 0.0,
            fallback_volatility: 0.0,
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentBackendKind {
    Lexicon,
    Remote,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentimentConfig {
    #[serde(default = "default_backend")]
    pub backend: SentimentBackendKind,
    #[serde(default)]
    pub service_url: Option<String>,
    #[serde(default = "default_sentiment_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_topic")]
    pub default_topic: String,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            service_url: None,
            timeout_ms: default_sentiment_timeout(),
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            default_topic: default_topic(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_growth_weight")]
    pub growth_weight: f64,
    #[serde(default = "default_volatility_weight")]
    pub volatility_weight: f64,
    #[serde(default = "default_sentiment_weight")]
    pub sentiment_weight: f64,
    #[serde(default = "default_growth_sensitivity")]
    pub growth_sensitivity: f64,
    #[serde(default = "default_volatility_ceiling")]
    pub volatility_ceiling: f64,
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_location_factor")]
    pub default_location_factor: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            growth_weight: default_growth_weight(),
            volatility_weight: default_volatility_weight(),
            sentiment_weight: default_sentiment_weight(),
            growth_sensitivity: default_growth_sensitivity(),
            volatility_ceiling: default_volatility_ceiling(),
            low_threshold: default_low_threshold(),
            high_threshold: default_high_threshold(),
            default_location_factor: default_location_factor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationFactorConfig {
    pub name: String,
    pub factor: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub csv_logging: bool,
    #[serde(default = "default_csv_log_path")]
    pub csv_log_path: String,
}

fn default_order() -> [usize; 3] { [1, 1, 1] }
fn default_fit_timeout() -> u64 { 30 }
fn default_max_iterations() -> usize { 2000 }
fn default_backend() -> SentimentBackendKind { SentimentBackendKind::Lexicon }
fn default_sentiment_timeout() -> u64 { 2000 }
fn default_cache_ttl() -> u64 { 300 }
fn default_cache_capacity() -> usize { 1024 }
fn default_topic() -> String { "real estate".to_string() }
fn default_growth_weight() -> f64 { 0.45 }
fn default_volatility_weight() -> f64 { 0.35 }
fn default_sentiment_weight() -> f64 { 0.20 }
fn default_growth_sensitivity() -> f64 { 5.0 }
fn default_volatility_ceiling() -> f64 { 0.05 }
fn default_low_threshold() -> f64 { 35.0 }
fn default_high_threshold() -> f64 { 65.0 }
fn default_location_factor() -> f64 { 1.0 }
fn default_csv_log_path() -> String { "predictions.csv".to_string() }

fn default_locations() -> Vec<LocationFactorConfig> {
    vec![
        LocationFactorConfig { name: "indiranagar".to_string(), factor: 1.10 },
        LocationFactorConfig { name: "whitefield".to_string(), factor: 0.95 },
        LocationFactorConfig { name: "electronic city".to_string(), factor: 1.02 },
    ]
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub sentiment_service_url: Option<String>,
    pub bind_addr: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Environment values win over the file when present
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(url) = &env.sentiment_service_url {
            self.sentiment.service_url = Some(url.clone());
        }
        if let Some(addr) = &env.bind_addr {
            self.server.bind_addr = addr.clone();
        }
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            sentiment_service_url: std::env::var("SENTIMENT_SERVICE_URL").ok(),
            bind_addr: std::env::var("BIND_ADDR").ok(),
        })
    }
}
