//! Configuration loading for Equirank.
//! Reads equirank.toml from the current directory or the path in the
//! EQUIRANK_CONFIG env var. `.yaml`/`.yml` paths are parsed as YAML.

use std::path::{Path, PathBuf};

use equirank_llm::{BackendConfig, BackendKind, RouterSettings};
use equirank_ranker::RankerConfig;
use equirank_tasks::TaskConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ranker: RankerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub overview: OverviewConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub router: RouterSettings,
    /// Explicit attempt order; empty means ascending backend priority.
    #[serde(default)]
    pub priority: Vec<BackendKind>,
    /// Empty means every remote service, each offered once its key is set.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

impl LlmConfig {
    /// Backends to try, and whether they were listed explicitly.
    pub fn backend_candidates(&self) -> (Vec<BackendConfig>, bool) {
        if self.backends.is_empty() {
            (default_backends(), false)
        } else {
            (self.backends.clone(), true)
        }
    }
}

/// The local service is opt-in because it needs no credential.
fn default_backends() -> Vec<BackendConfig> {
    BackendKind::ALL
        .into_iter()
        .filter(|k| k.requires_credential())
        .map(BackendConfig::new)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding instruments.csv and bars.csv.
    #[serde(default = "default_data_dir")]
    pub dir: String,
    /// JSON-lines file receiving every produced result.
    #[serde(default)]
    pub archive_path: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { dir: default_data_dir(), archive_path: None }
    }
}

fn default_data_dir() -> String { "./data".to_string() }

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverviewConfig {
    /// Sector labels for the market overview; empty means every sector
    /// present in the instrument list.
    #[serde(default)]
    pub sectors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Toml,
        }
    }
}


impl Config {
    /// Load configuration. An explicit path (argument or EQUIRANK_CONFIG)
    /// must exist; a missing default equirank.toml yields the defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let from_env = std::env::var("EQUIRANK_CONFIG").ok().map(PathBuf::from);
        let (path, required) = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(p) => (p, true),
            None => (PathBuf::from("equirank.toml"), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!(
                    "Config file not found: {}\n\
                     Copy equirank.example.toml to equirank.toml and edit it.",
                    path.display()
                );
            }
            tracing::warn!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::parse(&content, ConfigFormat::from_path(&path))?;
        tracing::info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    pub fn parse(content: &str, format: ConfigFormat) -> anyhow::Result<Self> {
        let mut config: Config = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml if content.trim().is_empty() => Config::default(),
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        };
        let invalid = config.ranker.invalid_weight_tables();
        if !invalid.is_empty() {
            tracing::warn!(tables = ?invalid, "Weight tables do not sum to 1, normalising");
            config.ranker.normalise_weights();
        }
        Ok(config)
    }
}

mod tests;
