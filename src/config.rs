use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file structure for `RemedyLens`.
///
/// Lets users save their server and analysis settings instead of repeating
/// them on every run. Command-line flags override file values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Develocity server and window settings
    #[serde(default)]
    pub develocity: DevelocityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DevelocityConfig {
    /// Develocity server base URL
    pub server_url: Option<String>,

    /// Fetch builds since this date ("2024-01-15" or "2024-01-15 08:00")
    pub since: Option<String>,

    /// Build query passed through to the builds listing
    pub query: Option<String>,

    /// Upper bound on builds fetched per model request
    #[serde(default = "default_max_builds_per_request")]
    pub max_builds_per_request: usize,

    /// Override the build cache location
    pub cache_dir: Option<PathBuf>,
}

impl Default for DevelocityConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            since: None,
            query: None,
            max_builds_per_request: default_max_builds_per_request(),
            cache_dir: None,
        }
    }
}

fn default_max_builds_per_request() -> usize {
    100
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./remedylens.toml
    /// 3. ./remedylens.json
    /// 4. ./remedylens.yaml
    /// 5. ./remedylens.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "remedylens.toml",
            "remedylens.json",
            "remedylens.yaml",
            "remedylens.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}
