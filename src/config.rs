use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{CieError, Result};

/// Name of the configuration file stored inside the `.cie` directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Name of the hidden directory used to store project metadata.
pub const CIE_DIR: &str = ".cie";

/// Query endpoint used when the configuration does not name one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:9090";

/// Embedding service settings for semantic search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub url: String,
    pub model: String,
}

/// Configuration for a project served by a query endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CieConfig {
    /// Schema version of the configuration.
    pub version: u32,
    /// Project identifier sent with every query.
    pub project_id: String,
    /// Base URL of the query endpoint.
    pub base_url: String,
    /// Per-request timeout in seconds; zero selects the client default.
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingConfig>,
}

impl Default for CieConfig {
    fn default() -> Self {
        Self {
            version: 1,
            project_id: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 90,
            embedding: None,
        }
    }
}

/// Returns the path to the `.cie` directory within the given project root.
pub fn get_cie_dir(project_root: &Path) -> PathBuf {
    project_root.join(CIE_DIR)
}

/// Returns the path to the configuration file within the `.cie` directory.
pub fn get_config_path(project_root: &Path) -> PathBuf {
    get_cie_dir(project_root).join(CONFIG_FILENAME)
}

fn default_project_id(project_root: &Path) -> String {
    project_root
        .canonicalize()
        .unwrap_or_else(|_| project_root.to_path_buf())
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Loads the configuration from disk.
///
/// If the configuration file does not exist, returns a default configuration
/// whose `project_id` is the project directory's name.
pub fn load_config(project_root: &Path) -> Result<CieConfig> {
    let config_path = get_config_path(project_root);

    if !config_path.exists() {
        return Ok(CieConfig {
            project_id: default_project_id(project_root),
            ..CieConfig::default()
        });
    }

    let contents = fs::read_to_string(&config_path).map_err(|e| CieError::Config {
        message: format!(
            "failed to read config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    let mut config: CieConfig = serde_json::from_str(&contents).map_err(|e| CieError::Config {
        message: format!(
            "failed to parse config file '{}': {}",
            config_path.display(),
            e
        ),
    })?;

    if config.project_id.is_empty() {
        config.project_id = default_project_id(project_root);
    }

    Ok(config)
}

/// Saves the configuration to disk using an atomic write.
///
/// Writes to a temporary file first and then renames it into place.
pub fn save_config(project_root: &Path, config: &CieConfig) -> Result<()> {
    let cie_dir = get_cie_dir(project_root);
    fs::create_dir_all(&cie_dir).map_err(|e| CieError::Config {
        message: format!(
            "failed to create config directory '{}': {}",
            cie_dir.display(),
            e
        ),
    })?;

    let config_path = get_config_path(project_root);
    let tmp_path = config_path.with_extension("tmp");

    let json = serde_json::to_string_pretty(config).map_err(|e| CieError::Config {
        message: format!("failed to serialize config: {}", e),
    })?;

    fs::write(&tmp_path, &json).map_err(|e| CieError::Config {
        message: format!(
            "failed to write temporary config file '{}': {}",
            tmp_path.display(),
            e
        ),
    })?;

    fs::rename(&tmp_path, &config_path).map_err(|e| CieError::Config {
        message: format!(
            "failed to rename temporary config file '{}' to '{}': {}",
            tmp_path.display(),
            config_path.display(),
            e
        ),
    })?;

    Ok(())
}
