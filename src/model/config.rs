use serde::{Deserialize, Serialize};

/// Configuration from `.plantree/config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the planning backend
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// Request timeout. Absent = wait for the backend however long it takes.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            url: default_backend_url(),
            timeout_secs: None,
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Blob store directory, relative to `.plantree/`
    #[serde(default = "default_store_dir")]
    pub dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            dir: default_store_dir(),
        }
    }
}

fn default_store_dir() -> String {
    "store".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory for `pt export` files (default: current directory)
    #[serde(default)]
    pub dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_gets_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.backend.url, "http://localhost:8000");
        assert_eq!(config.backend.timeout_secs, None);
        assert_eq!(config.store.dir, "store");
        assert!(config.export.dir.is_none());
    }

    #[test]
    fn test_partial_backend_table() {
        let config: AppConfig = toml::from_str("[backend]\ntimeout_secs = 90\n").unwrap();
        assert_eq!(config.backend.url, "http://localhost:8000");
        assert_eq!(config.backend.timeout_secs, Some(90));
    }
}
