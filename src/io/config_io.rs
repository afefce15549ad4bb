use std::fs;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;
use crate::model::config::AppConfig;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not parse config.toml: {0}")]
    Edit(#[from] toml_edit::TomlError),
    #[error("unknown config key: {0} (expected one of: {keys})", keys = SETTABLE_KEYS.join(", "))]
    UnknownKey(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Keys `pt config set` understands
pub const SETTABLE_KEYS: &[&str] = &[
    "backend.url",
    "backend.timeout_secs",
    "store.dir",
    "export.dir",
];

/// Read the config, returning both the parsed struct and the raw document
/// for round-trip-safe editing.
pub fn read_config(workspace_dir: &Path) -> Result<(AppConfig, toml_edit::DocumentMut), ConfigError> {
    let path = workspace_dir.join(CONFIG_FILE);
    let text = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
        path: path.clone(),
        source: e,
    })?;
    let config: AppConfig = toml::from_str(&text)?;
    let doc: toml_edit::DocumentMut = text.parse()?;
    Ok((config, doc))
}

/// Write the config document back, preserving comments and layout.
pub fn write_config(workspace_dir: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    let path = workspace_dir.join(CONFIG_FILE);
    atomic_write(&path, doc.to_string().as_bytes()).map_err(|e| ConfigError::Write { path, source: e })
}

/// Set a dotted `table.key` in the document. Passing an empty value for an
/// optional key removes it.
pub fn set_config_value(
    doc: &mut toml_edit::DocumentMut,
    key: &str,
    raw: &str,
) -> Result<(), ConfigError> {
    if !SETTABLE_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey(key.to_string()));
    }
    let Some((table, field)) = key.split_once('.') else {
        return Err(ConfigError::UnknownKey(key.to_string()));
    };
    let raw = raw.trim();

    let item = match key {
        "backend.timeout_secs" if raw.is_empty() => None,
        "backend.timeout_secs" => {
            let secs: i64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: format!("{:?} is not a whole number of seconds", raw),
            })?;
            if secs <= 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
            Some(toml_edit::value(secs))
        }
        "backend.url" => {
            if !(raw.starts_with("http://") || raw.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "must start with http:// or https://".to_string(),
                });
            }
            Some(toml_edit::value(raw.trim_end_matches('/')))
        }
        "store.dir" if raw.is_empty() => {
            return Err(ConfigError::InvalidValue {
                key: key.to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        "export.dir" if raw.is_empty() => None,
        _ => Some(toml_edit::value(raw)),
    };

    if !doc.contains_key(table) {
        doc[table] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    match item {
        Some(value) => doc[table][field] = value,
        None => {
            if let Some(t) = doc[table].as_table_mut() {
                t.remove(field);
            }
        }
    }
    Ok(())
}
