//! CLI configuration: data directory layout and remote profile resolution.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use farmseed_core::config::RemoteConfig;

use crate::error::CliError;

const CONFIG_FILE: &str = "config.json";

/// Persisted CLI configuration file shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfigFile {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Resolve the local data directory: flag, then env, then platform default
pub fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var_os("FARMSEED_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(default_data_dir)
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("farmseed")
}

/// Resolve the remote profile: env vars win over the config file
///
/// Returns `None` when neither source provides both values; remote-dependent
/// commands turn that into a `RemoteNotConfigured` error.
pub fn resolve_remote_config(data_dir: &Path) -> Result<Option<RemoteConfig>, CliError> {
    if let Some(config) = remote_config_from_env()? {
        return Ok(Some(config));
    }
    remote_config_from_file(data_dir)
}

fn remote_config_from_env() -> Result<Option<RemoteConfig>, CliError> {
    let url = env::var("FARMSEED_API_URL").ok();
    let key = env::var("FARMSEED_API_KEY").ok();
    build_remote_config(url, key, "environment")
}

fn remote_config_from_file(data_dir: &Path) -> Result<Option<RemoteConfig>, CliError> {
    let path = data_dir.join(CONFIG_FILE);
    let Ok(raw) = std::fs::read_to_string(&path) else {
        return Ok(None);
    };
    let parsed: CliConfigFile = serde_json::from_str(&raw)
        .map_err(|error| CliError::Config(format!("{}: {error}", path.display())))?;
    build_remote_config(parsed.api_url, parsed.api_key, "config file")
}

fn build_remote_config(
    url: Option<String>,
    key: Option<String>,
    source: &str,
) -> Result<Option<RemoteConfig>, CliError> {
    match (non_empty(url), non_empty(key)) {
        (Some(url), Some(key)) => {
            let config = RemoteConfig::new(url, key)
                .map_err(|error| CliError::Config(format!("{source}: {error}")))?;
            Ok(Some(config))
        }
        (None, None) => Ok(None),
        _ => Err(CliError::Config(format!(
            "{source} sets only one of api_url/api_key; both are required"
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_remote_config_requires_both_values() {
        assert!(build_remote_config(None, None, "test").unwrap().is_none());
        assert!(build_remote_config(Some("https://x.example.com".into()), None, "test").is_err());
        assert!(build_remote_config(None, Some("key".into()), "test").is_err());
    }

    #[test]
    fn build_remote_config_rejects_blank_values_as_missing() {
        assert!(build_remote_config(Some("  ".into()), Some("  ".into()), "test")
            .unwrap()
            .is_none());
    }

    #[test]
    fn config_file_parses_partial_payloads() {
        let parsed: CliConfigFile = serde_json::from_str("{}").unwrap();
        assert!(parsed.api_url.is_none());

        let parsed: CliConfigFile =
            serde_json::from_str(r#"{"api_url": "https://x.example.com", "api_key": "anon"}"#)
                .unwrap();
        assert_eq!(parsed.api_url.as_deref(), Some("https://x.example.com"));
    }

    #[test]
    fn missing_config_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remote_config_from_file(dir.path()).unwrap().is_none());
    }

    #[test]
    fn corrupt_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{broken").unwrap();
        assert!(remote_config_from_file(dir.path()).is_err());
    }
}
