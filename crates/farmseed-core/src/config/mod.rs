//! Remote endpoint configuration
//!
//! Holds the safe-to-ship public endpoint and anon key a client needs to
//! reach the backend. Secret credentials never live here.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Connection settings for the remote data and membership services
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Backend base URL, e.g. `https://project.supabase.co`
    pub base_url: String,
    /// Public anon API key sent with every request
    pub api_key: String,
}

impl RemoteConfig {
    /// Build a validated config, normalizing the endpoint
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let base_url = normalize_endpoint(base_url.into())?;
        let api_key = normalize_text_option(Some(api_key.into()))
            .ok_or_else(|| Error::InvalidInput("API key must not be empty".to_string()))?;
        Ok(Self { base_url, api_key })
    }
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::InvalidInput("endpoint must not be empty".to_string()))?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_endpoint_rejects_invalid_values() {
        assert!(RemoteConfig::new("", "key").is_err());
        assert!(RemoteConfig::new("api.example.com", "key").is_err());
    }

    #[test]
    fn normalize_endpoint_trims_trailing_slash() {
        let config = RemoteConfig::new("https://api.example.com/", "key").unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(RemoteConfig::new("https://api.example.com", "   ").is_err());
    }
}
