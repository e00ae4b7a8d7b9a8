use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api-v3.mbta.com";
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 300_000;
pub const MAX_API_KEY_LENGTH: usize = 256;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("page size {0} is outside 1..=100")]
    InvalidPageSize(usize),

    #[error("request timeout {0}ms is outside 1..=300000")]
    InvalidTimeout(u64),

    #[error("API key is malformed")]
    InvalidApiKey,

    #[error("config is not valid JSON: {0}")]
    Parse(String),
}

/// Where the transit API lives and how it is queried.
///
/// Every field has a default so a shell can send a partial JSON document,
/// e.g. `{"api_key": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub page_size: usize,
    /// Read by the shell's HTTP client; requests carry no timeout of their own.
    pub request_timeout_ms: u64,
    pub api_key: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            api_key: None,
        }
    }
}

impl ApiConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_base_url()?;

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidPageSize(self.page_size));
        }

        if self.request_timeout_ms == 0 || self.request_timeout_ms > MAX_REQUEST_TIMEOUT_MS {
            return Err(ConfigError::InvalidTimeout(self.request_timeout_ms));
        }

        if let Some(key) = &self.api_key {
            if key.is_empty()
                || key.len() > MAX_API_KEY_LENGTH
                || key.chars().any(|c| c.is_control() || c.is_whitespace())
            {
                return Err(ConfigError::InvalidApiKey);
            }
        }

        Ok(())
    }

    /// Base URL with any trailing slash removed, ready for path joining.
    pub fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: reason.to_string(),
        };

        let url = Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| invalid(&e.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid("only http and https are allowed"));
        }
        if url.host_str().is_none() {
            return Err(invalid("URL must have a host"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("credentials in URL are not allowed"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("base URL cannot carry a query or fragment"));
        }

        Ok(url)
    }
}
