use std::{env, net::SocketAddr};

use reqwest::Url;
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str =
    "https://raw.githubusercontent.com/robiningelbrecht/wca-rest-api/master/api";
pub const DEFAULT_SERVER_NAME: &str = "WCA MCP Server";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_token: Option<String>,
    pub bind_addr: String,
    pub bind_port: u16,
    pub api_base_url: String,
    pub api_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub cache_max_size: usize,
    pub log_level: String,
    pub server_name: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
    #[error("WCA_API_BASE_URL must be an absolute http(s) URL")]
    InvalidBaseUrl,
    #[error("WCA_API_TIMEOUT must be a positive number of seconds")]
    InvalidTimeout,
    #[error("WCA_CACHE_TTL must be a non-negative number of seconds")]
    InvalidCacheTtl,
    #[error("WCA_CACHE_MAX_SIZE must be a non-negative integer")]
    InvalidCacheMaxSize,
    #[error("WCA_LOG_LEVEL must be one of: trace, debug, info, warning, error, critical")]
    InvalidLogLevel,
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Maps Python-style level names onto `tracing` filter directives.
pub fn normalize_log_level(value: &str) -> Result<&'static str, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" | "critical" => Ok("error"),
        _ => Err(ConfigError::InvalidLogLevel),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_token = non_empty_var("MCP_API_TOKEN");

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);

        let api_base_url = non_empty_var("WCA_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let parsed = Url::parse(&api_base_url).map_err(|_| ConfigError::InvalidBaseUrl)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl);
        }

        let api_timeout_secs = non_empty_var("WCA_API_TIMEOUT")
            .map(|value| value.parse::<u64>().map_err(|_| ConfigError::InvalidTimeout))
            .transpose()?
            .unwrap_or(30);
        if api_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        let cache_ttl_secs = non_empty_var("WCA_CACHE_TTL")
            .map(|value| value.parse::<u64>().map_err(|_| ConfigError::InvalidCacheTtl))
            .transpose()?
            .unwrap_or(3600);
        let cache_max_size = non_empty_var("WCA_CACHE_MAX_SIZE")
            .map(|value| {
                value
                    .parse::<usize>()
                    .map_err(|_| ConfigError::InvalidCacheMaxSize)
            })
            .transpose()?
            .unwrap_or(1000);

        let log_level = non_empty_var("WCA_LOG_LEVEL")
            .map(|value| normalize_log_level(&value))
            .transpose()?
            .unwrap_or("info")
            .to_string();

        let server_name =
            non_empty_var("WCA_SERVER_NAME").unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string());

        let config = Self {
            api_token,
            bind_addr,
            bind_port,
            api_base_url,
            api_timeout_secs,
            cache_ttl_secs,
            cache_max_size,
            log_level,
            server_name,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}
