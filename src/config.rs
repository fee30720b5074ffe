use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("parsing config {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub reputation_enabled: bool,
    pub verify_tls: bool,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    pub workers: usize,
    pub tls_timeout_ms: u64,
    pub whois_timeout_ms: u64,
    pub dns_timeout_ms: u64,
    pub fetch_timeout_ms: u64,
    pub reputation_timeout_ms: u64,
    pub max_redirects: usize,
    pub user_agent: String,
    pub blocklist_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reputation_enabled: true,
            verify_tls: true,
            cache_ttl_secs: 3600,
            cache_capacity: 1000,
            workers: 4,
            tls_timeout_ms: 5_000,
            whois_timeout_ms: 5_000,
            dns_timeout_ms: 5_000,
            fetch_timeout_ms: 10_000,
            reputation_timeout_ms: 5_000,
            max_redirects: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            blocklist_path: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let cfg: EngineConfig = serde_json::from_str(&data)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache_capacity must be at least 1".into()));
        }
        let timeouts = [
            ("tls_timeout_ms", self.tls_timeout_ms),
            ("whois_timeout_ms", self.whois_timeout_ms),
            ("dns_timeout_ms", self.dns_timeout_ms),
            ("fetch_timeout_ms", self.fetch_timeout_ms),
            ("reputation_timeout_ms", self.reputation_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn tls_timeout(&self) -> Duration {
        Duration::from_millis(self.tls_timeout_ms)
    }

    pub fn whois_timeout(&self) -> Duration {
        Duration::from_millis(self.whois_timeout_ms)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn reputation_timeout(&self) -> Duration {
        Duration::from_millis(self.reputation_timeout_ms)
    }
}
