//! Configuration loading from environment.

use std::env;
use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be text or json, got {other:?}"),
        }
    }
}

/// Application configuration.
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Deadline for each reserve/process/rollback phase.
    pub phase_timeout: Duration,
    pub log_format: LogFormat,
    /// OTLP collector; span export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let phase_timeout_ms: u64 = env::var("PHASE_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("PHASE_TIMEOUT_MS: {e}"))?;
        if phase_timeout_ms == 0 {
            anyhow::bail!("PHASE_TIMEOUT_MS must be greater than zero");
        }

        let log_format = env::var("LOG_FORMAT").unwrap_or_default().parse()?;

        let otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            port,
            database_url,
            phase_timeout: Duration::from_millis(phase_timeout_ms),
            log_format,
            otlp_endpoint,
        })
    }

    /// Database URL scheme, safe to log.
    pub fn database_backend(&self) -> &str {
        self.database_url
            .split_once(':')
            .map_or("unknown", |(scheme, _)| scheme)
    }
}
