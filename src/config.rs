use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

/// Runtime settings read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub app_name: String,
    pub cors_origins: Vec<String>,
    pub migrations_dir: PathBuf,
    pub shutdown_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let port = std::env::var("PORT")
            .or_else(|_| std::env::var("APP_PORT"))
            .unwrap_or_else(|_| "8080".into())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;
        let shutdown_secs = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse::<u64>()
            .context("SHUTDOWN_TIMEOUT_SECS must be a number of seconds")?;

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://keel.db".into()),
            app_name: std::env::var("APP_NAME").unwrap_or_else(|_| "Keel".into()),
            cors_origins: split_origins(
                &std::env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".into()),
            ),
            migrations_dir: std::env::var("MIGRATIONS_DIR")
                .unwrap_or_else(|_| "./migrations".into())
                .into(),
            shutdown_timeout: Duration::from_secs(shutdown_secs),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Comma separated list, blanks dropped.
fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
