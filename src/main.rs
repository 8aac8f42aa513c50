use anyhow::Context;

mod app;
mod config;
mod db;
mod error;
mod extractors;
mod items;
mod migrate;
mod pagination;
mod request_id;
mod shutdown;
mod state;
mod users;
mod validation;

use crate::config::AppConfig;
use crate::migrate::{applied_versions, run_migrations, DirSource};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "keel=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let migrations_dir = config.migrations_dir.clone();
    let state = AppState::init(config).await?;

    let report = run_migrations(&state.db, &DirSource::new(&migrations_dir))
        .await
        .with_context(|| format!("apply migrations from {}", migrations_dir.display()))?;
    let recorded = applied_versions(&state.db)
        .await
        .context("read applied migrations")?;
    tracing::info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        schema_version = recorded.last().map(|m| m.version).unwrap_or(0),
        "migrations up to date"
    );

    app::serve(state).await
}
