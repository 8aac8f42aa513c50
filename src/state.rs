use crate::config::AppConfig;
use crate::db;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Handles shared by every request. Built once in `main`, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = db::connect(&config.database_url).await?;
        Ok(Self {
            db,
            config: Arc::new(config),
        })
    }

    /// Release the pool; waits for checked-out connections to return.
    pub async fn close(&self) {
        self.db.close().await;
    }

    /// In-memory database migrated with the repository's `migrations/`.
    #[cfg(test)]
    pub async fn for_tests() -> Self {
        use crate::migrate::{run_migrations, DirSource};
        use std::time::Duration;

        let db = db::memory_pool().await;
        let migrations_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/migrations");
        run_migrations(&db, &DirSource::new(migrations_dir))
            .await
            .expect("migrations apply");

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: "sqlite::memory:".into(),
            app_name: "KeelTest".into(),
            cors_origins: vec!["http://localhost:3000".into()],
            migrations_dir: migrations_dir.into(),
            shutdown_timeout: Duration::from_secs(1),
        });
        Self { db, config }
    }
}
