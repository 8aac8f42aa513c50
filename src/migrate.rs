//! Numbered SQL migrations, applied once each and tracked in `schema_migrations`.
//!
//! Files are named `<version>_<description>.sql`. Each pending file runs in its own
//! transaction together with the insert of its version row, so a failing file
//! leaves neither schema changes nor a record behind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::{Executor, FromRow, SqlitePool};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("failed to create schema_migrations table: {0}")]
    Tracking(#[source] sqlx::Error),
    #[error("failed to read migrations from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid migration filename {0}, expected <version>_<name>.sql")]
    InvalidName(String),
    #[error("duplicate migration version {version}: {first} and {second}")]
    DuplicateVersion {
        version: i64,
        first: String,
        second: String,
    },
    #[error("failed to apply migration {file}: {source}")]
    Apply {
        file: String,
        #[source]
        source: sqlx::Error,
    },
}

/// A migration file as delivered by a [`MigrationSource`].
#[derive(Debug, Clone)]
pub struct MigrationFile {
    pub filename: String,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub filename: String,
    pub sql: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub applied_at: OffsetDateTime,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub applied: Vec<i64>,
    pub skipped: Vec<i64>,
}

#[async_trait]
pub trait MigrationSource: Send + Sync {
    /// Location shown in logs and errors.
    fn describe(&self) -> String;

    /// Every `.sql` file of the source; other entries are ignored.
    async fn files(&self) -> Result<Vec<MigrationFile>, MigrationError>;
}

/// Reads `*.sql` files from a directory on disk.
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl MigrationSource for DirSource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    async fn files(&self) -> Result<Vec<MigrationFile>, MigrationError> {
        let read_err = |source| MigrationError::Read {
            path: self.describe(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(read_err)?;
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
            if !entry.file_type().await.map_err(read_err)?.is_file() {
                continue;
            }
            let filename = entry.file_name().to_string_lossy().into_owned();
            if !is_sql_file(&filename) {
                continue;
            }
            let sql = tokio::fs::read_to_string(entry.path())
                .await
                .map_err(read_err)?;
            out.push(MigrationFile { filename, sql });
        }
        Ok(out)
    }
}

/// Migrations held in memory, e.g. compiled into the binary.
pub struct MemorySource {
    files: Vec<MigrationFile>,
}

impl MemorySource {
    pub fn new<I, N, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        Self {
            files: files
                .into_iter()
                .map(|(n, s)| MigrationFile {
                    filename: n.into(),
                    sql: s.into(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl MigrationSource for MemorySource {
    fn describe(&self) -> String {
        "<memory>".to_string()
    }

    async fn files(&self) -> Result<Vec<MigrationFile>, MigrationError> {
        Ok(self
            .files
            .iter()
            .filter(|f| is_sql_file(&f.filename))
            .cloned()
            .collect())
    }
}

fn is_sql_file(name: &str) -> bool {
    name.ends_with(".sql")
}

/// Split `<version>_<name>.sql` into its parts.
pub fn parse_filename(filename: &str) -> Result<(i64, String), MigrationError> {
    lazy_static! {
        static ref NAME_RE: Regex = Regex::new(r"^(\d+)_(.+)\.sql$").unwrap();
    }
    let caps = NAME_RE
        .captures(filename)
        .ok_or_else(|| MigrationError::InvalidName(filename.to_string()))?;
    let version = caps[1]
        .parse::<i64>()
        .map_err(|_| MigrationError::InvalidName(filename.to_string()))?;
    Ok((version, caps[2].to_string()))
}

/// Parse and order migration files by version, then filename.
pub fn plan(files: Vec<MigrationFile>) -> Result<Vec<Migration>, MigrationError> {
    let mut migrations = files
        .into_iter()
        .map(|f| {
            let (version, name) = parse_filename(&f.filename)?;
            Ok(Migration {
                version,
                name,
                filename: f.filename,
                sql: f.sql,
            })
        })
        .collect::<Result<Vec<_>, MigrationError>>()?;

    migrations.sort_by(|a, b| {
        a.version
            .cmp(&b.version)
            .then_with(|| a.filename.cmp(&b.filename))
    });

    for pair in migrations.windows(2) {
        if pair[0].version == pair[1].version {
            return Err(MigrationError::DuplicateVersion {
                version: pair[0].version,
                first: pair[0].filename.clone(),
                second: pair[1].filename.clone(),
            });
        }
    }
    Ok(migrations)
}

async fn ensure_tracking_table(pool: &SqlitePool) -> Result<(), MigrationError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            name       TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(MigrationError::Tracking)?;
    Ok(())
}

/// Apply every pending migration of `source` in ascending version order.
pub async fn run_migrations(
    pool: &SqlitePool,
    source: &dyn MigrationSource,
) -> Result<MigrationReport, MigrationError> {
    info!(source = %source.describe(), "running migrations");
    ensure_tracking_table(pool).await?;

    let migrations = plan(source.files().await?)?;

    let done: HashSet<i64> = sqlx::query_scalar::<_, i64>("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await
        .map_err(MigrationError::Tracking)?
        .into_iter()
        .collect();

    let mut report = MigrationReport::default();
    for m in &migrations {
        if done.contains(&m.version) {
            debug!(version = m.version, file = %m.filename, "migration already applied");
            report.skipped.push(m.version);
            continue;
        }
        apply(pool, m).await?;
        report.applied.push(m.version);
    }

    info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        "migrations completed"
    );
    Ok(report)
}

async fn apply(pool: &SqlitePool, m: &Migration) -> Result<(), MigrationError> {
    let apply_err = |source| MigrationError::Apply {
        file: m.filename.clone(),
        source,
    };

    info!(version = m.version, file = %m.filename, "applying migration");
    let mut tx = pool.begin().await.map_err(apply_err)?;

    let result = async {
        (&mut *tx).execute(m.sql.as_str()).await?;
        sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(m.version)
            .bind(&m.name)
            .bind(crate::db::timestamp(OffsetDateTime::now_utc())?)
            .execute(&mut *tx)
            .await?;
        Ok::<_, sqlx::Error>(())
    }
    .await;

    match result {
        Ok(()) => tx.commit().await.map_err(apply_err),
        Err(e) => {
            error!(error = %e, file = %m.filename, "migration failed, rolling back");
            if let Err(rb) = tx.rollback().await {
                error!(error = %rb, file = %m.filename, "rollback failed");
            }
            Err(apply_err(e))
        }
    }
}

/// Migrations recorded in the tracking table, oldest version first.
pub async fn applied_versions(pool: &SqlitePool) -> Result<Vec<AppliedMigration>, sqlx::Error> {
    sqlx::query_as::<_, AppliedMigration>(
        "SELECT version, name, applied_at FROM schema_migrations ORDER BY version",
    )
    .fetch_all(pool)
    .await
}
