//! The Memory datasource: a SQLite pool plus its schema.

use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, sync::Arc};

/// Schema applied on every startup; every statement is idempotent.
const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// Open the datasource at `url`.
///
/// An in-memory database exists once per connection, so in-memory URLs get
/// exactly one connection that is never recycled.
pub async fn connect(url: &str) -> Result<Arc<SqlitePool>> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("parsing datasource URL `{}`", url))?
        .create_if_missing(true);

    let pool_options = if url.contains(":memory:") || url.contains("mode=memory") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .with_context(|| format!("connecting to datasource `{}`", url))?;
    Ok(Arc::new(pool))
}

/// Run the embedded schema statements.
pub async fn run_migrations(db: &SqlitePool) -> Result<()> {
    run_script(db, INIT_SQL).await
}

async fn run_script(db: &SqlitePool, sql: &str) -> Result<()> {
    let statements = split_statements(sql);
    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        tracing::debug!("Executing migration SQL: {}", stmt);
        sqlx::query(&stmt)
            .execute(db)
            .await
            .with_context(|| format!("executing migration statement `{}`", stmt))?;
    }

    Ok(())
}

/// Split a script into statements on `;`, after dropping `--` comments.
/// Statements must not carry `;` or `--` inside string literals.
fn split_statements(sql: &str) -> Vec<String> {
    let stripped = sql
        .lines()
        .map(|line| line.split_once("--").map_or(line, |(code, _)| code))
        .collect::<Vec<_>>()
        .join("\n");

    stripped
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A migrated in-memory datasource for tests.
#[cfg(test)]
pub async fn memory() -> Arc<SqlitePool> {
    let db = connect("sqlite::memory:").await.unwrap();
    run_migrations(&db).await.unwrap();
    db
}
