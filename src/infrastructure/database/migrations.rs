//! Embedded-SQL schema migrations.

use sqlx::SqlitePool;

use crate::domain::errors::{CoordinationError, CoordinationResult};

#[derive(Debug, Clone)]
struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
}

fn all_embedded_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema",
        sql: include_str!("../../../migrations/001_initial_schema.sql"),
    }]
}

async fn ensure_migrations_table(pool: &SqlitePool) -> CoordinationResult<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now')),
            description TEXT
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn current_version(pool: &SqlitePool) -> CoordinationResult<i64> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(v,)| v).unwrap_or(0))
}

/// Apply every migration newer than the database's current schema version.
pub async fn run(pool: &SqlitePool) -> CoordinationResult<()> {
    ensure_migrations_table(pool).await?;
    let applied = current_version(pool).await?;

    for migration in all_embedded_migrations().into_iter().filter(|m| m.version > applied) {
        sqlx::raw_sql(migration.sql)
            .execute(pool)
            .await
            .map_err(|e| {
                CoordinationError::Fatal(format!(
                    "migration {} failed: {e}",
                    migration.version
                ))
            })?;

        sqlx::query("INSERT OR IGNORE INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(pool)
            .await?;
    }

    Ok(())
}
