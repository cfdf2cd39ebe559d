//! Namespaced memory entry persistence.

use sqlx::Row;

use crate::domain::errors::CoordinationResult;
use crate::domain::models::MemoryEntry;
use crate::infrastructure::database::scope::WriteScope;
use crate::infrastructure::database::utils::{format_datetime, parse_datetime};

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> CoordinationResult<MemoryEntry> {
    Ok(MemoryEntry {
        namespace: row.get("namespace"),
        key: row.get("key"),
        value: row.get("value"),
        entry_type: row.get("type"),
        metadata: row.get("metadata"),
        created_at: parse_datetime(&row.get::<String, _>("created_at"))?,
        updated_at: parse_datetime(&row.get::<String, _>("updated_at"))?,
        last_accessed_at: row
            .get::<Option<String>, _>("last_accessed_at")
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
    })
}

/// Upsert by `(namespace, key)`. Returns the entry's post-write state.
pub async fn save(
    scope: &mut WriteScope,
    namespace: &str,
    key: &str,
    value: &str,
    entry_type: &str,
    metadata: Option<&str>,
) -> CoordinationResult<MemoryEntry> {
    let now = chrono::Utc::now();
    let existing = sqlx::query("SELECT created_at FROM memory_entries WHERE namespace = ? AND key = ?")
        .bind(namespace)
        .bind(key)
        .fetch_optional(scope.tx())
        .await?;

    if let Some(row) = existing {
        let created_at: String = row.get("created_at");
        sqlx::query(
            "UPDATE memory_entries SET value = ?, type = ?, metadata = ?, updated_at = ?
             WHERE namespace = ? AND key = ?",
        )
        .bind(value)
        .bind(entry_type)
        .bind(metadata)
        .bind(format_datetime(now))
        .bind(namespace)
        .bind(key)
        .execute(scope.tx())
        .await?;

        Ok(MemoryEntry {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            entry_type: entry_type.to_string(),
            metadata: metadata.map(str::to_string),
            created_at: parse_datetime(&created_at)?,
            updated_at: now,
            last_accessed_at: None,
        })
    } else {
        sqlx::query(
            "INSERT INTO memory_entries (namespace, key, value, type, metadata, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(namespace)
        .bind(key)
        .bind(value)
        .bind(entry_type)
        .bind(metadata)
        .bind(format_datetime(now))
        .bind(format_datetime(now))
        .execute(scope.tx())
        .await?;

        Ok(MemoryEntry {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            entry_type: entry_type.to_string(),
            metadata: metadata.map(str::to_string),
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
        })
    }
}

/// Read and bump `last_accessed_at` in one write scope.
pub async fn read_and_touch(
    scope: &mut WriteScope,
    namespace: &str,
    key: &str,
) -> CoordinationResult<Option<MemoryEntry>> {
    let row = sqlx::query("SELECT * FROM memory_entries WHERE namespace = ? AND key = ?")
        .bind(namespace)
        .bind(key)
        .fetch_optional(scope.tx())
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let entry = row_to_entry(&row)?;

    let now = chrono::Utc::now();
    sqlx::query("UPDATE memory_entries SET last_accessed_at = ? WHERE namespace = ? AND key = ?")
        .bind(format_datetime(now))
        .bind(namespace)
        .bind(key)
        .execute(scope.tx())
        .await?;

    Ok(Some(MemoryEntry {
        last_accessed_at: Some(now),
        ..entry
    }))
}

pub async fn touch_access(scope: &mut WriteScope, namespace: &str, key: &str) -> CoordinationResult<bool> {
    let now = chrono::Utc::now();
    let result = sqlx::query("UPDATE memory_entries SET last_accessed_at = ? WHERE namespace = ? AND key = ?")
        .bind(format_datetime(now))
        .bind(namespace)
        .bind(key)
        .execute(scope.tx())
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(scope: &mut WriteScope, namespace: &str, key: &str) -> CoordinationResult<bool> {
    let result = sqlx::query("DELETE FROM memory_entries WHERE namespace = ? AND key = ?")
        .bind(namespace)
        .bind(key)
        .execute(scope.tx())
        .await?;
    Ok(result.rows_affected() > 0)
}
