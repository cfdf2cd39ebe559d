//! Scoped data access: read scopes borrow a pooled connection, write scopes
//! own an ambient transaction that must be explicitly completed to commit.

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::domain::errors::CoordinationResult;

#[derive(Clone)]
pub struct ScopeFactory {
    pool: SqlitePool,
}

impl ScopeFactory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn read_scope(&self) -> CoordinationResult<ReadScope> {
        let conn = self.pool.acquire().await?;
        Ok(ReadScope { conn })
    }

    pub async fn write_scope(&self) -> CoordinationResult<WriteScope> {
        let tx = self.pool.begin().await?;
        Ok(WriteScope { tx: Some(tx) })
    }
}

/// A read-only borrow of a pooled connection. Dropping it simply returns the
/// connection to the pool; there is nothing to commit or roll back.
pub struct ReadScope {
    conn: PoolConnection<Sqlite>,
}

impl ReadScope {
    pub fn conn(&mut self) -> &mut PoolConnection<Sqlite> {
        &mut self.conn
    }
}

/// One logical unit of write access. Holds a transaction that commits only
/// when `complete()` is called; dropping without completing rolls back via
/// `sqlx::Transaction`'s own `Drop` impl.
pub struct WriteScope {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl WriteScope {
    pub fn tx(&mut self) -> &mut Transaction<'static, Sqlite> {
        self.tx.as_mut().expect("write scope used after completion")
    }

    /// Commit the underlying transaction. Consumes the scope so it cannot be
    /// reused or completed twice.
    pub async fn complete(mut self) -> CoordinationResult<()> {
        let tx = self.tx.take().expect("write scope used after completion");
        tx.commit().await?;
        Ok(())
    }
}
