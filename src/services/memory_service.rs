//! Namespaced key/value memory store.

use tracing::instrument;

use crate::domain::errors::{CoordinationError, CoordinationResult};
use crate::domain::models::{MemoryEntry, DEFAULT_MEMORY_TYPE, DEFAULT_NAMESPACE};
use crate::infrastructure::database::{memory_queries, ScopeFactory};

#[derive(Clone)]
pub struct MemoryService {
    scopes: ScopeFactory,
}

impl MemoryService {
    pub fn new(scopes: ScopeFactory) -> Self {
        Self { scopes }
    }

    #[instrument(skip(self, value, metadata))]
    pub async fn save(
        &self,
        key: &str,
        value: &str,
        namespace: Option<&str>,
        entry_type: Option<&str>,
        metadata: Option<&str>,
    ) -> CoordinationResult<MemoryEntry> {
        if key.is_empty() {
            return Err(CoordinationError::validation("key must be non-empty"));
        }
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let entry_type = entry_type.unwrap_or(DEFAULT_MEMORY_TYPE);

        let mut scope = self.scopes.write_scope().await?;
        let entry = memory_queries::save(&mut scope, namespace, key, value, entry_type, metadata).await?;
        scope.complete().await?;
        Ok(entry)
    }

    #[instrument(skip(self))]
    pub async fn read(&self, key: &str, namespace: Option<&str>) -> CoordinationResult<Option<MemoryEntry>> {
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let mut scope = self.scopes.write_scope().await?;
        let entry = memory_queries::read_and_touch(&mut scope, namespace, key).await?;
        scope.complete().await?;
        Ok(entry)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str, namespace: Option<&str>) -> CoordinationResult<bool> {
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let mut scope = self.scopes.write_scope().await?;
        let removed = memory_queries::delete(&mut scope, namespace, key).await?;
        scope.complete().await?;
        Ok(removed)
    }

    #[instrument(skip(self))]
    pub async fn update_access(&self, key: &str, namespace: Option<&str>) -> CoordinationResult<bool> {
        let namespace = namespace.unwrap_or(DEFAULT_NAMESPACE);
        let mut scope = self.scopes.write_scope().await?;
        let touched = memory_queries::touch_access(&mut scope, namespace, key).await?;
        scope.complete().await?;
        Ok(touched)
    }
}
