//! Metadata store contract and an in-memory implementation

use super::models::Record;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("metadata store error: {0}")]
    Backend(String),
}

/// Create/update/delete/list contract of the document store holding records
pub trait MetadataStore<R: Record>: Send + Sync {
    /// Persist a new record and return its generated id
    fn create(&self, record: R) -> impl Future<Output = Result<String, StoreError>> + Send;

    fn update(&self, id: &str, record: R) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete(&self, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get(&self, id: &str) -> impl Future<Output = Result<Option<R>, StoreError>> + Send;

    /// All records ordered by [`Record::sort_key`]
    fn list(&self) -> impl Future<Output = Result<Vec<R>, StoreError>> + Send;
}

/// Map-backed store
#[derive(Debug)]
pub struct InMemoryStore<R> {
    records: RwLock<HashMap<String, R>>,
}

impl<R> Default for InMemoryStore<R> {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<R: Record> InMemoryStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl<R: Record> MetadataStore<R> for InMemoryStore<R> {
    async fn create(&self, mut record: R) -> Result<String, StoreError> {
        let id = Uuid::new_v4().simple().to_string();
        record.set_id(id.clone());
        self.records.write().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn update(&self, id: &str, mut record: R) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let slot = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.set_id(id.to_string());
        *slot = record;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get(&self, id: &str) -> Result<Option<R>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<R>, StoreError> {
        let mut all: Vec<R> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| {
            a.sort_key()
                .cmp(b.sort_key())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(all)
    }
}
