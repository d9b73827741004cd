//! CRUD flows that keep records and their stored images in step
//!
//! The store and the storage client are passed in by the caller; nothing
//! here reaches for a global instance.

use super::models::Record;
use super::store::{MetadataStore, StoreError};
use crate::s3::client::Cleanup;
use crate::s3::error::StorageError;
use crate::s3::transport::{HyperTransport, Transport};
use crate::s3::ObjectStorageClient;
use bytes::Bytes;
use std::marker::PhantomData;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("record not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// Image bytes supplied with a create or edit
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub data: Bytes,
    pub content_type: String,
}

impl ImageUpload {
    pub fn new(data: impl Into<Bytes>, content_type: &str) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.to_string(),
        }
    }
}

/// A removed record and what happened to its image
#[derive(Debug)]
pub struct Removal<R> {
    pub record: R,
    pub image: Cleanup,
}

/// Records of type `R` in store `S`, images through the storage client
pub struct CatalogService<R, S, T = HyperTransport> {
    store: S,
    storage: ObjectStorageClient<T>,
    _record: PhantomData<fn() -> R>,
}

impl<R, S, T> CatalogService<R, S, T>
where
    R: Record,
    S: MetadataStore<R>,
    T: Transport,
{
    pub fn new(store: S, storage: ObjectStorageClient<T>) -> Self {
        Self {
            store,
            storage,
            _record: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn folder(&self) -> &str {
        R::KIND.folder(self.storage.folders())
    }

    /// Upload the image (if any), then persist the record pointing at it.
    ///
    /// If persisting fails the fresh image is removed again, best-effort.
    pub async fn create(&self, mut record: R, image: Option<ImageUpload>) -> Result<R> {
        let uploaded = match image {
            Some(image) => {
                let url = self
                    .storage
                    .upload(image.data, &image.content_type, self.folder())
                    .await?;
                record.set_image_url(url.clone());
                Some(url)
            }
            None => None,
        };

        match self.store.create(record.clone()).await {
            Ok(id) => {
                record.set_id(id);
                info!(id = record.id(), "record created");
                Ok(record)
            }
            Err(e) => {
                if let Some(url) = uploaded {
                    if let Err(cleanup) = self.storage.delete(&url).await {
                        warn!(url = %url, error = %cleanup, "failed to remove orphaned image");
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Replace a record; with a new image the old one is swapped out.
    ///
    /// The new image is uploaded and the record written before the old image
    /// is removed, best-effort. If the write fails the new image is removed
    /// instead and the stored record keeps pointing at a live object.
    /// Without a new image the stored image URL is kept.
    pub async fn update(&self, id: &str, mut record: R, new_image: Option<ImageUpload>) -> Result<R> {
        let existing = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        let old_url = existing.image_url().to_string();

        let uploaded = match new_image {
            Some(image) => Some(
                self.storage
                    .upload(image.data, &image.content_type, self.folder())
                    .await?,
            ),
            None => None,
        };

        record.set_id(id.to_string());
        record.set_image_url(uploaded.clone().unwrap_or_else(|| old_url.clone()));

        if let Err(e) = self.store.update(id, record.clone()).await {
            if let Some(url) = uploaded {
                if let Err(cleanup) = self.storage.delete(&url).await {
                    warn!(url = %url, error = %cleanup, "failed to remove orphaned image");
                }
            }
            return Err(e.into());
        }

        if uploaded.is_some() && !old_url.is_empty() {
            if let Err(e) = self.storage.delete(&old_url).await {
                warn!(id, url = %old_url, error = %e, "failed to remove previous image (ignored)");
            }
        }

        info!(id, "record updated");
        Ok(record)
    }

    /// Delete the record, then its image. A failed image delete is only logged.
    pub async fn remove(&self, id: &str) -> Result<Removal<R>> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        self.store.delete(id).await?;

        let image = if record.image_url().is_empty() {
            Cleanup::Skipped
        } else {
            match self.storage.delete(record.image_url()).await {
                Ok(()) => Cleanup::Deleted,
                Err(e) => {
                    warn!(id, url = record.image_url(), error = %e, "failed to remove image (ignored)");
                    Cleanup::Failed(e)
                }
            }
        };

        info!(id, "record removed");
        Ok(Removal { record, image })
    }

    pub async fn get(&self, id: &str) -> Result<Option<R>> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<R>> {
        Ok(self.store.list().await?)
    }

    /// Records whose text fields contain `keyword`, ignoring case
    pub async fn search(&self, keyword: &str) -> Result<Vec<R>> {
        let needle = keyword.trim().to_lowercase();
        let all = self.store.list().await?;
        if needle.is_empty() {
            return Ok(all);
        }
        Ok(all.into_iter().filter(|r| r.matches(&needle)).collect())
    }
}
