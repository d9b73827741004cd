//! Metadata records whose images live in object storage
//!
//! - `models`: portfolio and technology records
//! - `store`: the document store contract plus an in-memory store
//! - `service`: create/update/remove flows wired to the storage client
//! - `migration`: tech stack normalisation for older documents

pub mod migration;
pub mod models;
pub mod service;
pub mod store;

pub use migration::{migrate_portfolio_documents, MigrationReport, TechStackField};
pub use models::{FolderKind, Portfolio, Record, Technology};
pub use service::{CatalogError, CatalogService, ImageUpload, Removal};
pub use store::{InMemoryStore, MetadataStore, StoreError};
