//! Metadata records that point at stored images

use crate::config::FolderConfig;
use serde::{Deserialize, Serialize};

/// Which logical folder a record's image lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderKind {
    Portfolio,
    Technology,
}

impl FolderKind {
    pub fn folder<'a>(&self, folders: &'a FolderConfig) -> &'a str {
        match self {
            FolderKind::Portfolio => &folders.portfolio,
            FolderKind::Technology => &folders.technology,
        }
    }
}

/// A metadata record with an optional image URL
pub trait Record: Clone + Send + Sync + 'static {
    const KIND: FolderKind;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn image_url(&self) -> &str;
    fn set_image_url(&mut self, url: String);
    /// Listing order
    fn sort_key(&self) -> &str;
    /// Case-insensitive keyword match; `needle` is already lowercase
    fn matches(&self, needle: &str) -> bool;
}

/// Portfolio entry. Older documents used Indonesian field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "judul")]
    pub title: String,
    #[serde(default, alias = "kategori")]
    pub category: String,
    #[serde(default, alias = "lokasi")]
    pub location: String,
    #[serde(default, alias = "deskripsi")]
    pub description: String,
    #[serde(default, alias = "gambarUri")]
    pub image_url: String,
    /// Ordered technology tags
    #[serde(default)]
    pub tech_stack: Vec<String>,
}

impl Record for Portfolio {
    const KIND: FolderKind = FolderKind::Portfolio;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn image_url(&self) -> &str {
        &self.image_url
    }

    fn set_image_url(&mut self, url: String) {
        self.image_url = url;
    }

    fn sort_key(&self) -> &str {
        &self.title
    }

    fn matches(&self, needle: &str) -> bool {
        [&self.title, &self.description, &self.category]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

/// Technology shown with an icon
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Technology {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "nama")]
    pub name: String,
    #[serde(default, alias = "iconUri")]
    pub icon_url: String,
}

impl Record for Technology {
    const KIND: FolderKind = FolderKind::Technology;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn image_url(&self) -> &str {
        &self.icon_url
    }

    fn set_image_url(&mut self, url: String) {
        self.icon_url = url;
    }

    fn sort_key(&self) -> &str {
        &self.name
    }

    fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
    }
}
