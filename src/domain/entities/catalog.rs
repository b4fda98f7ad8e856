//! Catalog records as supplied by the remote data source.
//!
//! The cache only cares that an entity has an identity and zero or one
//! locator; the remaining fields are carried so a catalog dump can be
//! deserialized as-is.

use serde::{Deserialize, Serialize};

/// Identity of the entity a locator came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// A book, by database id.
    Book(i64),
    /// A category, by database id.
    Category(i64),
    /// A reader slide, by UUID string.
    Slide(String),
}

/// Anything in the catalog that may point at a remote image.
pub trait CatalogEntity {
    /// Identity used to deduplicate prefetch work.
    fn entity_ref(&self) -> Option<EntityRef>;

    /// Remote locator, if the entity has one.
    fn locator(&self) -> Option<&str>;
}

/// A book record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Database id.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Long description.
    #[serde(default)]
    pub description: Option<String>,
    /// Cover image URL.
    #[serde(default)]
    pub cover: Option<String>,
    /// Category id.
    #[serde(default)]
    pub category: Option<i64>,
}

impl CatalogEntity for Book {
    fn entity_ref(&self) -> Option<EntityRef> {
        Some(EntityRef::Book(self.id))
    }

    fn locator(&self) -> Option<&str> {
        self.cover.as_deref()
    }
}

/// A category record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Database id.
    pub id: i64,
    /// Display name.
    pub category_name: String,
    /// Header image URL.
    #[serde(default)]
    pub image: Option<String>,
}

impl CatalogEntity for Category {
    fn entity_ref(&self) -> Option<EntityRef> {
        Some(EntityRef::Category(self.id))
    }

    fn locator(&self) -> Option<&str> {
        self.image.as_deref()
    }
}

/// A reader slide; may reference both an image and a video clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    /// Slide UUID.
    pub id: String,
    /// Owning book.
    pub book_id: i64,
    /// Position within the book.
    #[serde(default)]
    pub order_index: i32,
    /// Background image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Video clip URL.
    #[serde(default)]
    pub video_mp4_url: Option<String>,
}

impl CatalogEntity for Slide {
    fn entity_ref(&self) -> Option<EntityRef> {
        Some(EntityRef::Slide(self.id.clone()))
    }

    fn locator(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

/// A catalog snapshot, as read from a JSON dump.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Books.
    #[serde(default)]
    pub books: Vec<Book>,
    /// Categories.
    #[serde(default)]
    pub categories: Vec<Category>,
    /// Slides.
    #[serde(default)]
    pub slides: Vec<Slide>,
}
