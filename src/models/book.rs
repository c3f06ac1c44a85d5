//! Book model and related types

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Book as returned by `books/` and `books/{id}/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub available_quantity: i32,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub pdf_file: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.available_quantity > 0
    }
}

/// Short book representation used by the category listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookShort {
    pub id: i64,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub cover_image: Option<String>,
}

/// Metadata edit sent to `books/{id}/`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookUpdate {
    pub title: String,
    pub author: String,
    pub category: String,
}

/// `{"count": n}` answer of the count endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Count {
    pub count: u64,
}

/// `books/by-category/` response, categories in server order
pub type BooksByCategory = IndexMap<String, Vec<BookShort>>;

/// Book listing query
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
    pub search: Option<String>,
}

impl BookQuery {
    /// Query parameters for the listing endpoint. A blank term means no
    /// filter.
    pub fn to_query(&self) -> Vec<(String, String)> {
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => vec![("search".to_string(), term.to_string())],
            _ => Vec::new(),
        }
    }
}
