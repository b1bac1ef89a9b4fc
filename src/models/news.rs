//! News article model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A news article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct News {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub content: String,
    /// Inline body image
    pub image_path: Option<String>,
    pub featured_image: Option<String>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub is_published: bool,
    pub is_featured: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub views_count: i64,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl News {
    /// Stored image paths owned by this article
    pub fn image_paths(&self) -> Vec<&str> {
        [self.image_path.as_deref(), self.featured_image.as_deref()]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Column values written on create and update.
///
/// Image fields of `None` keep whatever is stored on update.
#[derive(Debug, Clone)]
pub struct NewsInput {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub content: String,
    pub image_path: Option<String>,
    pub featured_image: Option<String>,
    pub category_id: Option<i64>,
    pub is_published: bool,
    pub is_featured: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
}

/// Filters for news listings
#[derive(Debug, Clone, Default)]
pub struct NewsFilter {
    pub category_id: Option<i64>,
    pub published: Option<bool>,
    pub featured: Option<bool>,
    pub search: Option<String>,
}
