//! Category model
//!
//! Documents, courses and news each have their own category list. All three
//! live in one table and are told apart by [`CategoryKind`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which content type a category groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Document,
    Course,
    News,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 3] = [CategoryKind::Document, CategoryKind::Course, CategoryKind::News];

    /// Value stored in the `kind` column
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Document => "document",
            CategoryKind::Course => "course",
            CategoryKind::News => "news",
        }
    }

    /// Table holding the content grouped by this kind
    pub fn content_table(&self) -> &'static str {
        match self {
            CategoryKind::Document => "documents",
            CategoryKind::Course => "courses",
            CategoryKind::News => "news",
        }
    }

    /// Wording used in user-facing messages
    pub fn content_label(&self) -> &'static str {
        match self {
            CategoryKind::Document => "documents",
            CategoryKind::Course => "courses",
            CategoryKind::News => "news articles",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(CategoryKind::Document),
            "course" => Ok(CategoryKind::Course),
            "news" => Ok(CategoryKind::News),
            _ => Err(anyhow::anyhow!("Invalid category kind: {}", s)),
        }
    }
}

/// A named grouping for one content type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    pub kind: CategoryKind,
    pub name: String,
    /// URL-friendly slug, unique per kind
    pub slug: String,
    pub description: Option<String>,
    /// Hex color such as `#3b82f6`
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCategoryInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// Input for updating a category; `None` keeps the stored value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}
