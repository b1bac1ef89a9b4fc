//! Course model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a course is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseType {
    /// Live sessions over a video link
    Online,
    /// Self-paced material
    SelfLearning,
    /// In-person classes
    Offline,
}

impl fmt::Display for CourseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseType::Online => write!(f, "online"),
            CourseType::SelfLearning => write!(f, "self_learning"),
            CourseType::Offline => write!(f, "offline"),
        }
    }
}

impl FromStr for CourseType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(CourseType::Online),
            "self_learning" => Ok(CourseType::SelfLearning),
            "offline" => Ok(CourseType::Offline),
            _ => Err(anyhow::anyhow!("Invalid course type: {}", s)),
        }
    }
}

/// A training course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub content: String,
    pub price: f64,
    #[serde(rename = "type")]
    pub course_type: CourseType,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub featured_image: Option<String>,
    pub certificate_template: Option<String>,
    pub max_students: Option<i64>,
    pub current_students: i64,
    pub duration_hours: Option<i64>,
    pub requirements: Option<String>,
    pub learning_outcomes: Option<String>,
    pub zoom_link: Option<String>,
    /// Free-form session list, always a JSON array when present
    pub schedule: Option<serde_json::Value>,
    pub is_published: bool,
    pub is_featured: bool,
    pub views_count: i64,
    pub enrollments_count: i64,
    pub completion_rate: f64,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Stored image paths owned by this course
    pub fn image_paths(&self) -> Vec<&str> {
        [self.featured_image.as_deref(), self.certificate_template.as_deref()]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Column values written on create and update.
///
/// Image fields of `None` keep whatever is stored on update.
#[derive(Debug, Clone)]
pub struct CourseInput {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub content: String,
    pub price: f64,
    pub course_type: CourseType,
    pub category_id: Option<i64>,
    pub featured_image: Option<String>,
    pub certificate_template: Option<String>,
    pub max_students: Option<i64>,
    pub duration_hours: Option<i64>,
    pub requirements: Option<String>,
    pub learning_outcomes: Option<String>,
    pub zoom_link: Option<String>,
    pub schedule: Option<serde_json::Value>,
    pub is_published: bool,
    pub is_featured: bool,
    pub created_by: Option<i64>,
}

/// Filters for course listings
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub course_type: Option<CourseType>,
    /// Category name
    pub category: Option<String>,
    pub published: Option<bool>,
    pub featured: Option<bool>,
    pub search: Option<String>,
}
