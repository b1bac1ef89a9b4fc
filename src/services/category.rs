//! Category service
//!
//! One implementation serves document, course and news categories; every
//! operation takes the [`CategoryKind`] it works on. Category lists are
//! cached per kind and dropped on any write to that kind.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CategoryKind, CreateCategoryInput, UpdateCategoryInput};
use crate::services::validation::ValidationErrors;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

const MAX_NAME_LENGTH: usize = 255;
const MAX_DESCRIPTION_LENGTH: usize = 1000;
const MAX_COLOR_LENGTH: usize = 7;
const MAX_ICON_LENGTH: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Category not found")]
    NotFound,

    #[error("{0}")]
    ValidationError(ValidationErrors),

    #[error("{0}")]
    InUse(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<ValidationErrors> for CategoryServiceError {
    fn from(errors: ValidationErrors) -> Self {
        CategoryServiceError::ValidationError(errors)
    }
}

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
}

fn cache_key(kind: CategoryKind, view: &str) -> String {
    format!("categories:{}:{}", kind, view)
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>, cache: Arc<Cache>) -> Self {
        let cache_ttl = cache.default_ttl();
        Self { repo, cache, cache_ttl }
    }

    /// All categories of a kind, ordered by sort_order then name
    pub async fn list(&self, kind: CategoryKind) -> Result<Vec<Category>, CategoryServiceError> {
        let key = cache_key(kind, "sorted");
        if let Some(list) = self.cache.get::<Vec<Category>>(&key).await.ok().flatten() {
            return Ok(list);
        }

        let list = self.repo.list(kind).await.context("Failed to list categories")?;
        let _ = self.cache.set(&key, &list, self.cache_ttl).await;
        Ok(list)
    }

    /// Categories of a kind ordered by name, optionally only active ones
    pub async fn list_by_name(&self, kind: CategoryKind, active_only: bool) -> Result<Vec<Category>, CategoryServiceError> {
        let key = cache_key(kind, if active_only { "active" } else { "by_name" });
        if let Some(list) = self.cache.get::<Vec<Category>>(&key).await.ok().flatten() {
            return Ok(list);
        }

        let list = self
            .repo
            .list_by_name(kind, active_only)
            .await
            .context("Failed to list categories by name")?;
        let _ = self.cache.set(&key, &list, self.cache_ttl).await;
        Ok(list)
    }

    pub async fn get(&self, kind: CategoryKind, id: i64) -> Result<Category, CategoryServiceError> {
        self.repo
            .get_by_id(kind, id)
            .await
            .context("Failed to get category")?
            .ok_or(CategoryServiceError::NotFound)
    }

    pub async fn create(&self, kind: CategoryKind, input: CreateCategoryInput) -> Result<Category, CategoryServiceError> {
        let mut errors = ValidationErrors::new();

        let name = errors.required("name", Some(input.name.as_str())).map(str::to_string);
        if let Some(ref name) = name {
            errors.max_chars("name", name, MAX_NAME_LENGTH);
            if self.repo.exists_by_name(kind, name, None).await? {
                errors.taken("name");
            }
        }
        let explicit_slug = input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty());
        if let Some(slug) = explicit_slug {
            errors.max_chars("slug", slug, MAX_NAME_LENGTH);
            if self.repo.exists_by_slug(kind, slug, None).await? {
                errors.taken("slug");
            }
        }
        validate_attributes(
            &mut errors,
            input.description.as_deref(),
            input.color.as_deref(),
            input.icon.as_deref(),
            input.sort_order,
        );
        errors.finish()?;

        let name = name.unwrap_or_default();
        let slug = match explicit_slug {
            Some(slug) => slug.to_string(),
            None => self.unique_slug(kind, &name, None).await?,
        };

        let now = Utc::now();
        let category = Category {
            id: 0,
            kind,
            name,
            slug,
            description: input.description,
            color: input.color,
            icon: input.icon,
            is_active: input.is_active.unwrap_or(true),
            sort_order: input.sort_order.unwrap_or(0),
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&category).await.context("Failed to create category")?;
        self.invalidate(kind).await;
        tracing::info!(kind = %kind, category_id = created.id, "Category created");
        Ok(created)
    }

    pub async fn update(
        &self,
        kind: CategoryKind,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        let mut category = self.get(kind, id).await?;
        let mut errors = ValidationErrors::new();

        if input.name.is_some() {
            if let Some(name) = errors.required("name", input.name.as_deref()) {
                errors.max_chars("name", name, MAX_NAME_LENGTH);
                if name != category.name && self.repo.exists_by_name(kind, name, Some(id)).await? {
                    errors.taken("name");
                }
            }
        }
        validate_attributes(
            &mut errors,
            input.description.as_deref(),
            input.color.as_deref(),
            input.icon.as_deref(),
            input.sort_order,
        );
        errors.finish()?;

        if let Some(name) = input.name.as_deref().map(str::trim) {
            if name != category.name {
                category.slug = self.unique_slug(kind, name, Some(id)).await?;
                category.name = name.to_string();
            }
        }
        if input.description.is_some() {
            category.description = input.description;
        }
        if input.color.is_some() {
            category.color = input.color;
        }
        if input.icon.is_some() {
            category.icon = input.icon;
        }
        if let Some(is_active) = input.is_active {
            category.is_active = is_active;
        }
        if let Some(sort_order) = input.sort_order {
            category.sort_order = sort_order;
        }

        let updated = self.repo.update(&category).await.context("Failed to update category")?;
        self.invalidate(kind).await;
        Ok(updated)
    }

    /// Delete a category that no content of its kind references
    pub async fn delete(&self, kind: CategoryKind, id: i64) -> Result<(), CategoryServiceError> {
        self.get(kind, id).await?;

        let usage = self.repo.count_usage(kind, id).await.context("Failed to count category usage")?;
        if usage > 0 {
            return Err(CategoryServiceError::InUse(format!(
                "Cannot delete category that is being used by {}.",
                kind.content_label()
            )));
        }

        self.repo.delete(kind, id).await.context("Failed to delete category")?;
        self.invalidate(kind).await;
        tracing::info!(kind = %kind, category_id = id, "Category deleted");
        Ok(())
    }

    /// Look a category up by exact name, creating an active one if missing
    pub async fn find_or_create_by_name(&self, kind: CategoryKind, name: &str) -> Result<Category, CategoryServiceError> {
        let name = name.trim();
        if let Some(existing) = self.repo.get_by_name(kind, name).await.context("Failed to get category by name")? {
            return Ok(existing);
        }

        self.create(
            kind,
            CreateCategoryInput {
                name: name.to_string(),
                ..Default::default()
            },
        )
        .await
    }

    /// Slug derived from `name`, suffixed until no other category of the kind uses it
    async fn unique_slug(&self, kind: CategoryKind, name: &str, exclude_id: Option<i64>) -> Result<String, CategoryServiceError> {
        let mut base = generate_slug(name);
        if base.is_empty() {
            base = kind.as_str().to_string();
        }

        let mut slug = base.clone();
        let mut suffix = 2;
        while self.repo.exists_by_slug(kind, &slug, exclude_id).await? {
            slug = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        Ok(slug)
    }

    async fn invalidate(&self, kind: CategoryKind) {
        let _ = self.cache.delete_pattern(&format!("categories:{}:*", kind)).await;
    }
}

fn validate_attributes(
    errors: &mut ValidationErrors,
    description: Option<&str>,
    color: Option<&str>,
    icon: Option<&str>,
    sort_order: Option<i32>,
) {
    if let Some(description) = description {
        errors.max_chars("description", description, MAX_DESCRIPTION_LENGTH);
    }
    if let Some(color) = color {
        errors.max_chars("color", color, MAX_COLOR_LENGTH);
    }
    if let Some(icon) = icon {
        errors.max_chars("icon", icon, MAX_ICON_LENGTH);
    }
    if let Some(sort_order) = sort_order {
        errors.at_least("sort_order", f64::from(sort_order), 0.0);
    }
}

/// Generate a URL-friendly slug from a name
///
/// Lowercases, turns separators and ASCII punctuation into single hyphens
/// and trims hyphens from both ends. Non-ASCII letters are kept.
pub fn generate_slug(name: &str) -> String {
    let mapped: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || !c.is_ascii() { c } else { '-' })
        .collect();

    let mut result = String::with_capacity(mapped.len());
    let mut prev_hyphen = false;
    for c in mapped.chars() {
        if c == '-' {
            if !prev_hyphen && !result.is_empty() {
                result.push(c);
                prev_hyphen = true;
            }
        } else if !c.is_whitespace() {
            result.push(c);
            prev_hyphen = false;
        }
    }

    result.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::SqlxCategoryRepository;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use proptest::prelude::*;

    async fn setup_service() -> (CategoryService, DynDatabasePool) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        let service = CategoryService::new(
            SqlxCategoryRepository::boxed(pool.clone()),
            create_cache(&CacheConfig::default()),
        );
        (service, pool)
    }

    fn named(name: &str) -> CreateCategoryInput {
        CreateCategoryInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello World"), "hello-world");
        assert_eq!(generate_slug("Health & Safety!"), "health-safety");
        assert_eq!(generate_slug("  --Fire   Drills--  "), "fire-drills");
        assert_eq!(generate_slug("snake_case_name"), "snake-case-name");
        assert_eq!(generate_slug("Café Règles"), "café-règles");
        assert_eq!(generate_slug("!!!"), "");
    }

    proptest! {
        #[test]
        fn slug_has_no_edge_or_double_hyphens(name in ".{0,40}") {
            let slug = generate_slug(&name);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert!(!slug.chars().any(|c| c.is_whitespace()));
        }

        #[test]
        fn slug_is_idempotent(name in "[a-zA-Z0-9 _-]{0,40}") {
            let slug = generate_slug(&name);
            prop_assert_eq!(generate_slug(&slug), slug);
        }
    }

    #[tokio::test]
    async fn test_create_generates_slug_and_defaults() {
        let (service, _) = setup_service().await;
        let category = service.create(CategoryKind::News, named("Company Updates")).await.unwrap();

        assert_eq!(category.slug, "company-updates");
        assert!(category.is_active);
        assert_eq!(category.sort_order, 0);
    }

    #[tokio::test]
    async fn test_name_unique_per_kind_only() {
        let (service, _) = setup_service().await;
        service.create(CategoryKind::Document, named("Safety")).await.unwrap();

        let err = service.create(CategoryKind::Document, named("Safety")).await.unwrap_err();
        match err {
            CategoryServiceError::ValidationError(errors) => assert!(errors.has("name")),
            other => panic!("expected validation error, got {:?}", other),
        }

        assert!(service.create(CategoryKind::Course, named("Safety")).await.is_ok());
    }

    #[tokio::test]
    async fn test_colliding_slugs_get_suffix() {
        let (service, _) = setup_service().await;
        let a = service.create(CategoryKind::Course, named("Fire & Safety")).await.unwrap();
        let b = service.create(CategoryKind::Course, named("Fire Safety")).await.unwrap();
        assert_eq!(a.slug, "fire-safety");
        assert_eq!(b.slug, "fire-safety-2");
    }

    #[tokio::test]
    async fn test_attribute_validation() {
        let (service, _) = setup_service().await;
        let input = CreateCategoryInput {
            name: "Colours".to_string(),
            color: Some("#12345678".to_string()),
            sort_order: Some(-1),
            ..Default::default()
        };
        match service.create(CategoryKind::News, input).await.unwrap_err() {
            CategoryServiceError::ValidationError(errors) => {
                assert!(errors.has("color"));
                assert!(errors.has("sort_order"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(service.list(CategoryKind::News).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_cache_invalidated_on_write() {
        let (service, _) = setup_service().await;
        service.create(CategoryKind::News, named("Beta")).await.unwrap();
        assert_eq!(service.list(CategoryKind::News).await.unwrap().len(), 1);

        let alpha = service.create(CategoryKind::News, named("Alpha")).await.unwrap();
        let names: Vec<String> = service
            .list(CategoryKind::News)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);

        let update = UpdateCategoryInput {
            name: Some("Zeta".to_string()),
            is_active: Some(false),
            ..Default::default()
        };
        let updated = service.update(CategoryKind::News, alpha.id, update).await.unwrap();
        assert_eq!(updated.slug, "zeta");
        assert_eq!(service.list_by_name(CategoryKind::News, true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_refuses_when_in_use() {
        let (service, pool) = setup_service().await;
        let category = service.create(CategoryKind::News, named("Events")).await.unwrap();

        let sqlite = pool.as_sqlite().unwrap();
        sqlx::query(
            "INSERT INTO news (title, slug, description, content, category_id, created_at, updated_at) \
             VALUES ('Gala', 'gala', 'd', 'c', ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
        )
        .bind(category.id)
        .execute(sqlite)
        .await
        .unwrap();

        match service.delete(CategoryKind::News, category.id).await.unwrap_err() {
            CategoryServiceError::InUse(message) => {
                assert_eq!(message, "Cannot delete category that is being used by news articles.")
            }
            other => panic!("expected in-use error, got {:?}", other),
        }

        sqlx::query("DELETE FROM news").execute(sqlite).await.unwrap();
        service.delete(CategoryKind::News, category.id).await.unwrap();
        assert!(matches!(
            service.get(CategoryKind::News, category.id).await,
            Err(CategoryServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_find_or_create_by_name() {
        let (service, _) = setup_service().await;
        let first = service.find_or_create_by_name(CategoryKind::Document, "Manuals").await.unwrap();
        let again = service.find_or_create_by_name(CategoryKind::Document, " Manuals ").await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(service.list(CategoryKind::Document).await.unwrap().len(), 1);
    }
}
