//! News service

use crate::config::StorageConfig;
use crate::db::repositories::{NewsRepository, NewsTotals};
use crate::models::{CategoryKind, ListParams, News, NewsFilter, NewsInput, PagedResult};
use crate::services::category::{generate_slug, CategoryService, CategoryServiceError};
use crate::services::content::{optional_text, parse_datetime, validate_file, ContentServiceError};
use crate::services::storage::{Storage, UploadedFile, NEWS_IMAGES_DIR};
use crate::services::validation::ValidationErrors;
use chrono::{DateTime, Utc};
use std::sync::Arc;

const MAX_TITLE_LENGTH: usize = 255;
const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Multipart news form
#[derive(Debug, Clone, Default)]
pub struct NewsForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<String>,
    pub is_published: Option<String>,
    pub is_featured: Option<String>,
    pub published_at: Option<String>,
    pub image: Option<UploadedFile>,
    pub featured_image: Option<UploadedFile>,
}

pub struct NewsService {
    repo: Arc<dyn NewsRepository>,
    categories: Arc<CategoryService>,
    storage: Arc<Storage>,
    config: StorageConfig,
}

impl NewsService {
    pub fn new(
        repo: Arc<dyn NewsRepository>,
        categories: Arc<CategoryService>,
        storage: Arc<Storage>,
        config: StorageConfig,
    ) -> Self {
        Self {
            repo,
            categories,
            storage,
            config,
        }
    }

    pub async fn list(&self, filter: &NewsFilter, params: &ListParams) -> Result<PagedResult<News>, ContentServiceError> {
        let (items, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get(&self, id: i64) -> Result<News, ContentServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ContentServiceError::not_found("News"))
    }

    /// Detail view; counts the view
    pub async fn view(&self, id: i64) -> Result<News, ContentServiceError> {
        let mut news = self.get(id).await?;
        self.repo.increment_views(id).await?;
        news.views_count += 1;
        Ok(news)
    }

    pub async fn create(&self, form: NewsForm, created_by: Option<i64>) -> Result<News, ContentServiceError> {
        let mut input = self.validate(&form, None).await?;
        input.created_by = created_by;

        input.image_path = self.store_image(form.image.as_ref()).await?;
        input.featured_image = self.store_image(form.featured_image.as_ref()).await?;

        match self.repo.create(&input).await {
            Ok(news) => {
                tracing::info!(news_id = news.id, "News created");
                Ok(news)
            }
            Err(e) => {
                let stored: Vec<&str> = [input.image_path.as_deref(), input.featured_image.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect();
                self.storage.delete_quietly(&stored).await;
                Err(e.into())
            }
        }
    }

    pub async fn update(&self, id: i64, form: NewsForm) -> Result<News, ContentServiceError> {
        let existing = self.get(id).await?;
        let mut input = self.validate(&form, Some(&existing)).await?;
        input.created_by = existing.created_by;

        input.image_path = self.store_image(form.image.as_ref()).await?;
        input.featured_image = self.store_image(form.featured_image.as_ref()).await?;
        self.repo.update(id, &input).await?;

        let mut replaced = Vec::new();
        if input.image_path.is_some() {
            replaced.extend(existing.image_path.as_deref());
        }
        if input.featured_image.is_some() {
            replaced.extend(existing.featured_image.as_deref());
        }
        self.storage.delete_quietly(&replaced).await;

        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentServiceError> {
        let news = self.get(id).await?;
        self.repo.delete(id).await?;
        self.storage.delete_quietly(&news.image_paths()).await;
        tracing::info!(news_id = id, "News deleted");
        Ok(())
    }

    pub async fn totals(&self) -> Result<NewsTotals, ContentServiceError> {
        Ok(self.repo.totals().await?)
    }

    async fn store_image(&self, file: Option<&UploadedFile>) -> Result<Option<String>, ContentServiceError> {
        match file {
            Some(file) => Ok(Some(self.storage.store_image(NEWS_IMAGES_DIR, file).await?)),
            None => Ok(None),
        }
    }

    /// Validate a form into repository input; image columns are left empty
    async fn validate(&self, form: &NewsForm, existing: Option<&News>) -> Result<NewsInput, ContentServiceError> {
        let mut errors = ValidationErrors::new();

        let title = errors.required("title", form.title.as_deref());
        if let Some(title) = title {
            errors.max_chars("title", title, MAX_TITLE_LENGTH);
        }
        let description = errors.required("description", form.description.as_deref());
        if let Some(description) = description {
            errors.max_chars("description", description, MAX_DESCRIPTION_LENGTH);
        }
        let content = errors.required("content", form.content.as_deref());

        let category_id = errors.optional_integer("category_id", form.category_id.as_deref());
        if let Some(category_id) = category_id {
            match self.categories.get(CategoryKind::News, category_id).await {
                Ok(_) => {}
                Err(CategoryServiceError::NotFound) => {
                    errors.add("category_id", "The selected category id is invalid.");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let is_published = errors.optional_bool("is_published", form.is_published.as_deref());
        let is_featured = errors.optional_bool("is_featured", form.is_featured.as_deref());

        let published_at = match optional_text(form.published_at.as_deref()) {
            Some(raw) => {
                let parsed = parse_datetime(&raw);
                if parsed.is_none() {
                    errors.add("published_at", "The published at field must be a valid date.");
                }
                parsed
            }
            None => None,
        };

        for (field, file) in [("image", form.image.as_ref()), ("featured_image", form.featured_image.as_ref())] {
            if let Some(file) = file {
                validate_file(&mut errors, field, file, &self.config.image_extensions, self.config.max_image_size);
            }
        }

        errors.finish()?;

        let (Some(title), Some(description), Some(content)) = (title, description, content) else {
            return Err(anyhow::anyhow!("Validated news form is incomplete").into());
        };

        let is_published = is_published.unwrap_or_else(|| existing.is_some_and(|n| n.is_published));
        let is_featured = is_featured.unwrap_or_else(|| existing.is_some_and(|n| n.is_featured));
        let published_at = resolve_published_at(is_published, published_at, existing.and_then(|n| n.published_at));

        let mut slug = generate_slug(title);
        if slug.is_empty() {
            slug = "news".to_string();
        }

        Ok(NewsInput {
            title: title.to_string(),
            slug,
            description: description.to_string(),
            content: content.to_string(),
            image_path: None,
            featured_image: None,
            category_id,
            is_published,
            is_featured,
            published_at,
            created_by: None,
        })
    }
}

/// An explicit date wins; otherwise a published article keeps its earlier
/// date or is stamped now
fn resolve_published_at(
    is_published: bool,
    requested: Option<DateTime<Utc>>,
    stored: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (requested, is_published) {
        (Some(at), _) => Some(at),
        (None, true) => Some(stored.unwrap_or_else(Utc::now)),
        (None, false) => stored,
    }
}
