//! Course service
//!
//! Courses are written from multipart forms so a featured image and a
//! certificate template can ride along with the text fields.

use crate::config::StorageConfig;
use crate::db::repositories::{CourseRepository, CourseTotals, TestRepository};
use crate::models::{CategoryKind, Course, CourseFilter, CourseInput, CourseType, ListParams, PagedResult, Test};
use crate::services::category::{generate_slug, CategoryService};
use crate::services::content::{optional_text, validate_file, ContentServiceError};
use crate::services::storage::{Storage, UploadedFile, COURSE_CERTIFICATES_DIR, COURSE_IMAGES_DIR};
use crate::services::validation::ValidationErrors;
use std::str::FromStr;
use std::sync::Arc;

const MAX_TITLE_LENGTH: usize = 255;
const MAX_CATEGORY_LENGTH: usize = 255;
const COURSE_TYPES: [&str; 3] = ["online", "self_learning", "offline"];

/// Multipart course form; every text field arrives as a string
#[derive(Debug, Clone, Default)]
pub struct CourseForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub price: Option<String>,
    pub course_type: Option<String>,
    pub category: Option<String>,
    pub max_students: Option<String>,
    pub duration_hours: Option<String>,
    pub requirements: Option<String>,
    pub learning_outcomes: Option<String>,
    pub zoom_link: Option<String>,
    pub schedule: Option<String>,
    pub is_published: Option<String>,
    pub is_featured: Option<String>,
    pub featured_image: Option<UploadedFile>,
    pub certificate_template: Option<UploadedFile>,
}

/// Form fields after validation, before images are stored
struct ValidCourse {
    title: String,
    description: String,
    content: String,
    price: f64,
    course_type: CourseType,
    category: String,
    max_students: Option<i64>,
    duration_hours: Option<i64>,
    requirements: Option<String>,
    learning_outcomes: Option<String>,
    zoom_link: Option<String>,
    schedule: Option<serde_json::Value>,
    is_published: Option<bool>,
    is_featured: Option<bool>,
}

/// Paths of the images written for one request
struct StoredImages {
    featured_image: Option<String>,
    certificate_template: Option<String>,
}

impl StoredImages {
    fn paths(&self) -> Vec<&str> {
        [self.featured_image.as_deref(), self.certificate_template.as_deref()]
            .into_iter()
            .flatten()
            .collect()
    }
}

pub struct CourseService {
    repo: Arc<dyn CourseRepository>,
    tests: Arc<dyn TestRepository>,
    categories: Arc<CategoryService>,
    storage: Arc<Storage>,
    config: StorageConfig,
}

impl CourseService {
    pub fn new(
        repo: Arc<dyn CourseRepository>,
        tests: Arc<dyn TestRepository>,
        categories: Arc<CategoryService>,
        storage: Arc<Storage>,
        config: StorageConfig,
    ) -> Self {
        Self {
            repo,
            tests,
            categories,
            storage,
            config,
        }
    }

    pub async fn list(&self, filter: &CourseFilter, params: &ListParams) -> Result<PagedResult<Course>, ContentServiceError> {
        let (courses, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(courses, total, params))
    }

    pub async fn get(&self, id: i64) -> Result<Course, ContentServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ContentServiceError::not_found("Course"))
    }

    /// Detail view; counts the view
    pub async fn view(&self, id: i64) -> Result<Course, ContentServiceError> {
        let mut course = self.get(id).await?;
        self.repo.increment_views(id).await?;
        course.views_count += 1;
        Ok(course)
    }

    pub async fn create(&self, form: CourseForm, created_by: Option<i64>) -> Result<Course, ContentServiceError> {
        let valid = self.validate(&form, None).await?;
        let images = self.store_images(&form).await?;

        let created = async {
            let category = self
                .categories
                .find_or_create_by_name(CategoryKind::Course, &valid.category)
                .await?;
            let input = build_input(
                valid,
                category.id,
                images.featured_image.clone(),
                images.certificate_template.clone(),
                created_by,
                None,
            );
            Ok::<_, ContentServiceError>(self.repo.create(&input).await?)
        }
        .await;

        match created {
            Ok(course) => {
                tracing::info!(course_id = course.id, "Course created");
                Ok(course)
            }
            Err(e) => {
                self.storage.delete_quietly(&images.paths()).await;
                Err(e)
            }
        }
    }

    /// Replace a course; a new image replaces and deletes the old one
    pub async fn update(&self, id: i64, form: CourseForm) -> Result<Course, ContentServiceError> {
        let existing = self.get(id).await?;
        let valid = self.validate(&form, Some(id)).await?;
        let images = self.store_images(&form).await?;

        let saved = async {
            let category = self
                .categories
                .find_or_create_by_name(CategoryKind::Course, &valid.category)
                .await?;
            let input = build_input(
                valid,
                category.id,
                images.featured_image.clone(),
                images.certificate_template.clone(),
                existing.created_by,
                Some(&existing),
            );
            self.repo.update(id, &input).await?;
            Ok::<_, ContentServiceError>(())
        }
        .await;
        if let Err(e) = saved {
            self.storage.delete_quietly(&images.paths()).await;
            return Err(e);
        }

        let mut replaced = Vec::new();
        if images.featured_image.is_some() {
            replaced.extend(existing.featured_image.as_deref());
        }
        if images.certificate_template.is_some() {
            replaced.extend(existing.certificate_template.as_deref());
        }
        self.storage.delete_quietly(&replaced).await;

        self.get(id).await
    }

    /// Delete a course with its tests and images
    pub async fn delete(&self, id: i64) -> Result<(), ContentServiceError> {
        let course = self.get(id).await?;

        let removed_tests = self.tests.delete_by_course(id).await?;
        self.repo.delete(id).await?;
        self.storage.delete_quietly(&course.image_paths()).await;

        tracing::info!(course_id = id, removed_tests, "Course deleted");
        Ok(())
    }

    /// Tests attached to a course, oldest first
    pub async fn tests(&self, id: i64) -> Result<Vec<Test>, ContentServiceError> {
        self.get(id).await?;
        Ok(self.tests.list_by_course(id).await?)
    }

    pub async fn totals(&self) -> Result<CourseTotals, ContentServiceError> {
        Ok(self.repo.totals().await?)
    }

    /// Store the submitted images; a failed write leaves nothing behind
    async fn store_images(&self, form: &CourseForm) -> Result<StoredImages, ContentServiceError> {
        let featured_image = self.store_image(COURSE_IMAGES_DIR, form.featured_image.as_ref()).await?;
        match self
            .store_image(COURSE_CERTIFICATES_DIR, form.certificate_template.as_ref())
            .await
        {
            Ok(certificate_template) => Ok(StoredImages {
                featured_image,
                certificate_template,
            }),
            Err(e) => {
                let stored: Vec<&str> = featured_image.as_deref().into_iter().collect();
                self.storage.delete_quietly(&stored).await;
                Err(e)
            }
        }
    }

    async fn store_image(&self, dir: &str, file: Option<&UploadedFile>) -> Result<Option<String>, ContentServiceError> {
        match file {
            Some(file) => Ok(Some(self.storage.store_image(dir, file).await?)),
            None => Ok(None),
        }
    }

    async fn validate(&self, form: &CourseForm, course_id: Option<i64>) -> Result<ValidCourse, ContentServiceError> {
        let mut errors = ValidationErrors::new();

        let title = errors.required("title", form.title.as_deref());
        if let Some(title) = title {
            errors.max_chars("title", title, MAX_TITLE_LENGTH);
            if self.repo.exists_by_title(title, course_id).await? {
                errors.taken("title");
            }
        }
        let description = errors.required("description", form.description.as_deref());
        let content = errors.required("content", form.content.as_deref());
        let category = errors.required("category", form.category.as_deref());
        if let Some(category) = category {
            errors.max_chars("category", category, MAX_CATEGORY_LENGTH);
        }
        let price = errors.number("price", form.price.as_deref());
        if let Some(price) = price {
            errors.at_least("price", price, 0.0);
        }
        let course_type = match errors.required("type", form.course_type.as_deref()) {
            Some(raw) => {
                errors.one_of("type", raw, &COURSE_TYPES);
                CourseType::from_str(raw).ok()
            }
            None => None,
        };

        for (field, file) in [
            ("featured_image", form.featured_image.as_ref()),
            ("certificate_template", form.certificate_template.as_ref()),
        ] {
            if let Some(file) = file {
                validate_file(&mut errors, field, file, &self.config.image_extensions, self.config.max_image_size);
            }
        }

        let max_students = errors.optional_integer("max_students", form.max_students.as_deref());
        if let Some(n) = max_students {
            errors.at_least("max_students", n as f64, 1.0);
        }
        let duration_hours = errors.optional_integer("duration_hours", form.duration_hours.as_deref());
        if let Some(n) = duration_hours {
            errors.at_least("duration_hours", n as f64, 1.0);
        }

        let zoom_link = optional_text(form.zoom_link.as_deref());
        if let Some(ref link) = zoom_link {
            errors.url("zoom_link", link);
        }
        let schedule = parse_schedule(&mut errors, form.schedule.as_deref());

        let is_published = errors.optional_bool("is_published", form.is_published.as_deref());
        let is_featured = errors.optional_bool("is_featured", form.is_featured.as_deref());

        errors.finish()?;

        let (Some(title), Some(description), Some(content), Some(category), Some(price), Some(course_type)) =
            (title, description, content, category, price, course_type)
        else {
            return Err(anyhow::anyhow!("Validated course form is incomplete").into());
        };

        Ok(ValidCourse {
            title: title.to_string(),
            description: description.to_string(),
            content: content.to_string(),
            price,
            course_type,
            category: category.to_string(),
            max_students,
            duration_hours,
            requirements: optional_text(form.requirements.as_deref()),
            learning_outcomes: optional_text(form.learning_outcomes.as_deref()),
            zoom_link,
            schedule,
            is_published,
            is_featured,
        })
    }
}

/// Schedule arrives as a JSON string and must decode to an array
fn parse_schedule(errors: &mut ValidationErrors, raw: Option<&str>) -> Option<serde_json::Value> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty() && *s != "null")?;
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value @ serde_json::Value::Array(_)) => Some(value),
        _ => {
            errors.add("schedule", "The schedule field must be an array.");
            None
        }
    }
}

fn build_input(
    valid: ValidCourse,
    category_id: i64,
    featured_image: Option<String>,
    certificate_template: Option<String>,
    created_by: Option<i64>,
    existing: Option<&Course>,
) -> CourseInput {
    let mut slug = generate_slug(&valid.title);
    if slug.is_empty() {
        slug = "course".to_string();
    }

    CourseInput {
        slug,
        title: valid.title,
        description: valid.description,
        content: valid.content,
        price: valid.price,
        course_type: valid.course_type,
        category_id: Some(category_id),
        featured_image,
        certificate_template,
        max_students: valid.max_students,
        duration_hours: valid.duration_hours,
        requirements: valid.requirements,
        learning_outcomes: valid.learning_outcomes,
        zoom_link: valid.zoom_link,
        schedule: valid.schedule,
        is_published: valid
            .is_published
            .unwrap_or_else(|| existing.is_some_and(|c| c.is_published)),
        is_featured: valid
            .is_featured
            .unwrap_or_else(|| existing.is_some_and(|c| c.is_featured)),
        created_by,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::{SqlxCategoryRepository, SqlxCourseRepository, SqlxTestRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Question, QuestionType, TestInput};
    use tempfile::TempDir;

    struct Fixture {
        service: CourseService,
        tests: Arc<dyn TestRepository>,
        dir: TempDir,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let dir = TempDir::new().unwrap();
        let categories = Arc::new(CategoryService::new(
            SqlxCategoryRepository::boxed(pool.clone()),
            create_cache(&CacheConfig::default()),
        ));
        let tests = SqlxTestRepository::boxed(pool.clone());
        let service = CourseService::new(
            SqlxCourseRepository::boxed(pool),
            tests.clone(),
            categories,
            Arc::new(Storage::new(dir.path())),
            StorageConfig {
                path: dir.path().to_path_buf(),
                ..Default::default()
            },
        );
        Fixture { service, tests, dir }
    }

    fn image(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        }
    }

    fn form(title: &str) -> CourseForm {
        CourseForm {
            title: Some(title.to_string()),
            description: Some("Learn the basics".to_string()),
            content: Some("Module 1".to_string()),
            price: Some("49".to_string()),
            course_type: Some("online".to_string()),
            category: Some("Compliance".to_string()),
            schedule: Some(r#"[{"day":"Mon","time":"10:00"}]"#.to_string()),
            is_published: Some("1".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_failed_image_store_cleans_up() {
        let fx = setup().await;
        std::fs::create_dir_all(fx.dir.path().join("courses")).unwrap();
        std::fs::write(fx.dir.path().join("courses/certificates"), b"").unwrap();

        let mut input = form("Forklift Basics");
        input.featured_image = Some(image("cover.png"));
        input.certificate_template = Some(image("certificate.png"));
        assert!(fx.service.create(input, None).await.is_err());

        let images = fx.dir.path().join("courses/images");
        let leftover = std::fs::read_dir(&images).map(|entries| entries.count()).unwrap_or(0);
        assert_eq!(leftover, 0);
        assert!(fx.service.categories.list(CategoryKind::Course).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_course() {
        let f = setup().await;
        let mut input = form("GDPR Essentials");
        input.featured_image = Some(image("cover.png"));

        let course = f.service.create(input, None).await.unwrap();
        assert_eq!(course.slug, "gdpr-essentials");
        assert_eq!(course.course_type, CourseType::Online);
        assert_eq!(course.category_name.as_deref(), Some("Compliance"));
        assert!(course.is_published);
        assert!(!course.is_featured);
        assert_eq!(course.schedule.as_ref().unwrap()[0]["day"], "Mon");

        let path = course.featured_image.unwrap();
        assert!(path.starts_with("courses/images/"));
        assert!(f.dir.path().join(path).is_file());
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let f = setup().await;
        f.service.create(form("GDPR Essentials"), None).await.unwrap();

        let mut input = form("GDPR Essentials");
        input.course_type = Some("hybrid".to_string());
        input.max_students = Some("0".to_string());
        input.zoom_link = Some("not a url".to_string());
        input.schedule = Some(r#"{"day":"Mon"}"#.to_string());
        input.featured_image = Some(image("cover.bmp"));

        match f.service.create(input, None).await.unwrap_err() {
            ContentServiceError::ValidationError(errors) => {
                for field in ["title", "type", "max_students", "zoom_link", "schedule", "featured_image"] {
                    assert!(errors.has(field), "missing error for {}", field);
                }
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(!f.dir.path().join(COURSE_IMAGES_DIR).exists());
    }

    #[tokio::test]
    async fn test_update_replaces_image_and_keeps_flags() {
        let f = setup().await;
        let mut input = form("GDPR Essentials");
        input.featured_image = Some(image("old.png"));
        let course = f.service.create(input, None).await.unwrap();
        let old_path = f.dir.path().join(course.featured_image.as_deref().unwrap());

        let mut update = form("GDPR Essentials");
        update.is_published = None;
        update.content = Some("Module 1 and 2".to_string());
        let updated = f.service.update(course.id, update).await.unwrap();
        assert!(updated.is_published);
        assert_eq!(updated.featured_image, course.featured_image);
        assert!(old_path.is_file());

        let mut update = form("GDPR Essentials");
        update.featured_image = Some(image("new.jpg"));
        let updated = f.service.update(course.id, update).await.unwrap();
        assert_ne!(updated.featured_image, course.featured_image);
        assert!(!old_path.exists());
    }

    #[tokio::test]
    async fn test_view_counts() {
        let f = setup().await;
        let course = f.service.create(form("GDPR Essentials"), None).await.unwrap();
        assert_eq!(f.service.view(course.id).await.unwrap().views_count, 1);
        assert_eq!(f.service.view(course.id).await.unwrap().views_count, 2);
        assert_eq!(f.service.totals().await.unwrap().views, 2);
    }

    #[tokio::test]
    async fn test_delete_cascades_to_tests_and_images() {
        let f = setup().await;
        let mut input = form("GDPR Essentials");
        input.certificate_template = Some(image("cert.png"));
        let course = f.service.create(input, None).await.unwrap();
        let cert = f.dir.path().join(course.certificate_template.as_deref().unwrap());

        f.tests
            .create(&TestInput {
                title: "Final quiz".to_string(),
                description: None,
                course_id: course.id,
                time_limit_minutes: 30,
                passing_score: 70,
                max_attempts: 3,
                is_active: true,
                questions: vec![Question {
                    question: "Is consent required?".to_string(),
                    question_type: QuestionType::TrueFalse,
                    options: None,
                    correct_answer: "true".to_string(),
                    points: 1,
                    explanation: None,
                }],
                created_by: None,
            })
            .await
            .unwrap();
        assert_eq!(f.service.tests(course.id).await.unwrap().len(), 1);

        f.service.delete(course.id).await.unwrap();
        assert!(!cert.exists());
        assert!(f.tests.list_by_course(course.id).await.unwrap().is_empty());
        assert!(matches!(f.service.get(course.id).await, Err(ContentServiceError::NotFound(_))));
    }
}
