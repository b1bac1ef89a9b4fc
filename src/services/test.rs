//! Test (quiz) authoring service
//!
//! Tests belong to a course and carry their questions inline. Every
//! question is validated on its own and errors are keyed by position,
//! e.g. `questions.2.options`.

use crate::db::repositories::{CourseRepository, TestRepository};
use crate::models::{ListParams, PagedResult, Question, QuestionPayload, QuestionType, Test, TestFilter, TestInput};
use crate::services::content::{optional_text, ContentServiceError};
use crate::services::validation::ValidationErrors;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

const MAX_TITLE_LENGTH: usize = 255;
const MAX_QUESTION_LENGTH: usize = 1000;
const MAX_OPTION_LENGTH: usize = 500;
const MAX_ANSWER_LENGTH: usize = 500;
const MAX_EXPLANATION_LENGTH: usize = 1000;
const QUESTION_TYPES: [&str; 4] = ["multiple_choice", "single_choice", "true_false", "text"];

/// JSON body of the test create and update endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub course_id: Option<i64>,
    pub time_limit_minutes: Option<i64>,
    pub passing_score: Option<i64>,
    pub max_attempts: Option<i64>,
    pub is_active: Option<bool>,
    pub questions: Option<Vec<QuestionPayload>>,
}

pub struct TestService {
    repo: Arc<dyn TestRepository>,
    courses: Arc<dyn CourseRepository>,
}

impl TestService {
    pub fn new(repo: Arc<dyn TestRepository>, courses: Arc<dyn CourseRepository>) -> Self {
        Self { repo, courses }
    }

    pub async fn list(&self, filter: &TestFilter, params: &ListParams) -> Result<PagedResult<Test>, ContentServiceError> {
        let (tests, total) = self.repo.list(filter, params).await?;
        Ok(PagedResult::new(tests, total, params))
    }

    pub async fn get(&self, id: i64) -> Result<Test, ContentServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ContentServiceError::not_found("Test"))
    }

    /// New tests are active unless the payload says otherwise
    pub async fn create(&self, payload: TestPayload, created_by: Option<i64>) -> Result<Test, ContentServiceError> {
        let mut input = self.validate(payload, true).await?;
        input.created_by = created_by;

        let test = self.repo.create(&input).await?;
        tracing::info!(test_id = test.id, course_id = test.course_id, "Test created");
        Ok(test)
    }

    /// Full replacement; an absent `is_active` keeps the stored status
    pub async fn update(&self, id: i64, payload: TestPayload) -> Result<Test, ContentServiceError> {
        let existing = self.get(id).await?;
        let mut input = self.validate(payload, existing.is_active).await?;
        input.created_by = existing.created_by;

        self.repo.update(id, &input).await?;
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContentServiceError> {
        if !self.repo.delete(id).await? {
            return Err(ContentServiceError::not_found("Test"));
        }
        tracing::info!(test_id = id, "Test deleted");
        Ok(())
    }

    /// Copy a test as an inactive draft owned by `created_by`
    pub async fn duplicate(&self, id: i64, created_by: Option<i64>) -> Result<Test, ContentServiceError> {
        let original = self.get(id).await?;

        let mut input = TestInput::from(&original);
        input.title = format!("{} (Copy)", original.title);
        input.is_active = false;
        input.created_by = created_by;

        let copy = self.repo.create(&input).await?;
        tracing::info!(test_id = copy.id, source_id = id, "Test duplicated");
        Ok(copy)
    }

    pub async fn toggle_status(&self, id: i64) -> Result<Test, ContentServiceError> {
        let mut test = self.get(id).await?;
        self.repo.set_active(id, !test.is_active).await?;
        test.is_active = !test.is_active;
        Ok(test)
    }

    /// (total, active)
    pub async fn counts(&self) -> Result<(i64, i64), ContentServiceError> {
        Ok(self.repo.counts().await?)
    }

    async fn validate(&self, payload: TestPayload, default_active: bool) -> Result<TestInput, ContentServiceError> {
        let mut errors = ValidationErrors::new();

        let title = errors.required("title", payload.title.as_deref()).map(str::to_string);
        if let Some(ref title) = title {
            errors.max_chars("title", title, MAX_TITLE_LENGTH);
        }

        match payload.course_id {
            Some(course_id) => {
                if self.courses.get_by_id(course_id).await?.is_none() {
                    errors.add("course_id", "The selected course id is invalid.");
                }
            }
            None => {
                errors.add("course_id", "The course id field is required.");
            }
        }

        let time_limit = required_int(&mut errors, "time_limit_minutes", payload.time_limit_minutes, 1, 300);
        let passing_score = required_int(&mut errors, "passing_score", payload.passing_score, 1, 100);
        let max_attempts = required_int(&mut errors, "max_attempts", payload.max_attempts, 1, 10);

        let questions = validate_questions(&mut errors, payload.questions.as_deref());
        errors.finish()?;

        let (Some(title), Some(course_id), Some(time_limit), Some(passing_score), Some(max_attempts)) =
            (title, payload.course_id, time_limit, passing_score, max_attempts)
        else {
            return Err(anyhow::anyhow!("Validated test payload is incomplete").into());
        };

        Ok(TestInput {
            title,
            description: optional_text(payload.description.as_deref()),
            course_id,
            time_limit_minutes: time_limit,
            passing_score,
            max_attempts,
            is_active: payload.is_active.unwrap_or(default_active),
            questions,
            created_by: None,
        })
    }
}

fn required_int(errors: &mut ValidationErrors, field: &str, value: Option<i64>, min: i64, max: i64) -> Option<i32> {
    match value {
        Some(n) => {
            errors.between(field, n, min, max);
            i32::try_from(n).ok()
        }
        None => {
            errors.add(field, format!("The {} field is required.", field.replace('_', " ")));
            None
        }
    }
}

/// Validate the question list, returning the questions that passed
///
/// The returned list only matters when `errors` stays empty.
pub fn validate_questions(errors: &mut ValidationErrors, questions: Option<&[QuestionPayload]>) -> Vec<Question> {
    let questions = match questions {
        Some(q) if !q.is_empty() => q,
        Some(_) => {
            errors.add("questions", "The questions field must have at least 1 items.");
            return Vec::new();
        }
        None => {
            errors.add("questions", "The questions field is required.");
            return Vec::new();
        }
    };

    let mut valid = Vec::with_capacity(questions.len());
    for (i, payload) in questions.iter().enumerate() {
        if let Some(question) = validate_question(errors, i, payload) {
            valid.push(question);
        }
    }
    valid
}

fn validate_question(errors: &mut ValidationErrors, index: usize, payload: &QuestionPayload) -> Option<Question> {
    let key = |field: &str| format!("questions.{}.{}", index, field);

    let text = errors.required(&key("question"), payload.question.as_deref());
    if let Some(text) = text {
        errors.max_chars(&key("question"), text, MAX_QUESTION_LENGTH);
    }

    let question_type = match errors.required(&key("type"), payload.question_type.as_deref()) {
        Some(raw) => {
            errors.one_of(&key("type"), raw, &QUESTION_TYPES);
            QuestionType::from_str(raw).ok()
        }
        None => None,
    };

    let options = payload.options.as_ref().map(|opts| {
        opts.iter().map(|o| o.trim().to_string()).collect::<Vec<_>>()
    });
    // A present options list needs two entries whatever the question type
    let requires_options = question_type.is_some_and(|t| t.requires_options());
    match options.as_deref() {
        None | Some([]) if requires_options => {
            let kind = payload.question_type.as_deref().unwrap_or_default();
            errors.add(
                key("options"),
                format!("The {} field is required when {} is {}.", key("options"), key("type"), kind),
            );
        }
        Some(opts) if opts.len() < 2 => {
            errors.add(key("options"), format!("The {} field must have at least 2 items.", key("options")));
        }
        _ => {}
    }
    if let Some(opts) = options.as_deref() {
        for (j, option) in opts.iter().enumerate() {
            let field = format!("questions.{}.options.{}", index, j);
            if option.is_empty() {
                errors.add(&field, format!("The {} field is required.", field));
            }
            errors.max_chars(&field, option, MAX_OPTION_LENGTH);
        }
    }

    let answer = errors.required(&key("correct_answer"), payload.correct_answer.as_deref());
    if let Some(answer) = answer {
        errors.max_chars(&key("correct_answer"), answer, MAX_ANSWER_LENGTH);
    }

    let points = match payload.points {
        Some(points) => {
            errors.between(&key("points"), points, 1, 100);
            i32::try_from(points).ok()
        }
        None => {
            errors.add(key("points"), format!("The {} field is required.", key("points")));
            None
        }
    };

    let explanation = optional_text(payload.explanation.as_deref());
    if let Some(ref explanation) = explanation {
        errors.max_chars(&key("explanation"), explanation, MAX_EXPLANATION_LENGTH);
    }

    Some(Question {
        question: text?.to_string(),
        question_type: question_type?,
        options,
        correct_answer: answer?.to_string(),
        points: points?,
        explanation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCourseRepository, SqlxTestRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CourseInput, CourseType};
    use proptest::prelude::*;

    async fn setup() -> (TestService, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let courses = SqlxCourseRepository::boxed(pool.clone());
        let course = courses
            .create(&CourseInput {
                title: "Workplace Safety".to_string(),
                slug: "workplace-safety".to_string(),
                description: "d".to_string(),
                content: "c".to_string(),
                price: 0.0,
                course_type: CourseType::SelfLearning,
                category_id: None,
                featured_image: None,
                certificate_template: None,
                max_students: None,
                duration_hours: None,
                requirements: None,
                learning_outcomes: None,
                zoom_link: None,
                schedule: None,
                is_published: true,
                is_featured: false,
                created_by: None,
            })
            .await
            .unwrap();

        (TestService::new(SqlxTestRepository::boxed(pool), courses), course.id)
    }

    fn choice(question: &str, options: &[&str]) -> QuestionPayload {
        QuestionPayload {
            question: Some(question.to_string()),
            question_type: Some("single_choice".to_string()),
            options: Some(options.iter().map(|o| o.to_string()).collect()),
            correct_answer: Some(options.first().copied().unwrap_or("x").to_string()),
            points: Some(5),
            explanation: None,
        }
    }

    fn payload(course_id: i64) -> TestPayload {
        TestPayload {
            title: Some("Module 1 quiz".to_string()),
            description: Some("Covers hazards".to_string()),
            course_id: Some(course_id),
            time_limit_minutes: Some(30),
            passing_score: Some(70),
            max_attempts: Some(3),
            is_active: None,
            questions: Some(vec![choice("Which sign means danger?", &["Red", "Green"])]),
        }
    }

    #[test]
    fn test_question_errors_are_indexed() {
        let mut errors = ValidationErrors::new();
        let questions = vec![
            choice("Fine question", &["A", "B"]),
            choice("Only one option", &["A"]),
            QuestionPayload {
                question: Some("What is 2+2?".to_string()),
                question_type: Some("essay".to_string()),
                points: Some(0),
                ..Default::default()
            },
        ];
        let valid = validate_questions(&mut errors, Some(&questions));

        assert_eq!(valid.len(), 2);
        assert!(!errors.has("questions.0.options"));
        assert!(errors.has("questions.1.options"));
        assert!(errors.has("questions.2.type"));
        assert!(errors.has("questions.2.points"));
        assert!(errors.has("questions.2.correct_answer"));
    }

    #[test]
    fn test_choice_question_needs_options() {
        let mut errors = ValidationErrors::new();
        let mut q = choice("Pick one", &[]);
        q.options = None;
        validate_questions(&mut errors, Some(&[q]));
        assert!(errors.has("questions.0.options"));

        let mut errors = ValidationErrors::new();
        let q = QuestionPayload {
            question: Some("Safety first?".to_string()),
            question_type: Some("true_false".to_string()),
            correct_answer: Some("true".to_string()),
            points: Some(1),
            ..Default::default()
        };
        let valid = validate_questions(&mut errors, Some(&[q.clone()]));
        assert!(errors.is_empty());
        assert_eq!(valid[0].question_type, QuestionType::TrueFalse);

        let mut errors = ValidationErrors::new();
        let single_option = QuestionPayload {
            options: Some(vec!["true".to_string()]),
            ..q
        };
        validate_questions(&mut errors, Some(&[single_option]));
        assert!(errors.has("questions.0.options"));
    }

    #[test]
    fn test_empty_question_list() {
        let mut errors = ValidationErrors::new();
        validate_questions(&mut errors, Some(&[]));
        assert!(errors.has("questions"));
    }

    proptest! {
        #[test]
        fn points_outside_range_always_rejected(points in prop_oneof![i64::MIN..1i64, 101i64..i64::MAX]) {
            let mut errors = ValidationErrors::new();
            let mut q = choice("Q", &["A", "B"]);
            q.points = Some(points);
            validate_questions(&mut errors, Some(&[q]));
            prop_assert!(errors.has("questions.0.points"));
        }

        #[test]
        fn well_formed_choice_questions_pass(
            options in prop::collection::vec("[a-zA-Z0-9]{1,20}", 2..6),
            points in 1i64..=100,
        ) {
            let mut errors = ValidationErrors::new();
            let refs: Vec<&str> = options.iter().map(String::as_str).collect();
            let mut q = choice("Pick the right one", &refs);
            q.points = Some(points);
            let valid = validate_questions(&mut errors, Some(&[q]));
            prop_assert!(errors.is_empty());
            prop_assert_eq!(valid[0].options.as_ref().map(Vec::len), Some(options.len()));
        }
    }

    #[tokio::test]
    async fn test_create_defaults_active_and_checks_course() {
        let (service, course_id) = setup().await;
        let test = service.create(payload(course_id), None).await.unwrap();
        assert!(test.is_active);
        assert_eq!(test.course_title.as_deref(), Some("Workplace Safety"));
        assert_eq!(test.total_points(), 5);

        let mut bad = payload(course_id + 100);
        bad.passing_score = Some(0);
        match service.create(bad, None).await.unwrap_err() {
            ContentServiceError::ValidationError(errors) => {
                assert!(errors.has("course_id"));
                assert!(errors.has("passing_score"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_keeps_status_when_absent() {
        let (service, course_id) = setup().await;
        let test = service.create(payload(course_id), None).await.unwrap();
        service.toggle_status(test.id).await.unwrap();

        let mut update = payload(course_id);
        update.title = Some("Module 1 quiz (revised)".to_string());
        let updated = service.update(test.id, update).await.unwrap();
        assert_eq!(updated.title, "Module 1 quiz (revised)");
        assert!(!updated.is_active);
    }

    #[tokio::test]
    async fn test_duplicate_and_delete() {
        let (service, course_id) = setup().await;
        let test = service.create(payload(course_id), None).await.unwrap();

        let copy = service.duplicate(test.id, None).await.unwrap();
        assert_ne!(copy.id, test.id);
        assert_eq!(copy.title, "Module 1 quiz (Copy)");
        assert!(!copy.is_active);
        assert_eq!(copy.questions, test.questions);
        assert_eq!(service.counts().await.unwrap(), (2, 1));

        service.delete(test.id).await.unwrap();
        assert!(matches!(service.delete(test.id).await, Err(ContentServiceError::NotFound(_))));
    }
}
