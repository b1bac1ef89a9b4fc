//! Test (quiz) model
//!
//! Tests are authored only. Questions are kept as a JSON list on the test row
//! and are never graded here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Answer format of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    SingleChoice,
    TrueFalse,
    Text,
}

impl QuestionType {
    /// Choice questions must list their options
    pub fn requires_options(&self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::SingleChoice)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::SingleChoice => "single_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::Text => "text",
        };
        f.write_str(s)
    }
}

impl FromStr for QuestionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "single_choice" => Ok(QuestionType::SingleChoice),
            "true_false" => Ok(QuestionType::TrueFalse),
            "text" => Ok(QuestionType::Text),
            _ => Err(anyhow::anyhow!("Invalid question type: {}", s)),
        }
    }
}

/// A validated question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    pub points: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A question as submitted, before validation. Every field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuestionPayload {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default, rename = "type")]
    pub question_type: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub points: Option<i64>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// A test attached to a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub course_id: i64,
    /// Title of the parent course, joined in on read
    pub course_title: Option<String>,
    pub time_limit_minutes: i32,
    pub passing_score: i32,
    pub max_attempts: i32,
    pub is_active: bool,
    pub questions: Vec<Question>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Test {
    /// Sum of all question points
    pub fn total_points(&self) -> i64 {
        self.questions.iter().map(|q| q.points as i64).sum()
    }
}

/// Column values written on create and update
#[derive(Debug, Clone)]
pub struct TestInput {
    pub title: String,
    pub description: Option<String>,
    pub course_id: i64,
    pub time_limit_minutes: i32,
    pub passing_score: i32,
    pub max_attempts: i32,
    pub is_active: bool,
    pub questions: Vec<Question>,
    pub created_by: Option<i64>,
}

impl From<&Test> for TestInput {
    fn from(test: &Test) -> Self {
        Self {
            title: test.title.clone(),
            description: test.description.clone(),
            course_id: test.course_id,
            time_limit_minutes: test.time_limit_minutes,
            passing_score: test.passing_score,
            max_attempts: test.max_attempts,
            is_active: test.is_active,
            questions: test.questions.clone(),
            created_by: test.created_by,
        }
    }
}

/// Filters for test listings
#[derive(Debug, Clone, Default)]
pub struct TestFilter {
    pub course_id: Option<i64>,
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_json_shape() {
        let q = Question {
            question: "2 + 2?".to_string(),
            question_type: QuestionType::SingleChoice,
            options: Some(vec!["3".to_string(), "4".to_string()]),
            correct_answer: "4".to_string(),
            points: 5,
            explanation: None,
        };
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["type"], "single_choice");
        assert!(json.get("explanation").is_none());

        let back: Question = serde_json::from_value(json).unwrap();
        assert_eq!(back, q);
    }

    #[test]
    fn test_requires_options() {
        assert!(QuestionType::MultipleChoice.requires_options());
        assert!(QuestionType::SingleChoice.requires_options());
        assert!(!QuestionType::TrueFalse.requires_options());
        assert!(!QuestionType::Text.requires_options());
    }

    #[test]
    fn test_payload_tolerates_missing_fields() {
        let payload: QuestionPayload = serde_json::from_str(r#"{"type":"text"}"#).unwrap();
        assert_eq!(payload.question_type.as_deref(), Some("text"));
        assert!(payload.question.is_none());
    }
}
