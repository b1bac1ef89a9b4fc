//! Field-level input validation
//!
//! Services collect every failing rule into a [`ValidationErrors`] map keyed
//! by field name (`title`, `questions.0.options`, ...) and reject the request
//! as a whole if anything was recorded.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("valid url regex"));

/// Messages per field, in field order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

pub(crate) fn label(field: &str) -> String {
    if field.contains('.') {
        field.to_string()
    } else {
        field.replace('_', " ")
    }
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors.entry(field.into()).or_default().push(message.into());
        self
    }

    /// Build a set holding a single message
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    pub fn first_message(&self) -> Option<&str> {
        self.errors.values().flatten().next().map(String::as_str)
    }

    /// `Ok(())` if nothing was recorded
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Trimmed non-empty value, or a "required" message
    pub fn required<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Some(v),
            None => {
                self.add(field, format!("The {} field is required.", label(field)));
                None
            }
        }
    }

    pub fn max_chars(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.chars().count() > max {
            self.add(
                field,
                format!("The {} field must not be greater than {} characters.", label(field), max),
            );
        }
        self
    }

    pub fn min_chars(&mut self, field: &str, value: &str, min: usize) -> &mut Self {
        if value.chars().count() < min {
            self.add(field, format!("The {} field must be at least {} characters.", label(field), min));
        }
        self
    }

    pub fn between(&mut self, field: &str, value: i64, min: i64, max: i64) -> &mut Self {
        if value < min || value > max {
            self.add(field, format!("The {} field must be between {} and {}.", label(field), min, max));
        }
        self
    }

    pub fn at_least(&mut self, field: &str, value: f64, min: f64) -> &mut Self {
        if value.is_nan() || value < min {
            self.add(field, format!("The {} field must be at least {}.", label(field), min));
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !EMAIL_RE.is_match(value) {
            self.add(field, format!("The {} field must be a valid email address.", label(field)));
        }
        self
    }

    pub fn url(&mut self, field: &str, value: &str) -> &mut Self {
        if !URL_RE.is_match(value) {
            self.add(field, format!("The {} field must be a valid URL.", label(field)));
        }
        self
    }

    /// Value must be one of `allowed`
    pub fn one_of(&mut self, field: &str, value: &str, allowed: &[&str]) -> &mut Self {
        if !allowed.contains(&value) {
            self.add(field, format!("The selected {} is invalid.", label(field)));
        }
        self
    }

    pub fn taken(&mut self, field: &str) -> &mut Self {
        self.add(field, format!("The {} has already been taken.", label(field)))
    }

    /// Parse a required number, recording a message when it is not numeric
    pub fn number(&mut self, field: &str, value: Option<&str>) -> Option<f64> {
        let raw = self.required(field, value)?;
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(n),
            _ => {
                self.add(field, format!("The {} field must be a number.", label(field)));
                None
            }
        }
    }

    /// Parse an optional integer; blank input counts as absent
    pub fn optional_integer(&mut self, field: &str, value: Option<&str>) -> Option<i64> {
        let raw = value.map(str::trim).filter(|v| !v.is_empty())?;
        match raw.parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                self.add(field, format!("The {} field must be an integer.", label(field)));
                None
            }
        }
    }

    /// Parse an optional boolean form value (`true`, `false`, `1`, `0`)
    pub fn optional_bool(&mut self, field: &str, value: Option<&str>) -> Option<bool> {
        let raw = value.map(str::trim).filter(|v| !v.is_empty())?;
        match parse_bool(raw) {
            Some(b) => Some(b),
            None => {
                self.add(field, format!("The {} field must be true or false.", label(field)));
                None
            }
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count: usize = self.errors.values().map(Vec::len).sum();
        match self.first_message() {
            None => f.write_str("The given data was invalid."),
            Some(first) if count > 1 => {
                let more = count - 1;
                let noun = if more == 1 { "error" } else { "errors" };
                write!(f, "{} (and {} more {})", first, more, noun)
            }
            Some(first) => f.write_str(first),
        }
    }
}

impl std::error::Error for ValidationErrors {}

/// Lenient boolean used by form fields and query strings
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}
