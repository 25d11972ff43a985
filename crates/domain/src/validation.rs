//! Typed request validation.
//!
//! Each request type implements [`Validate`] by running the checks it needs
//! through a [`Validator`], which collects one [`FieldError`] per failed rule.

use serde::Serialize;

/// The rule a field failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Required,
    Email,
    HttpUrl,
    MinLength,
    Positive,
    NonNegative,
    AtLeastOneField,
}

/// A single failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub rule: Rule,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, rule: Rule, message: impl Into<String>) -> Self {
        Self {
            field,
            rule,
            message: message.into(),
        }
    }

    pub fn required(field: &'static str) -> Self {
        Self::new(field, Rule::Required, format!("{field} is required"))
    }
}

/// All validation failures for one request, in the order they were found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Returns true if `field` failed `rule`.
    pub fn has(&self, field: &str, rule: Rule) -> bool {
        self.0.iter().any(|e| e.field == field && e.rule == rule)
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self(vec![error])
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Implemented by request types that can be checked before any storage work.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Collects field errors.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `error` unless `ok` holds.
    pub fn check(&mut self, ok: bool, error: impl FnOnce() -> FieldError) -> &mut Self {
        if !ok {
            self.errors.push(error());
        }
        self
    }

    /// The value must contain something other than whitespace.
    pub fn required(&mut self, field: &'static str, value: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), || FieldError::required(field))
    }

    /// The optional value must be present.
    pub fn present<T>(&mut self, field: &'static str, value: Option<&T>) -> &mut Self {
        self.check(value.is_some(), || FieldError::required(field))
    }

    /// Non-empty values must look like an email address.
    pub fn email(&mut self, field: &'static str, value: &str) -> &mut Self {
        self.check(value.is_empty() || is_email(value), || {
            FieldError::new(field, Rule::Email, format!("{field} must be a valid email"))
        })
    }

    /// Non-empty values must be an absolute http or https URL.
    pub fn http_url(&mut self, field: &'static str, value: &str) -> &mut Self {
        self.check(value.is_empty() || is_http_url(value), || {
            FieldError::new(field, Rule::HttpUrl, format!("{field} must be a valid url"))
        })
    }

    /// Non-empty values must be at least `min` characters long.
    pub fn min_length(&mut self, field: &'static str, value: &str, min: usize) -> &mut Self {
        self.check(value.is_empty() || value.chars().count() >= min, || {
            FieldError::new(
                field,
                Rule::MinLength,
                format!("{field} must be at least {min} characters"),
            )
        })
    }

    pub fn positive(&mut self, field: &'static str, value: i64) -> &mut Self {
        self.check(value > 0, || {
            FieldError::new(field, Rule::Positive, format!("{field} must be greater than 0"))
        })
    }

    pub fn non_negative(&mut self, field: &'static str, value: i64) -> &mut Self {
        self.check(value >= 0, || {
            FieldError::new(
                field,
                Rule::NonNegative,
                format!("{field} must be greater than or equal to 0"),
            )
        })
    }

    pub fn finish(&mut self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(std::mem::take(&mut self.errors)))
        }
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.contains(char::is_whitespace)
        && domain
            .split('.')
            .all(|label| !label.is_empty())
        && domain.contains('.')
}

fn is_http_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
        Err(_) => false,
    }
}
