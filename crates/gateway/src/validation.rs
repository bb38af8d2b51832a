//! Request body validation with per-field error collection

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use kinnect_database::is_valid_id;

use crate::error::{ApiError, ApiResult, FieldError};

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{3,30}$").expect("valid username regex"));

static HAS_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]").expect("valid regex"));
static HAS_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]").expect("valid regex"));

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_NAME_LENGTH: usize = 50;
pub const MAX_FAMILY_NAME_LENGTH: usize = 100;
pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_POST_LENGTH: usize = 5000;
pub const MAX_COMMENT_LENGTH: usize = 2000;

/// Collects field failures; `finish` turns them into a 400.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors.push(FieldError::new(field, message));
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !EMAIL_REGEX.is_match(value.trim()) {
            self.error(field, "Please provide a valid email");
        }
        self
    }

    pub fn password(&mut self, field: &str, value: &str) -> &mut Self {
        if value.chars().count() < MIN_PASSWORD_LENGTH {
            self.error(
                field,
                format!("Password must be at least {MIN_PASSWORD_LENGTH} characters long"),
            );
        } else if !HAS_LETTER.is_match(value) || !HAS_DIGIT.is_match(value) {
            self.error(field, "Password must contain at least one letter and one number");
        }
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.error(field, format!("{field} is required"));
        }
        self
    }

    /// Trimmed length between `min` and `max` characters.
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.trim().chars().count();
        if len < min || len > max {
            self.error(field, format!("{field} must be between {min} and {max} characters"));
        }
        self
    }

    pub fn optional_length(&mut self, field: &str, value: Option<&str>, min: usize, max: usize) -> &mut Self {
        if let Some(value) = value {
            self.length(field, value, min, max);
        }
        self
    }

    pub fn max_length(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if value.is_some_and(|v| v.chars().count() > max) {
            self.error(field, format!("{field} must be at most {max} characters"));
        }
        self
    }

    pub fn username(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if value.is_some_and(|v| !USERNAME_REGEX.is_match(v.trim())) {
            self.error(
                field,
                "Username must be 3-30 characters of letters, numbers or underscores",
            );
        }
        self
    }

    pub fn timestamp(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if value.is_some_and(|v| DateTime::parse_from_rfc3339(v.trim()).is_err()) {
            self.error(field, format!("{field} must be an RFC 3339 date-time"));
        }
        self
    }

    pub fn date(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        let valid = |v: &str| {
            NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").is_ok()
                || DateTime::parse_from_rfc3339(v.trim()).is_ok()
        };
        if value.is_some_and(|v| !valid(v)) {
            self.error(field, format!("{field} must be a valid date"));
        }
        self
    }

    pub fn id(&mut self, field: &str, value: &str) -> &mut Self {
        if !is_valid_id(value.trim()) {
            self.error(field, "Invalid ID format");
        }
        self
    }

    pub fn ids(&mut self, field: &str, values: &[String]) -> &mut Self {
        if values.iter().any(|v| !is_valid_id(v.trim())) {
            self.error(field, "Invalid ID format");
        }
        self
    }

    pub fn finish(&mut self) -> ApiResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation(std::mem::take(&mut self.errors)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(result: ApiResult<()>) -> Vec<String> {
        result
            .unwrap_err()
            .errors
            .into_iter()
            .map(|e| e.field)
            .collect()
    }

    #[test]
    fn registration_rules_collect_every_failure() {
        let result = Validator::new()
            .email("email", "not-an-email")
            .password("password", "short")
            .length("firstName", "  ", 1, MAX_NAME_LENGTH)
            .username("username", Some("no spaces allowed"))
            .finish();
        assert_eq!(fields(result), ["email", "password", "firstName", "username"]);
    }

    #[test]
    fn passwords_need_letters_and_digits() {
        assert!(Validator::new().password("p", "abcdefgh").finish().is_err());
        assert!(Validator::new().password("p", "12345678").finish().is_err());
        assert!(Validator::new().password("p", "abcd1234").finish().is_ok());
    }

    #[test]
    fn timestamps_must_be_rfc3339() {
        assert!(Validator::new()
            .timestamp("startTime", Some("2030-05-01T10:00:00Z"))
            .finish()
            .is_ok());
        assert!(Validator::new()
            .timestamp("startTime", Some("next tuesday"))
            .finish()
            .is_err());
        assert!(Validator::new().timestamp("endTime", None).finish().is_ok());
    }

    #[test]
    fn dates_accept_plain_calendar_days() {
        assert!(Validator::new().date("dateOfBirth", Some("1990-02-28")).finish().is_ok());
        assert!(Validator::new().date("dateOfBirth", Some("1990-02-30")).finish().is_err());
    }

    #[test]
    fn valid_input_passes() {
        let result = Validator::new()
            .email("email", "ada@example.com")
            .password("password", "lovelace1815")
            .username("username", Some("ada_l"))
            .finish();
        assert!(result.is_ok());
    }
}
