//! Input validation for identity and knowledge-base fields.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};

/// Validation error types. Every variant names the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid email format.
    InvalidEmail(String),
    /// Value too long.
    TooLong { field: String, max: usize, actual: usize },
    /// Empty value where one is required.
    Empty(String),
    /// Value outside its allowed range or shape.
    Invalid { field: String, message: String },
    /// Value not among the allowed choices.
    InvalidChoice {
        field: String,
        value: String,
        allowed: &'static [&'static str],
    },
    /// Two values that must agree do not.
    Mismatch(String),
    /// Password rejected by the strength policy.
    WeakPassword { field: String, issues: Vec<String> },
    /// A value that must be unique is already taken.
    Duplicate { field: String, message: String },
    /// Unknown email or wrong password at login.
    InvalidCredentials,
    /// The account has been disabled.
    InactiveAccount,
    /// The current password given for a change did not verify.
    IncorrectPassword,
}

impl ValidationError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_choice(field: &str, value: &str, allowed: &'static [&'static str]) -> Self {
        ValidationError::InvalidChoice {
            field: field.to_string(),
            value: value.to_string(),
            allowed,
        }
    }

    /// The field this error refers to, if it is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::InvalidEmail(_) => Some("email"),
            ValidationError::TooLong { field, .. }
            | ValidationError::Empty(field)
            | ValidationError::Invalid { field, .. }
            | ValidationError::InvalidChoice { field, .. }
            | ValidationError::Mismatch(field)
            | ValidationError::WeakPassword { field, .. }
            | ValidationError::Duplicate { field, .. } => Some(field),
            ValidationError::IncorrectPassword => Some("old_password"),
            ValidationError::InvalidCredentials | ValidationError::InactiveAccount => None,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidEmail(msg) => write!(f, "Invalid email: {}", msg),
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
            ValidationError::Invalid { field, message } => write!(f, "{}: {}", field, message),
            ValidationError::InvalidChoice {
                field,
                value,
                allowed,
            } => write!(
                f,
                "{}: '{}' is not one of {}",
                field,
                value,
                allowed.join(", ")
            ),
            ValidationError::Mismatch(field) => write!(f, "{} does not match", field),
            ValidationError::WeakPassword { issues, .. } => {
                write!(f, "Password too weak: {}", issues.join("; "))
            }
            ValidationError::Duplicate { message, .. } => f.write_str(message),
            ValidationError::InvalidCredentials => f.write_str("Incorrect email or password"),
            ValidationError::InactiveAccount => f.write_str("Account is disabled"),
            ValidationError::IncorrectPassword => f.write_str("Current password is incorrect"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum allowed length for email addresses.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum allowed length for knowledge base and team names.
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum allowed length for tag names.
pub const MAX_TAG_NAME_LENGTH: usize = 50;

/// Maximum allowed length for icon references.
pub const MAX_ICON_LENGTH: usize = 200;

/// Maximum allowed length for tag colors.
pub const MAX_COLOR_LENGTH: usize = 20;

/// Maximum allowed length for phone numbers.
pub const MAX_PHONE_LENGTH: usize = 20;

/// Maximum allowed length for an index schedule.
pub const MAX_SCHEDULE_LENGTH: usize = 50;

/// Maximum allowed length for a rerank model name.
pub const MAX_MODEL_LENGTH: usize = 100;

/// Validate an email address (basic RFC 5322 format check).
///
/// This is a basic validation that checks:
/// - Contains exactly one @
/// - Has at least one character before @
/// - Has at least one character after @
/// - Has at least one dot after @
/// - Is not too long
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Empty("email".to_string()));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: MAX_EMAIL_LENGTH,
            actual: email.len(),
        });
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ValidationError::InvalidEmail(
            "must contain exactly one @ symbol".to_string(),
        ));
    }

    let (local, domain) = (parts[0], parts[1]);

    if local.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "missing local part (before @)".to_string(),
        ));
    }

    if domain.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "missing domain (after @)".to_string(),
        ));
    }

    if !domain.contains('.') {
        return Err(ValidationError::InvalidEmail(
            "domain must contain at least one dot".to_string(),
        ));
    }

    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(ValidationError::InvalidEmail(
            "domain cannot start or end with a dot".to_string(),
        ));
    }

    if domain.contains("..") {
        return Err(ValidationError::InvalidEmail(
            "domain cannot contain consecutive dots".to_string(),
        ));
    }

    Ok(())
}

/// Trim and lowercase an email for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Require a non-empty value no longer than `max`. Returns the trimmed value.
pub fn validate_required<'a>(
    field: &str,
    value: &'a str,
    max: usize,
) -> Result<&'a str, ValidationError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Empty(field.to_string()));
    }

    validate_length(field, value, max)?;
    Ok(value)
}

/// Reject values longer than `max` characters.
pub fn validate_length(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
            actual,
        });
    }
    Ok(())
}

/// Require two password entries to agree.
pub fn validate_passwords_match(
    field: &str,
    password: &str,
    confirm: &str,
) -> Result<(), ValidationError> {
    if password != confirm {
        return Err(ValidationError::Mismatch(field.to_string()));
    }
    Ok(())
}

const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "12345678",
    "123456789",
    "qwerty123",
    "qwertyuiop",
    "iloveyou",
    "letmein1",
    "admin123",
    "welcome1",
    "abc12345",
    "11111111",
    "sunshine",
    "princess",
    "football",
];

/// Configurable password strength rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
        }
    }
}

impl PasswordPolicy {
    /// Check a candidate password. `email` feeds the similarity rule.
    pub fn check(&self, field: &str, password: &str, email: &str) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let length = password.chars().count();

        if length < self.min_length {
            issues.push(format!(
                "must be at least {} characters (currently {})",
                self.min_length, length
            ));
        }

        if length > self.max_length {
            issues.push(format!("must be at most {} characters", self.max_length));
        }

        if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            issues.push("cannot be entirely numeric".to_string());
        }

        let lowered = password.to_lowercase();
        if COMMON_PASSWORDS.contains(&lowered.as_str()) {
            issues.push("is too common".to_string());
        }

        let local = normalize_email(email);
        let local = local.split('@').next().unwrap_or_default();
        if local.len() >= 3 && lowered.contains(local) {
            issues.push("is too similar to the email address".to_string());
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::WeakPassword {
                field: field.to_string(),
                issues,
            })
        }
    }
}

/// Validate a display color: a CSS name such as `blue` or a hex value such
/// as `#1890ff`. Hex values must have 3, 6 or 8 digits.
pub fn validate_color(color: &str) -> Result<(), ValidationError> {
    let color = validate_required("color", color, MAX_COLOR_LENGTH)?;

    let Some(hex) = color.strip_prefix('#') else {
        return Ok(());
    };
    if !matches!(hex.len(), 3 | 6 | 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::invalid(
            "color",
            "must be 3, 6 or 8 hexadecimal digits",
        ));
    }

    Ok(())
}

/// Retrieval parameters of a knowledge base, checked together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkingConfig {
    pub chunk_size: i64,
    pub chunk_overlap: i64,
    pub similarity_threshold: f64,
    pub top_k: i64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            similarity_threshold: 0.7,
            top_k: 5,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=100_000).contains(&self.chunk_size) {
            return Err(ValidationError::invalid(
                "chunk_size",
                "must be between 1 and 100000",
            ));
        }

        if self.chunk_overlap < 0 || self.chunk_overlap >= self.chunk_size {
            return Err(ValidationError::invalid(
                "chunk_overlap",
                "must be non-negative and smaller than chunk_size",
            ));
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ValidationError::invalid(
                "similarity_threshold",
                "must be between 0 and 1",
            ));
        }

        if !(1..=100).contains(&self.top_k) {
            return Err(ValidationError::invalid("top_k", "must be between 1 and 100"));
        }

        Ok(())
    }
}

/// Validate a five-field cron expression (minute hour day month weekday).
pub fn validate_index_schedule(schedule: &str) -> Result<(), ValidationError> {
    validate_length("index_schedule", schedule, MAX_SCHEDULE_LENGTH)?;

    let fields: Vec<&str> = schedule.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(ValidationError::invalid(
            "index_schedule",
            "must have five space-separated fields",
        ));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '*' | '/' | ',' | '-');
    if fields.iter().any(|f| !f.chars().all(allowed)) {
        return Err(ValidationError::invalid(
            "index_schedule",
            "contains characters not valid in a cron field",
        ));
    }

    Ok(())
}

/// Parse an RFC 3339 timestamp (or SQLite's own format) into the stored form.
pub fn normalize_timestamp(field: &str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();

    let parsed = DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc).naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| ValidationError::invalid(field, "must be an RFC 3339 timestamp"))?;

    Ok(parsed.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// The share permissions payload must be a JSON object.
pub fn validate_permissions_payload(value: &serde_json::Value) -> Result<(), ValidationError> {
    if !value.is_object() {
        return Err(ValidationError::invalid(
            "permissions",
            "must be a JSON object",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email_valid() {
        assert!(validate_email("test@example.com").is_ok());
        assert!(validate_email("user.name@domain.co.uk").is_ok());
        assert!(validate_email("a@b.c").is_ok());
        assert!(validate_email(" test@example.com ").is_ok()); // trimmed
    }

    #[test]
    fn test_validate_email_invalid() {
        assert!(matches!(validate_email(""), Err(ValidationError::Empty(_))));

        assert!(matches!(
            validate_email("test.example.com"),
            Err(ValidationError::InvalidEmail(_))
        ));

        assert!(matches!(
            validate_email("test@example@com"),
            Err(ValidationError::InvalidEmail(_))
        ));

        assert!(matches!(
            validate_email("@example.com"),
            Err(ValidationError::InvalidEmail(_))
        ));

        assert!(matches!(
            validate_email("test@localhost"),
            Err(ValidationError::InvalidEmail(_))
        ));

        assert!(matches!(
            validate_email("test@example..com"),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn test_password_policy() {
        let policy = PasswordPolicy::default();

        assert!(policy.check("password", "correct-horse-battery", "alice@example.com").is_ok());

        let err = policy.check("password", "short", "alice@example.com").unwrap_err();
        assert_eq!(err.field(), Some("password"));

        assert!(matches!(
            policy.check("password", "1234567890", "alice@example.com"),
            Err(ValidationError::WeakPassword { .. })
        ));
        assert!(matches!(
            policy.check("password", "Password123", "alice@example.com"),
            Err(ValidationError::WeakPassword { .. })
        ));
        assert!(matches!(
            policy.check("new_password", "xx-alice-2024", "alice@example.com"),
            Err(ValidationError::WeakPassword { .. })
        ));
    }

    #[test]
    fn test_password_policy_custom_length() {
        let policy = PasswordPolicy {
            min_length: 12,
            max_length: 16,
        };
        assert!(policy.check("password", "tangerine-sky", "a@b.c").is_ok());
        assert!(policy.check("password", "tangerine", "a@b.c").is_err());
        assert!(policy.check("password", "tangerine-sky-at-dusk", "a@b.c").is_err());
    }

    #[test]
    fn test_validate_color() {
        assert!(validate_color("#1890ff").is_ok());
        assert!(validate_color("#fff").is_ok());
        assert!(validate_color("blue").is_ok());
        assert!(validate_color("").is_err());
        assert!(validate_color(&"a".repeat(21)).is_err());
        assert!(validate_color("#12345").is_err());
        assert!(validate_color("#zzzzzz").is_err());
    }

    #[test]
    fn test_chunking_config() {
        assert!(ChunkingConfig::default().validate().is_ok());

        let overlap_too_big = ChunkingConfig {
            chunk_overlap: 1000,
            ..ChunkingConfig::default()
        };
        assert_eq!(
            overlap_too_big.validate().unwrap_err().field(),
            Some("chunk_overlap")
        );

        let bad_threshold = ChunkingConfig {
            similarity_threshold: 1.5,
            ..ChunkingConfig::default()
        };
        assert_eq!(
            bad_threshold.validate().unwrap_err().field(),
            Some("similarity_threshold")
        );
    }

    #[test]
    fn test_index_schedule() {
        assert!(validate_index_schedule("0 3 * * *").is_ok());
        assert!(validate_index_schedule("*/15 * * * mon-fri").is_ok());
        assert!(validate_index_schedule("0 3 * *").is_err());
        assert!(validate_index_schedule("0 3 * * ; rm").is_err());
    }

    #[test]
    fn test_normalize_timestamp() {
        assert_eq!(
            normalize_timestamp("expires_at", "2030-01-02T03:04:05Z").unwrap(),
            "2030-01-02 03:04:05"
        );
        assert_eq!(
            normalize_timestamp("expires_at", "2030-01-02T05:04:05+02:00").unwrap(),
            "2030-01-02 03:04:05"
        );
        assert!(normalize_timestamp("expires_at", "next tuesday").is_err());
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InvalidEmail("test message".to_string());
        assert_eq!(err.to_string(), "Invalid email: test message");

        let err = ValidationError::TooLong {
            field: "name".to_string(),
            max: 100,
            actual: 120,
        };
        assert_eq!(err.to_string(), "name is too long (120 chars, max 100)");
    }
}
