//! User domain model and field rules.
//!
//! # Responsibility
//! - Define the persisted `User` record and its insert shape.
//! - Own name/email validation and normalization rules.
//!
//! # Invariants
//! - `id` is assigned by storage and never reused.
//! - A stored `name` is trimmed and 3..=50 characters long.
//! - A stored `email` is lowercase and matches [`EMAIL_PATTERN`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-assigned user identifier.
pub type UserId = i64;

/// Minimum name length in characters, measured after trim.
pub const NAME_MIN_CHARS: usize = 3;
/// Maximum name length in characters, measured after trim.
pub const NAME_MAX_CHARS: usize = 50;
/// Accepted email shape.
pub const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(EMAIL_PATTERN).expect("valid email regex"));

/// Persisted user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// `false` once the user has been soft-deleted.
    pub active: bool,
    /// Unix epoch milliseconds, set once at insert.
    pub created_at: i64,
    /// Unix epoch milliseconds of the last write.
    pub updated_at: i64,
}

/// Insert shape for a user that has no identity yet.
///
/// Constructors normalize input but do not validate it; validation belongs
/// to the service layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub active: bool,
}

impl NewUser {
    /// Creates an active user with normalized name and email.
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: normalize_name(name),
            email: normalize_email(email),
            active: true,
        }
    }
}

/// Identity-only projection used by batched lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    NameTooShort { min: usize },
    NameTooLong { max: usize },
    /// Carries the rejected input.
    InvalidEmail(String),
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameTooShort { min } => write!(f, "name must be at least {min} characters"),
            Self::NameTooLong { max } => write!(f, "name must be at most {max} characters"),
            Self::InvalidEmail(value) => write!(f, "invalid email format: {value}"),
        }
    }
}

impl Error for UserValidationError {}

/// Checks name length after trimming surrounding whitespace.
pub fn validate_name(name: &str) -> Result<(), UserValidationError> {
    let length = name.trim().chars().count();
    if length < NAME_MIN_CHARS {
        return Err(UserValidationError::NameTooShort {
            min: NAME_MIN_CHARS,
        });
    }
    if length > NAME_MAX_CHARS {
        return Err(UserValidationError::NameTooLong {
            max: NAME_MAX_CHARS,
        });
    }
    Ok(())
}

/// Checks the raw email input against [`EMAIL_PATTERN`].
pub fn validate_email(email: &str) -> Result<(), UserValidationError> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(UserValidationError::InvalidEmail(email.to_string()))
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_string()
}

pub fn normalize_email(email: &str) -> String {
    email.to_lowercase()
}
