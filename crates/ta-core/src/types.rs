//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A numeric field that must be positive was not.
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: i64 },

    /// A job code string did not match the `"123 - Description"` format.
    #[error("invalid job code: {value}")]
    InvalidJobCode { value: String },
}

/// Errors returned by a backing store.
///
/// Services log the detail and surface only generic failures to callers, so
/// infrastructure specifics never leak into business results.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store rejected the atomic open-session claim: an open session
    /// already exists for the employee.
    #[error("an open session already exists for this employee")]
    OpenSessionExists,

    /// The requested record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The store could not service the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A validated employee number.
///
/// Employee numbers are positive integers. Construction is the single
/// validation point; once you hold an `EmployeeNumber` it is known good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct EmployeeNumber(i64);

impl EmployeeNumber {
    /// Creates a new employee number after validation.
    pub const fn new(value: i64) -> Result<Self, TypeError> {
        if value <= 0 {
            return Err(TypeError::NonPositive {
                field: "employee number",
                value,
            });
        }
        Ok(Self(value))
    }

    /// Returns the inner value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for EmployeeNumber {
    type Error = TypeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EmployeeNumber> for i64 {
    fn from(emp: EmployeeNumber) -> Self {
        emp.0
    }
}

impl fmt::Display for EmployeeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated session identifier.
///
/// Session IDs must be non-empty strings. They are assigned by the store on
/// creation; split segments derive ids from their parent session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new ID after validation.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::Empty {
                field: "session ID",
            });
        }
        Ok(Self(id))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the id for split segment `index` (1-based).
    #[must_use]
    pub fn split_segment(&self, index: usize) -> Self {
        Self(format!("{}_split_{index}", self.0))
    }
}

impl TryFrom<String> for SessionId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A job code: operation number plus human description.
///
/// The wire format is `"123 - Description"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCode {
    pub number: u32,
    pub description: String,
}

impl JobCode {
    /// Creates a job code after validating the operation number.
    pub fn new(number: u32, description: impl Into<String>) -> Result<Self, TypeError> {
        if number == 0 {
            return Err(TypeError::NonPositive {
                field: "job code",
                value: 0,
            });
        }
        Ok(Self {
            number,
            description: description.into(),
        })
    }
}

impl fmt::Display for JobCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.number, self.description)
    }
}

impl std::str::FromStr for JobCode {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidJobCode {
            value: s.to_string(),
        };
        let (number, description) = s.split_once(" - ").ok_or_else(invalid)?;
        let number: u32 = number.trim().parse().map_err(|_| invalid())?;
        if number == 0 {
            return Err(invalid());
        }
        Ok(Self {
            number,
            description: description.to_string(),
        })
    }
}

/// Who performed a mutation, recorded on every audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub role: String,
}

impl Actor {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.role)
    }
}

/// Outcome of a validation pass: a value, never an error type.
///
/// Errors block the operation; warnings ride along on otherwise successful
/// results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for ValidationOutcome {
    fn default() -> Self {
        Self::valid()
    }
}

impl ValidationOutcome {
    /// A passing outcome with no messages.
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A failing outcome with a single error.
    #[must_use]
    pub fn invalid(error: impl Into<String>) -> Self {
        let mut outcome = Self::valid();
        outcome.push_error(error);
        outcome
    }

    /// Records an error and marks the outcome invalid.
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.is_valid = false;
    }

    /// Records a non-blocking warning.
    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Folds another outcome into this one.
    pub fn merge(&mut self, other: Self) {
        self.is_valid = self.is_valid && other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}
