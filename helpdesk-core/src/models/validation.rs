//! Validation error types

use std::fmt;

/// Validation error for domain models
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Field is empty when it shouldn't be
    Empty { field: &'static str },

    /// Field exceeds maximum length
    TooLong { field: &'static str, max: usize },

    /// Field is below minimum length
    TooShort { field: &'static str, min: usize },

    /// String doesn't match required format
    InvalidFormat {
        field: &'static str,
        reason: &'static str,
    },

    /// Invalid enum variant
    InvalidVariant { field: &'static str, value: String },

    /// Request is well-formed but breaks a domain rule
    Rule { message: String },
}

impl ValidationError {
    /// Domain rule violation with a free-form message.
    pub fn rule(message: impl Into<String>) -> Self {
        Self::Rule {
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "{} cannot be empty", field),
            Self::TooLong { field, max } => {
                write!(f, "{} exceeds maximum length of {} characters", field, max)
            }
            Self::TooShort { field, min } => {
                write!(f, "{} must be at least {} characters", field, min)
            }
            Self::InvalidFormat { field, reason } => {
                write!(f, "{}: {}", field, reason)
            }
            Self::InvalidVariant { field, value } => {
                write!(f, "invalid {} value: '{}'", field, value)
            }
            Self::Rule { message } => f.write_str(message),
        }
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidationError::TooLong {
            field: "title",
            max: 200,
        };
        assert_eq!(
            err.to_string(),
            "title exceeds maximum length of 200 characters"
        );

        let err = ValidationError::InvalidVariant {
            field: "priority",
            value: "urgent".into(),
        };
        assert_eq!(err.to_string(), "invalid priority value: 'urgent'");
    }

    #[test]
    fn rule_message_is_verbatim() {
        let err = ValidationError::rule("Passwords don't match");
        assert_eq!(err.to_string(), "Passwords don't match");
    }
}
