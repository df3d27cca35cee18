//! Comment content validation

use super::ValidationError;

/// Maximum comment length (64KB, same ceiling as message bodies elsewhere)
const MAX_COMMENT_LEN: usize = 65536;

/// Validated comment body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentContent(String);

impl CommentContent {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.trim().is_empty() {
            return Err(ValidationError::Empty { field: "content" });
        }
        if s.len() > MAX_COMMENT_LEN {
            return Err(ValidationError::TooLong {
                field: "content",
                max: MAX_COMMENT_LEN,
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank() {
        assert!(matches!(
            CommentContent::new("  "),
            Err(ValidationError::Empty { field: "content" })
        ));
    }

    #[test]
    fn max_length() {
        assert!(CommentContent::new(&"a".repeat(MAX_COMMENT_LEN)).is_ok());
        assert!(CommentContent::new(&"a".repeat(MAX_COMMENT_LEN + 1)).is_err());
    }
}
