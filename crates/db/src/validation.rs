use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Checks a required text field after trimming.
pub fn require_len(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len < min {
        return Err(ValidationError::new(
            field,
            format!("must be at least {min} characters"),
        ));
    }
    if len > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

pub fn optional_max_len(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<(), ValidationError> {
    match value {
        Some(value) if value.chars().count() > max => Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_len_rejects_blank_and_long_values() {
        assert!(require_len("title", "ok", 1, 5).is_ok());
        assert_eq!(require_len("title", "   ", 1, 5).unwrap_err().field, "title");
        assert!(require_len("title", "toolong", 1, 5).is_err());
    }

    #[test]
    fn optional_max_len_counts_chars() {
        assert!(optional_max_len("description", None, 3).is_ok());
        assert!(optional_max_len("description", Some("äöü"), 3).is_ok());
        assert!(optional_max_len("description", Some("abcd"), 3).is_err());
    }
}
