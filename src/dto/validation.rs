//! Validation helpers for DTOs.

use validator::ValidationError;

const MAX_ID_LENGTH: usize = 64;

/// Validates an opaque identifier (user, room, or question id).
///
/// Ids are embedded verbatim into store-level field paths, so the accepted
/// alphabet excludes path metacharacters such as `.` and `$`.
pub fn validate_opaque_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_ID_LENGTH {
        let mut err = ValidationError::new("id_length");
        err.message = Some(
            format!(
                "identifier must be 1 to {} characters (got {})",
                MAX_ID_LENGTH,
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("id_format");
        err.message =
            Some("identifier may contain only letters, digits, `-`, and `_`".into());
        return Err(err);
    }

    Ok(())
}

/// Validates an answer or guess option value.
///
/// Option strings are matched against the question's option list later; this
/// only rejects values that cannot possibly be an option.
pub fn validate_option_value(option: &str) -> Result<(), ValidationError> {
    if option.trim().is_empty() {
        let mut err = ValidationError::new("option_empty");
        err.message = Some("option must not be empty".into());
        return Err(err);
    }
    if option.len() > 256 {
        let mut err = ValidationError::new("option_length");
        err.message = Some("option must not exceed 256 characters".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_ids() {
        assert!(validate_opaque_id("user-1a2b3c").is_ok());
        assert!(validate_opaque_id("room_42").is_ok());
        assert!(validate_opaque_id("q").is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized_ids() {
        assert!(validate_opaque_id("").is_err());
        assert!(validate_opaque_id(&"x".repeat(65)).is_err());
    }

    #[test]
    fn rejects_path_metacharacters() {
        assert!(validate_opaque_id("user.1").is_err());
        assert!(validate_opaque_id("$where").is_err());
        assert!(validate_opaque_id("user 1").is_err());
    }

    #[test]
    fn option_values_must_be_non_empty() {
        assert!(validate_option_value("Blue").is_ok());
        assert!(validate_option_value("  ").is_err());
        assert!(validate_option_value(&"x".repeat(300)).is_err());
    }
}
