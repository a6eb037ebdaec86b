//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest review accepted, in characters.
pub const MAX_REVIEW_CHARS: usize = 2_000;

/// Tournament statuses known to the calendar backend.
pub const TOURNAMENT_STATUSES: [&str; 4] = ["Scheduled", "Ongoing", "Completed", "Cancelled"];

/// Validates that review text is not blank and fits [`MAX_REVIEW_CHARS`].
///
/// # Examples
///
/// ```ignore
/// validate_review_text("Отличный турнир") // Ok
/// validate_review_text("   ")             // Err - blank
/// ```
pub fn validate_review_text(text: &str) -> Result<(), ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("review_blank");
        err.message = Some("Напишите текст отзыва".into());
        return Err(err);
    }

    let chars = trimmed.chars().count();
    if chars > MAX_REVIEW_CHARS {
        let mut err = ValidationError::new("review_length");
        err.message = Some(
            format!("Review must be at most {MAX_REVIEW_CHARS} characters (got {chars})").into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates a tournament status against [`TOURNAMENT_STATUSES`].
pub fn validate_status(status: &str) -> Result<(), ValidationError> {
    if TOURNAMENT_STATUSES.contains(&status) {
        return Ok(());
    }
    let mut err = ValidationError::new("status_unknown");
    err.message = Some(format!("Unknown tournament status `{status}`").into());
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_review_text_valid() {
        assert!(validate_review_text("Отличный турнир").is_ok());
        assert!(validate_review_text("  padded  ").is_ok());
        assert!(validate_review_text(&"я".repeat(MAX_REVIEW_CHARS)).is_ok());
    }

    #[test]
    fn test_validate_review_text_invalid() {
        assert!(validate_review_text("").is_err());
        assert!(validate_review_text(" \n\t").is_err());
        assert!(validate_review_text(&"я".repeat(MAX_REVIEW_CHARS + 1)).is_err());
    }

    #[test]
    fn test_validate_status() {
        assert!(validate_status("Ongoing").is_ok());
        assert!(validate_status("ongoing").is_err());
        assert!(validate_status("Postponed").is_err());
    }
}
