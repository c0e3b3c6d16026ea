use super::ValidationError;
use crate::teams::slugify;

/// Checks a team name and returns it trimmed.
///
/// The name must also yield a non-empty slug, so a name made only of
/// punctuation is rejected.
pub fn validate_team_name(name: &str) -> Result<&str, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::TeamNameEmpty);
    }

    if trimmed.chars().count() > 100 {
        return Err(ValidationError::TeamNameTooLong);
    }

    if slugify(trimmed).is_empty() {
        return Err(ValidationError::TeamNameWithoutSlug);
    }

    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert_eq!(validate_team_name("  Platform Team ").unwrap(), "Platform Team");
        assert!(validate_team_name("Équipe 7").is_ok());
    }

    #[test]
    fn test_name_empty() {
        assert_eq!(
            validate_team_name("   ").unwrap_err(),
            ValidationError::TeamNameEmpty
        );
    }

    #[test]
    fn test_name_too_long() {
        let long_name = "a".repeat(101);
        assert_eq!(
            validate_team_name(&long_name).unwrap_err(),
            ValidationError::TeamNameTooLong
        );
    }

    #[test]
    fn test_name_without_slug() {
        assert_eq!(
            validate_team_name("@#$%").unwrap_err(),
            ValidationError::TeamNameWithoutSlug
        );
    }
}
