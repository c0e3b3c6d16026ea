use std::sync::LazyLock;

use regex::Regex;

/// Maximum slug length in characters.
pub const MAX_SLUG_LENGTH: usize = 50;

#[allow(clippy::unwrap_used)]
static NON_SLUG_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Derives the URL-safe slug for a team name.
///
/// Lowercases, collapses every run of characters outside `[a-z0-9]` into one
/// hyphen, trims hyphens at both ends, and truncates to
/// [`MAX_SLUG_LENGTH`]. A hyphen left dangling by the truncation is dropped.
pub fn slugify(name: &str) -> String {
    let lowered = name.to_lowercase();
    let collapsed = NON_SLUG_RUN.replace_all(&lowered, "-");
    let trimmed = collapsed.trim_matches('-');

    // only ascii survives the collapse, so byte length is char length
    let truncated = if trimmed.len() > MAX_SLUG_LENGTH {
        &trimmed[..MAX_SLUG_LENGTH]
    } else {
        trimmed
    };

    truncated.trim_end_matches('-').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_examples() {
        assert_eq!(slugify("My Team"), "my-team");
        assert_eq!(slugify("Test Team 123"), "test-team-123");
        assert_eq!(slugify("  Spaces  "), "spaces");
        assert_eq!(slugify("Special@#$Characters"), "special-characters");
    }

    #[test]
    fn test_slugify_truncates() {
        let name = "abcdefghij".repeat(6);
        assert_eq!(name.len(), 60);
        let slug = slugify(&name);
        assert_eq!(slug.len(), MAX_SLUG_LENGTH);
    }

    #[test]
    fn test_slugify_truncation_does_not_end_with_hyphen() {
        // 49 letters, a space, then more letters: the cut lands on the hyphen
        let name = format!("{} tail", "a".repeat(49));
        let slug = slugify(&name);
        assert_eq!(slug, "a".repeat(49));
        assert!(slug.len() <= MAX_SLUG_LENGTH);
    }

    #[test]
    fn test_slugify_non_ascii() {
        assert_eq!(slugify("Café Crew"), "caf-crew");
        assert_eq!(slugify("---"), "");
    }
}
