//! Title-to-slug derivation.
//!
//! A slug is the title, trimmed, lowercased, with every space replaced by
//! `-`. Nothing else is rewritten: punctuation and non-ASCII letters pass
//! through lowercased. The function is idempotent, so a slug handed back by
//! a client normalizes to itself.

/// Derive the catalog slug for a task title.
///
/// # Examples
///
/// ```
/// use tally_catalog::slugify;
///
/// assert_eq!(slugify("Follow Us On X"), "follow-us-on-x");
/// assert_eq!(slugify("follow-us-on-x"), "follow-us-on-x");
/// ```
pub fn slugify(title: &str) -> String {
    title.trim().to_lowercase().replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn lowercases_and_hyphenates() {
        assert_eq!(slugify("Join Discord"), "join-discord");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(slugify("  Daily Check In "), "daily-check-in");
    }

    #[test]
    fn consecutive_spaces_each_become_hyphens() {
        assert_eq!(slugify("a  b"), "a--b");
    }

    #[test]
    fn punctuation_is_preserved() {
        assert_eq!(slugify("Retweet #1!"), "retweet-#1!");
    }

    #[test]
    fn blank_title_gives_empty_slug() {
        assert_eq!(slugify("   "), "");
    }

    proptest! {
        #[test]
        fn slugify_is_idempotent(title in "[A-Za-z0-9 #!_-]{0,40}") {
            let once = slugify(&title);
            prop_assert_eq!(slugify(&once), once.clone());
            prop_assert!(!once.contains(' '));
        }
    }
}
