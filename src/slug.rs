//! Anchor slug generation for headings and fragments.

/// Capability for converting heading text into a normalized anchor
/// identifier. Injected at engine construction so alternate anchor
/// algorithms can be substituted without touching the builder.
pub trait Slugifier: Send + Sync {
    /// Convert heading text to its anchor slug. Must be pure and
    /// deterministic: equal inputs always produce equal slugs.
    fn slugify(&self, text: &str) -> String;
}

/// Default slugifier matching the common hosted-renderer behavior:
/// lowercase, strip punctuation except hyphen and underscore, collapse
/// whitespace runs to a single hyphen, trim edge hyphens.
#[derive(Debug, Default)]
pub struct GithubSlugifier;

impl Slugifier for GithubSlugifier {
    fn slugify(&self, text: &str) -> String {
        let lowered = text.trim().to_lowercase();
        let mut slug = String::with_capacity(lowered.len());
        let mut pending_hyphen = false;

        for c in lowered.chars() {
            if c.is_whitespace() {
                pending_hyphen = !slug.is_empty();
                continue;
            }
            if c.is_alphanumeric() || c == '-' || c == '_' {
                if pending_hyphen {
                    slug.push('-');
                    pending_hyphen = false;
                }
                slug.push(c);
            }
        }

        return slug.trim_matches('-').to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::{GithubSlugifier, Slugifier};

    fn slugify(text: &str) -> String {
        return GithubSlugifier.slugify(text);
    }

    #[test]
    fn simple_heading() {
        assert_eq!(slugify("Architecture"), "architecture");
    }

    #[test]
    fn multi_word() {
        assert_eq!(slugify("Getting Started"), "getting-started");
    }

    #[test]
    fn punctuation_is_stripped() {
        assert_eq!(slugify("What's New?"), "whats-new");
    }

    #[test]
    fn hyphen_and_underscore_survive() {
        assert_eq!(slugify("re-entry _and_ exit"), "re-entry-_and_-exit");
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(slugify("  Hello   World  "), "hello-world");
    }

    #[test]
    fn mixed_case_inputs_agree() {
        assert_eq!(slugify("A b C"), slugify("a B c"));
    }

    #[test]
    fn empty_string() {
        assert_eq!(slugify(""), "");
    }
}
