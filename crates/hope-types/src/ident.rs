//! Identifier helpers shared by the API and the database layer.

/// Length of a canonical id: 32 hex digits plus four hyphens.
const CANONICAL_ID_LEN: usize = 36;
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// A campaign reference from a URL: either the canonical id or a slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignRef<'a> {
    Id(&'a str),
    Slug(&'a str),
}

impl<'a> CampaignRef<'a> {
    /// Values shaped like `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` (hex) are ids,
    /// everything else is treated as a slug.
    pub fn parse(value: &'a str) -> Self {
        if is_canonical_id(value) {
            Self::Id(value)
        } else {
            Self::Slug(value)
        }
    }
}

pub fn is_canonical_id(value: &str) -> bool {
    value.len() == CANONICAL_ID_LEN
        && value.char_indices().all(|(i, c)| {
            if HYPHEN_POSITIONS.contains(&i) {
                c == '-'
            } else {
                c.is_ascii_hexdigit()
            }
        })
}

/// Lowercase ASCII letters and digits joined by single hyphens.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;

    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Slugs accepted from clients: non-empty, lowercase letters, digits and hyphens.
pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('-')
        && !value.ends_with('-')
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_ids_are_recognised() {
        assert!(is_canonical_id("3f2b8c4e-9a7d-4e21-b5c6-0d1e2f3a4b5c"));
        assert!(is_canonical_id("3F2B8C4E-9A7D-4E21-B5C6-0D1E2F3A4B5C"));
    }

    #[test]
    fn near_misses_are_slugs() {
        assert_eq!(CampaignRef::parse("jane-doe"), CampaignRef::Slug("jane-doe"));
        // no hyphens
        assert!(!is_canonical_id("3f2b8c4e9a7d4e21b5c60d1e2f3a4b5c"));
        // right shape, non-hex digit
        assert!(!is_canonical_id("3f2b8c4e-9a7d-4e21-b5c6-0d1e2f3a4b5g"));
        // braced form
        assert!(!is_canonical_id("{3f2b8c4e-9a7d-4e21-b5c6-0d1e2f3a4b5c}"));
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Maria  José O'Neil "), "maria-jos-o-neil");
        assert_eq!(slugify("Team #42!"), "team-42");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("jane-doe-2"));
        assert!(!is_valid_slug("Jane"));
        assert!(!is_valid_slug("-jane"));
        assert!(!is_valid_slug(""));
    }
}
