//! Domain ID generation
//!
//! All IDs use the format: `{8-char-hex}-{type}-{slug}`
//! Example: `9f1c02ab-quest-run-5k`

/// Maximum slug length kept in an ID
const MAX_SLUG_LEN: usize = 32;

/// Generate a domain ID from type and title
pub fn generate_id(domain_type: &str, title: &str) -> String {
    let uuid = uuid::Uuid::now_v7().simple().to_string();
    // The tail of a v7 UUID is random; the head is a millisecond timestamp
    let hex_suffix = &uuid[uuid.len() - 8..];
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}-{}", hex_suffix, domain_type)
    } else {
        format!("{}-{}-{}", hex_suffix, domain_type, slug)
    }
}

/// Slugify a title for use in IDs
fn slugify(title: &str) -> String {
    let slug = title
        .to_lowercase()
        .chars()
        // Strip apostrophes entirely, replace other non-alphanumeric with hyphens
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.len() <= MAX_SLUG_LEN {
        return slug;
    }
    slug[..MAX_SLUG_LEN].trim_end_matches('-').to_string()
}
