//! Anchors for blocks and headings.
//!
//! Anchors end up in URL fragments, so they are reduced to lowercase ASCII
//! alphanumerics separated by single dashes:
//!
//! ```text
//! "My Great Photo!"        → "my-great-photo"
//! "media/Sunset 01.jpg"    → "media-sunset-01-jpg"
//! ```

const MAX_SLUG_LEN: usize = 80;

/// Turn arbitrary text into an anchor.
///
/// - Lowercases ASCII letters
/// - Replaces every other non-alphanumeric character with a dash
/// - Collapses consecutive dashes and strips leading/trailing ones
/// - Truncates to `MAX_SLUG_LEN` characters (breaks at last dash before limit)
pub fn slugify(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut prev_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            collapsed.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else {
            if !prev_dash {
                collapsed.push('-');
            }
            prev_dash = true;
        }
    }

    let trimmed = collapsed.trim_matches('-');

    if trimmed.len() <= MAX_SLUG_LEN {
        trimmed.to_string()
    } else {
        let truncated = &trimmed[..MAX_SLUG_LEN];
        match truncated.rfind('-') {
            Some(pos) => truncated[..pos].to_string(),
            None => truncated.to_string(),
        }
    }
}

/// Strip tags from an HTML fragment, keeping only its text.
///
/// Used to slug the inner HTML of links and headings.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
