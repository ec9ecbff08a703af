//! Abbreviation expansion in rendered paragraphs.
//!
//! `*[HTML]: Hyper Text Markup Language` turns every whole-word `HTML` of the
//! same language into `<abbr title="Hyper Text Markup Language">HTML</abbr>`.
//! Only text between tags is touched, so attribute values and previously
//! inserted `<abbr>` titles are never rewritten.

use super::dom::escape_attr;
use crate::types::Abbreviations;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Wrap every whole-word occurrence of each term in an `<abbr>`.
///
/// Content that is exactly one `<pre>` block is returned unchanged.
pub fn replace_abbreviations(content: &str, abbreviations: &Abbreviations) -> String {
    if abbreviations.is_empty() || is_preformatted(content) {
        return content.to_string();
    }

    let mut out = content.to_string();
    for (term, definition) in abbreviations {
        let Some(pattern) = term_pattern(term) else {
            continue;
        };
        let replacement = |caps: &Captures| {
            format!(r#"<abbr title="{}">{}</abbr>"#, escape_attr(definition), &caps[0])
        };
        out = replace_outside_tags(&out, |text| {
            pattern.replace_all(text, &replacement).into_owned()
        });
    }
    out
}

fn is_preformatted(content: &str) -> bool {
    let trimmed = content.trim();
    trimmed.starts_with("<pre") && trimmed.ends_with("</pre>") && trimmed.matches("<pre").count() == 1
}

/// `\bTERM\b`, leaving out the boundary on a side that is not a word character.
fn term_pattern(term: &str) -> Option<Regex> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let first = term.chars().next()?;
    let last = term.chars().next_back()?;
    let pattern = format!(
        "{}{}{}",
        if is_word(first) { r"\b" } else { "" },
        regex::escape(term),
        if is_word(last) { r"\b" } else { "" },
    );
    match Regex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!(term = %term, error = %e, "Skipping abbreviation");
            None
        }
    }
}

fn replace_outside_tags(html: &str, mut rewrite: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for tag in TAG.find_iter(html) {
        out.push_str(&rewrite(&html[last..tag.start()]));
        out.push_str(tag.as_str());
        last = tag.end();
    }
    out.push_str(&rewrite(&html[last..]));
    out
}
