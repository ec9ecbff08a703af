//! Language sectioning.
//!
//! A body may hold several translations, introduced by marker lines:
//!
//! ```text
//! Shared preamble, present in every language.
//!
//! :: en
//! English text.
//!
//! :: fr
//! Texte en français.
//! ```
//!
//! Marker lines are consumed. Everything before the first marker is the
//! preamble and is prepended to each language.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub(crate) static LANGUAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^::\s+(.+)$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    pub preamble: String,
    /// Language name → that language's own lines (preamble excluded).
    pub languages: BTreeMap<String, String>,
}

impl Sections {
    /// Final text per language: preamble followed by the language's bucket.
    ///
    /// A body without markers yields a single `default_language` entry.
    pub fn texts(&self, default_language: &str) -> BTreeMap<String, String> {
        if self.languages.is_empty() {
            return BTreeMap::from([(default_language.to_string(), self.preamble.clone())]);
        }
        self.languages
            .iter()
            .map(|(language, bucket)| {
                let text = if self.preamble.is_empty() {
                    bucket.clone()
                } else {
                    format!("{}\n{}", self.preamble, bucket)
                };
                (language.clone(), text)
            })
            .collect()
    }
}

pub fn split_on_language_markers(body: &str) -> Sections {
    let mut preamble: Vec<&str> = Vec::new();
    let mut buckets: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in body.lines() {
        if let Some(caps) = LANGUAGE_MARKER.captures(line) {
            let language = caps[1].trim().to_string();
            buckets.entry(language.clone()).or_default();
            current = Some(language);
            continue;
        }
        match &current {
            Some(language) => buckets.entry(language.clone()).or_default().push(line),
            None => preamble.push(line),
        }
    }

    Sections {
        preamble: preamble.join("\n"),
        languages: buckets
            .into_iter()
            .map(|(language, lines)| (language, lines.join("\n")))
            .collect(),
    }
}
