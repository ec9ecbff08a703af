//! Block classification.
//!
//! Walks the top-level children of a rendered language body and sorts them:
//!
//! ```text
//! h1                       → language title
//! div.footnotes            → footnotes
//! <p><img></p>             → media embed
//! <p><a></a></p>           → link
//! *[TERM]: definition      → abbreviation (not a block)
//! :: lang (leftover)       → dropped
//! p ol ul h2-h6 dl         → paragraph
//! blockquote hr pre table
//! anything else            → ignored
//! ```
//!
//! Every emitted block gets a fresh id and its id is appended to the order.

use super::dom::Element;
use super::language::LANGUAGE_MARKER;
use super::sigils::decode_sigils;
use crate::slug::slugify;
use crate::types::{Abbreviations, Block, Link, MediaEmbedDeclaration, Paragraph, ParsedLanguage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::LazyLock;

const PARAGRAPH_LIKE: &[&str] = &[
    "p",
    "ol",
    "ul",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "dl",
    "blockquote",
    "hr",
    "pre",
    "table",
];

static ABBREVIATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\*\[([^\]]+)\]:\s+(.+)$").unwrap());

const ID_ALPHABET: &[u8] = b"_-0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const ID_LEN: usize = 8;

/// Issues short random block ids, never the same one twice.
///
/// One generator is shared by all languages of a document so ids are unique
/// across the whole work. Seeding from the document text keeps ids stable
/// between builds until the description changes.
pub struct BlockIds {
    rng: StdRng,
    issued: HashSet<String>,
}

impl BlockIds {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            issued: HashSet::new(),
        }
    }

    /// Ids derived from the first 8 bytes of the SHA-256 of `text`.
    pub fn for_text(text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&digest[..8]);
        Self::seeded(u64::from_le_bytes(seed))
    }

    pub fn next_id(&mut self) -> String {
        loop {
            let id: String = (0..ID_LEN)
                .map(|_| ID_ALPHABET[self.rng.gen_range(0..ID_ALPHABET.len())] as char)
                .collect();
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }
}

/// Result of classifying one language body.
#[derive(Debug, Default)]
pub struct Classified {
    pub language: ParsedLanguage,
    pub abbreviations: Abbreviations,
}

pub fn classify(body: &Element, ids: &mut BlockIds) -> Classified {
    let mut out = Classified::default();
    let mut has_title = false;

    for element in body.child_elements() {
        match element.tag.as_str() {
            "h1" => {
                if !has_title {
                    out.language.title = element.inner_html().trim().to_string();
                    has_title = true;
                }
            }
            "div" if element.has_class("footnotes") => {
                out.language.footnotes.extend(extract_footnotes(element));
            }
            tag if PARAGRAPH_LIKE.contains(&tag) => {
                if let Some(block) = classify_block(element, ids, &mut out.abbreviations) {
                    out.language.push(block);
                }
            }
            tag => tracing::debug!(tag, "Ignoring top-level element"),
        }
    }

    out
}

fn classify_block(
    element: &Element,
    ids: &mut BlockIds,
    abbreviations: &mut Abbreviations,
) -> Option<Block> {
    if element.tag == "p" {
        if let Some(image) = element.sole_child("img") {
            let source = image.attr("src").unwrap_or_default().to_string();
            let (alt, attributes) = decode_sigils(image.attr("alt").unwrap_or_default());
            return Some(Block::Media(MediaEmbedDeclaration {
                id: ids.next_id(),
                anchor: slugify(&source),
                alt,
                title: image.attr("title").unwrap_or_default().to_string(),
                source,
                attributes,
            }));
        }
        if let Some(anchor) = element.sole_child("a") {
            return Some(Block::Link(Link {
                id: ids.next_id(),
                anchor: slugify(&anchor.text_content()),
                text: anchor.inner_html(),
                title: anchor.attr("title").unwrap_or_default().to_string(),
                url: anchor.attr("href").unwrap_or_default().to_string(),
            }));
        }
    }

    let text = element.text_content();
    if let Some(definitions) = abbreviation_definitions(&text) {
        abbreviations.extend(definitions);
        return None;
    }
    if LANGUAGE_MARKER.is_match(text.trim()) {
        return None;
    }

    Some(Block::Paragraph(Paragraph {
        id: ids.next_id(),
        anchor: element.attr("id").unwrap_or_default().to_string(),
        content: element.outer_html(),
    }))
}

/// All definitions of a block made only of `*[TERM]: definition` lines.
fn abbreviation_definitions(text: &str) -> Option<Vec<(String, String)>> {
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    if lines.is_empty() {
        return None;
    }
    lines
        .into_iter()
        .map(|line| {
            ABBREVIATION
                .captures(line)
                .map(|caps| (caps[1].trim().to_string(), caps[2].trim().to_string()))
        })
        .collect()
}

fn extract_footnotes(container: &Element) -> Vec<(String, String)> {
    container
        .child_elements()
        .filter(|child| child.tag == "ol")
        .flat_map(|list| list.child_elements())
        .filter_map(|item| {
            let key = item.attr("id")?.strip_prefix("fn:")?;
            Some((key.to_string(), trim_html_whitespace(&item.inner_html())))
        })
        .collect()
}

/// Trim whitespace and leading/trailing line breaks from an HTML fragment.
pub fn trim_html_whitespace(html: &str) -> String {
    const BREAKS: &[&str] = &["<br>", "<br />", "<br/>"];
    let mut trimmed = html.trim();
    loop {
        let before = trimmed;
        for br in BREAKS {
            trimmed = trimmed.strip_prefix(br).unwrap_or(trimmed).trim();
            trimmed = trimmed.strip_suffix(br).unwrap_or(trimmed).trim();
        }
        if trimmed == before {
            return trimmed.to_string();
        }
    }
}
