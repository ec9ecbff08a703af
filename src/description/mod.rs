//! Description document parsing.
//!
//! Turns one `description.md` into a [`ParsedWork`]:
//!
//! ```text
//! raw text
//!   │ header::split_header          YAML header → WorkMetadata
//!   ▼
//! body
//!   │ language::split_on_language_markers
//!   ▼
//! per-language text (preamble + bucket)
//!   │ markup::render                normalize, markdown → dom::Element
//!   ▼
//! body element
//!   │ blocks::classify              paragraphs / media / links, title, footnotes
//!   │ abbreviations::replace_abbreviations
//!   ▼
//! ParsedLanguage
//! ```
//!
//! Parsing touches no filesystem; media sources are kept verbatim until the
//! build analyzes them.

pub mod abbreviations;
pub mod blocks;
pub mod dom;
pub mod header;
pub mod language;
pub mod markup;
pub mod sigils;

use crate::types::{ParsedLanguage, ParsedWork};
use blocks::BlockIds;

/// Parse a complete description document.
///
/// `default_language` names the single language of a document without
/// `:: lang` markers. Block ids are derived from `raw`, so parsing the same
/// text twice yields the same ids.
pub fn parse_description(raw: &str, default_language: &str) -> ParsedWork {
    parse_description_with_ids(raw, default_language, &mut BlockIds::for_text(raw))
}

pub fn parse_description_with_ids(
    raw: &str,
    default_language: &str,
    ids: &mut BlockIds,
) -> ParsedWork {
    let document = header::split_header(raw);
    let sections = language::split_on_language_markers(&document.body);
    let languages = sections
        .texts(default_language)
        .into_iter()
        .map(|(language, text)| {
            let parsed = parse_language(&text, ids);
            (language, parsed)
        })
        .collect();

    ParsedWork {
        metadata: document.metadata,
        languages,
    }
}

/// Parse the markup of a single language.
pub fn parse_language(text: &str, ids: &mut BlockIds) -> ParsedLanguage {
    let body = markup::render(text);
    let blocks::Classified {
        mut language,
        abbreviations,
    } = blocks::classify(&body, ids);

    for paragraph in &mut language.paragraphs {
        paragraph.content = abbreviations::replace_abbreviations(&paragraph.content, &abbreviations);
    }
    language
}
