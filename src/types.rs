//! Shared types of the content model.
//!
//! Two families live here:
//!
//! - **Parse-time** types ([`ParsedWork`], [`ParsedLanguage`], [`Block`],
//!   [`MediaEmbedDeclaration`]) carry only what the description file says.
//!   No filesystem access has happened yet.
//! - **Database** types ([`AnalyzedWork`], [`ContentBlock`], [`Media`]) are
//!   what ends up in the JSON output, with media facts resolved.
//!
//! Everything serializes with snake_case field names; the rendering layer
//! depends on these names, so renaming a field is a breaking change.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Footnote key → rendered footnote body (HTML).
pub type Footnotes = BTreeMap<String, String>;

/// Abbreviation term → its definition. Consumed by the post-processor only.
pub type Abbreviations = BTreeMap<String, String>;

/// The complete output database: work id → analyzed work.
///
/// A `BTreeMap` keeps the serialized output in a canonical order.
pub type Database = BTreeMap<String, AnalyzedWork>;

// ============================================================================
// Metadata
// ============================================================================

/// Structured header of a description file.
///
/// Keys the schema does not know about are kept in `additional_metadata`
/// and flattened back next to the known keys on output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkMetadata {
    #[serde(deserialize_with = "lenient_list")]
    pub aliases: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub started: String,
    #[serde(deserialize_with = "lenient_string")]
    pub finished: String,
    #[serde(deserialize_with = "lenient_list")]
    pub made_with: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub thumbnail: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title_style: String,
    pub colors: ColorPalette,
    #[serde(deserialize_with = "lenient_string")]
    pub page_background: String,
    pub wip: bool,
    pub private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutSpec>,
    #[serde(flatten)]
    pub additional_metadata: BTreeMap<String, serde_json::Value>,
}

/// Accept numbers and booleans where a string is expected.
///
/// Authors write `started: 2021` and YAML hands us an integer.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Accept a single value where a list is expected (`tags: web`).
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let scalar = |value: serde_json::Value| -> Result<String, D::Error> {
        match value {
            serde_json::Value::String(s) => Ok(s),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            serde_json::Value::Bool(b) => Ok(b.to_string()),
            other => Err(serde::de::Error::custom(format!("expected a string, found {other}"))),
        }
    };
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(items) => items.into_iter().map(scalar).collect(),
        other => Ok(vec![scalar(other)?]),
    }
}

/// Up to three dominant colors, as `#rrggbb` strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorPalette {
    pub primary: String,
    pub secondary: String,
    pub tertiary: String,
}

impl ColorPalette {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty() && self.tertiary.is_empty()
    }
}

/// Author-declared layout, as written in the header.
///
/// ```yaml
/// layout:
///   - p1
///   - [m1, m2]
///   - [l1, .]
/// ```
pub type LayoutSpec = Vec<LayoutSpecRow>;

/// One declared row: either a single cell or a list of cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutSpecRow {
    Single(Option<String>),
    Cells(Vec<Option<String>>),
}

impl LayoutSpecRow {
    pub fn cells(&self) -> Vec<Option<&str>> {
        match self {
            Self::Single(cell) => vec![cell.as_deref()],
            Self::Cells(cells) => cells.iter().map(Option::as_deref).collect(),
        }
    }
}

// ============================================================================
// Parse-time blocks
// ============================================================================

/// A paragraph-like block: anything that is not a lone media embed or link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub id: String,
    pub anchor: String,
    /// Rendered HTML, including the outer element.
    pub content: String,
}

/// An isolated link, alone in its paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub anchor: String,
    /// Inner HTML of the anchor element.
    pub text: String,
    pub title: String,
    pub url: String,
}

/// Playback and display attributes toggled by alt-text sigils.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttributes {
    #[serde(rename = "loop")]
    pub looped: bool,
    pub autoplay: bool,
    pub muted: bool,
    pub playsinline: bool,
    pub controls: bool,
}

impl Default for MediaAttributes {
    fn default() -> Self {
        Self {
            looped: false,
            autoplay: false,
            muted: false,
            playsinline: false,
            controls: true,
        }
    }
}

/// A media embed as declared in the description (`![alt](src "title")`).
///
/// No filesystem interaction has happened yet: `source` is verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEmbedDeclaration {
    pub id: String,
    pub anchor: String,
    pub alt: String,
    pub title: String,
    pub source: String,
    pub attributes: MediaAttributes,
}

/// A classified block before media analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph(Paragraph),
    Media(MediaEmbedDeclaration),
    Link(Link),
}

impl Block {
    pub fn id(&self) -> &str {
        match self {
            Self::Paragraph(p) => &p.id,
            Self::Media(m) => &m.id,
            Self::Link(l) => &l.id,
        }
    }
}

/// Everything parsed for one language of a description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLanguage {
    /// Inner HTML of the first top-level `h1`.
    pub title: String,
    pub paragraphs: Vec<Paragraph>,
    pub media: Vec<MediaEmbedDeclaration>,
    pub links: Vec<Link>,
    pub footnotes: Footnotes,
    /// Block ids of all three kinds, in document order.
    pub order: Vec<String>,
}

impl ParsedLanguage {
    /// Look up a block of any kind by id.
    pub fn block(&self, id: &str) -> Option<Block> {
        if let Some(p) = self.paragraphs.iter().find(|p| p.id == id) {
            return Some(Block::Paragraph(p.clone()));
        }
        if let Some(m) = self.media.iter().find(|m| m.id == id) {
            return Some(Block::Media(m.clone()));
        }
        self.links
            .iter()
            .find(|l| l.id == id)
            .map(|l| Block::Link(l.clone()))
    }

    pub fn push(&mut self, block: Block) {
        self.order.push(block.id().to_string());
        match block {
            Block::Paragraph(p) => self.paragraphs.push(p),
            Block::Media(m) => self.media.push(m),
            Block::Link(l) => self.links.push(l),
        }
    }
}

/// A work as read from its description, before media analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedWork {
    pub metadata: WorkMetadata,
    pub languages: BTreeMap<String, ParsedLanguage>,
}

// ============================================================================
// Database types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        let aspect_ratio = if height == 0 {
            0.0
        } else {
            width as f32 / height as f32
        };
        Self {
            width,
            height,
            aspect_ratio,
        }
    }
}

/// A media embed with its analyzed file facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: String,
    pub anchor: String,
    pub alt: String,
    pub title: String,
    /// Verbatim from the embed declaration.
    pub source: String,
    /// Path relative to the work's folder (includes the scattered-mode folder).
    #[serde(default)]
    pub relative_source: String,
    /// Path of the copy inside the media output directory.
    #[serde(default)]
    pub dist_source: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    /// Seconds, for audio and video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub has_sound: bool,
    #[serde(default)]
    pub colors: ColorPalette,
    pub attributes: MediaAttributes,
    /// SHA-256 of the source file; empty for online media.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

/// One block of the final, ordered content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Paragraph(Paragraph),
    Media(Media),
    Link(Link),
}

impl ContentBlock {
    pub fn id(&self) -> &str {
        match self {
            Self::Paragraph(p) => &p.id,
            Self::Media(m) => &m.id,
            Self::Link(l) => &l.id,
        }
    }
}

/// A cell of the presentation grid: a block id, or empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutCell(Option<String>);

impl LayoutCell {
    pub fn block(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }

    pub fn empty() -> Self {
        Self(None)
    }

    pub fn block_id(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

/// Rows of cells, top to bottom, left to right.
pub type Layout = Vec<Vec<LayoutCell>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizedWorkContent {
    pub title: String,
    pub layout: Layout,
    pub footnotes: Footnotes,
    pub blocks: Vec<ContentBlock>,
}

/// A fully built work, as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedWork {
    pub id: String,
    pub metadata: WorkMetadata,
    pub localized: BTreeMap<String, LocalizedWorkContent>,
}

impl AnalyzedWork {
    /// All analyzed media of every language.
    pub fn media(&self) -> impl Iterator<Item = &Media> {
        self.localized
            .values()
            .flat_map(|content| content.blocks.iter())
            .filter_map(|block| match block {
                ContentBlock::Media(media) => Some(media),
                ContentBlock::Paragraph(_) | ContentBlock::Link(_) => None,
            })
    }
}
