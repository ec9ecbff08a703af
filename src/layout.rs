//! Layout resolution: blocks of one language projected onto a grid.
//!
//! Without a declared layout every block gets its own row, in document order.
//! A declared layout is a list of rows in the description header:
//!
//! ```yaml
//! layout:
//!   - p1            # first paragraph, alone
//!   - [m1, m2]      # first two media side by side
//!   - [l1, .]       # first link, then an empty cell
//!   - [Xy3_k9aB]    # a block by its literal id
//! ```
//!
//! | Reference        | Cell                                  |
//! |------------------|---------------------------------------|
//! | `pN` `mN` `lN`   | Nth paragraph / media / link (1-based) |
//! | block id         | that block                            |
//! | `.` `_` `~` null | empty                                 |
//!
//! Blocks the declaration does not mention are appended one per row after
//! the declared rows, so nothing written in the document is lost.

use crate::types::{Layout, LayoutCell, LayoutSpec, ParsedLanguage};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("layout for language {language:?} references unknown block {reference:?}")]
    UnknownBlock { language: String, reference: String },
}

/// Build the grid of `language` from its blocks and an optional declaration.
pub fn resolve_layout(
    language: &str,
    parsed: &ParsedLanguage,
    spec: Option<&LayoutSpec>,
) -> Result<Layout, LayoutError> {
    let Some(spec) = spec else {
        return Ok(default_layout(&parsed.order));
    };

    let mut layout: Layout = Vec::with_capacity(spec.len());
    let mut placed: HashSet<&str> = HashSet::new();

    for row in spec {
        let mut cells = Vec::new();
        for reference in row.cells() {
            match resolve_reference(parsed, reference) {
                Some(Resolved::Empty) => cells.push(LayoutCell::empty()),
                Some(Resolved::Block(id)) => {
                    placed.insert(id);
                    cells.push(LayoutCell::block(id));
                }
                None => {
                    return Err(LayoutError::UnknownBlock {
                        language: language.to_string(),
                        reference: reference.unwrap_or_default().to_string(),
                    });
                }
            }
        }
        layout.push(cells);
    }

    for id in &parsed.order {
        if !placed.contains(id.as_str()) {
            layout.push(vec![LayoutCell::block(id.as_str())]);
        }
    }

    Ok(layout)
}

/// One block per row, in order.
pub fn default_layout(order: &[String]) -> Layout {
    order
        .iter()
        .map(|id| vec![LayoutCell::block(id.as_str())])
        .collect()
}

enum Resolved<'a> {
    Empty,
    Block(&'a str),
}

fn resolve_reference<'a>(parsed: &'a ParsedLanguage, reference: Option<&str>) -> Option<Resolved<'a>> {
    let reference = match reference.map(str::trim) {
        None | Some("" | "." | "_" | "~") => return Some(Resolved::Empty),
        Some(reference) => reference,
    };

    if let Some(id) = parsed.order.iter().find(|id| *id == reference) {
        return Some(Resolved::Block(id));
    }

    let mut chars = reference.chars();
    let kind = chars.next()?;
    let index: usize = chars.as_str().parse().ok().filter(|n| *n >= 1)?;
    let id = match kind {
        'p' => &parsed.paragraphs.get(index - 1)?.id,
        'm' => &parsed.media.get(index - 1)?.id,
        'l' => &parsed.links.get(index - 1)?.id,
        _ => return None,
    };
    Some(Resolved::Block(id))
}
