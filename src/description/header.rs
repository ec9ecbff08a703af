//! Header/body splitting.
//!
//! A description starts with an optional YAML header fenced by dash lines:
//!
//! ```text
//! ---
//! tags: [web, design]
//! made with: [rust]
//! ---
//! # Title
//! ...
//! ```
//!
//! The opening fence must be the first non-blank line, so a `---` rule further
//! down the body is never mistaken for a header.

use crate::types::WorkMetadata;

/// A description split into its structured header and free-form body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitDocument {
    pub metadata: WorkMetadata,
    /// Raw header lines, without the fences.
    pub header: String,
    pub body: String,
}

/// Split a raw description into metadata and body.
///
/// Never fails: a malformed header degrades to default metadata and is
/// logged, the body is still returned.
pub fn split_header(raw: &str) -> SplitDocument {
    let text = raw.replace('\t', "    ");
    let lines: Vec<&str> = text.lines().collect();

    let Some((open, close)) = find_fences(&lines) else {
        return SplitDocument {
            body: lines.join("\n"),
            ..SplitDocument::default()
        };
    };

    let header = lines[open + 1..close].join("\n");
    let body = lines[..open]
        .iter()
        .chain(&lines[close + 1..])
        .copied()
        .collect::<Vec<_>>()
        .join("\n");

    SplitDocument {
        metadata: decode_metadata(&header),
        header,
        body,
    }
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|c| c == '-')
}

fn find_fences(lines: &[&str]) -> Option<(usize, usize)> {
    let open = lines.iter().position(|line| !line.trim().is_empty())?;
    if !is_fence(lines[open]) {
        return None;
    }
    let close = lines[open + 1..].iter().position(|line| is_fence(line))?;
    Some((open, open + 1 + close))
}

/// Decode header YAML into metadata, normalizing `made with` style keys.
pub fn decode_metadata(header: &str) -> WorkMetadata {
    let value: serde_yaml::Value = match serde_yaml::from_str(header) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Could not parse description header, using defaults");
            return WorkMetadata::default();
        }
    };

    let mapping = match value {
        serde_yaml::Value::Mapping(mapping) => mapping,
        serde_yaml::Value::Null => return WorkMetadata::default(),
        _ => {
            tracing::warn!("Description header is not a mapping, using defaults");
            return WorkMetadata::default();
        }
    };

    let mut fields = serde_json::Map::new();
    for (key, value) in mapping {
        let key = match key {
            serde_yaml::Value::String(key) => key.replace(' ', "_"),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            other => {
                tracing::warn!(key = ?other, "Ignoring description header key that is not a scalar");
                continue;
            }
        };
        match serde_json::to_value(&value) {
            Ok(value) => {
                fields.insert(key, value);
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "Ignoring description header value"),
        }
    }

    // Decode field by field so one bad value only loses its own key.
    fields.retain(|key, value| {
        let single = serde_json::Map::from_iter([(key.clone(), value.clone())]);
        match serde_json::from_value::<WorkMetadata>(serde_json::Value::Object(single)) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Ignoring invalid description header value");
                false
            }
        }
    });
    serde_json::from_value(serde_json::Value::Object(fields)).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Description header has invalid values, using defaults");
        WorkMetadata::default()
    })
}
