//! Media analysis.
//!
//! | Fact | Crate / tool |
//! |---|---|
//! | **Content type** | `mime_guess` + `image` format sniffing |
//! | **Dimensions** | `image::image_dimensions`, SVG attributes, `ffprobe` |
//! | **Duration / sound** | `ffprobe` JSON output via `serde_json` |
//! | **Colors** | `image` thumbnail + bucketed histogram |
//!
//! The module is split into:
//! - **Analyzer**: [`MediaAnalyzer`] trait, [`MediaFacts`] and errors
//! - **File**: [`FileAnalyzer`], the production analyzer
//! - **Colors**: dominant color extraction

pub mod analyzer;
pub mod colors;
pub mod file;

pub use analyzer::{AnalysisError, MediaAnalyzer, MediaFacts};
pub use file::FileAnalyzer;

/// Sources that parse as absolute URLs are not files: they are embedded as-is.
///
/// Single-letter schemes are Windows drive letters (`C:\photos\a.png`).
pub fn is_online(source: &str) -> bool {
    url::Url::parse(source).is_ok_and(|url| url.scheme().len() > 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_online() {
        assert!(is_online("https://youtu.be/xyz"));
        assert!(is_online("http://example.com/a.png"));
    }

    #[test]
    fn schemes_without_authority_are_online() {
        assert!(is_online("data:image/png;base64,iVBORw0KGgo="));
        assert!(is_online("mailto:studio@example.com"));
    }

    #[test]
    fn paths_are_not_online() {
        assert!(!is_online("media/a.png"));
        assert!(!is_online("/abs/a.png"));
        assert!(!is_online("://nothing"));
        assert!(!is_online("weird path://x"));
        assert!(!is_online(r"C:\photos\a.png"));
    }
}
