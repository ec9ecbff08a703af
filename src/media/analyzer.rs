//! Media analyzer trait and shared types.
//!
//! The [`MediaAnalyzer`] trait is the single seam between the build and the
//! media files on disk: given a path, report what kind of file it is and its
//! measurable facts.
//!
//! The production implementation is
//! [`FileAnalyzer`](super::file::FileAnalyzer). Tests use the recording
//! `MockAnalyzer` below, so builds can be exercised without real media.

use crate::types::{ColorPalette, Dimensions, MediaEmbedDeclaration};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read image {path}: {message}")]
    Image { path: String, message: String },
    #[error("Failed to probe {path}: {message}")]
    Probe { path: String, message: String },
}

/// Measurable facts about a media file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaFacts {
    pub content_type: String,
    pub size: u64,
    pub dimensions: Option<Dimensions>,
    /// Seconds, for audio and video.
    pub duration: Option<u32>,
    pub has_sound: bool,
    pub colors: ColorPalette,
}

/// Trait for media analyzers.
pub trait MediaAnalyzer: Sync {
    /// Analyze the file at `path`, declared in a description as `declaration`.
    fn analyze(
        &self,
        path: &Path,
        declaration: &MediaEmbedDeclaration,
    ) -> Result<MediaFacts, AnalysisError>;

    /// Whether this analyzer extracts color palettes.
    fn extracts_colors(&self) -> bool {
        false
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock analyzer that records calls and answers from a table.
    ///
    /// Paths are matched by file name. Unknown files fail like a missing file.
    #[derive(Default)]
    pub struct MockAnalyzer {
        pub results: Mutex<HashMap<String, MediaFacts>>,
        pub calls: Mutex<Vec<String>>,
        pub colors: bool,
    }

    impl MockAnalyzer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, file_name: &str, facts: MediaFacts) -> Self {
            self.results
                .get_mut()
                .unwrap()
                .insert(file_name.to_string(), facts);
            self
        }

        pub fn with_colors(mut self) -> Self {
            self.colors = true;
            self
        }

        pub fn get_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    /// Facts of a small PNG, for tests that need a plausible image.
    pub fn png_facts(width: u32, height: u32) -> MediaFacts {
        MediaFacts {
            content_type: "image/png".to_string(),
            size: 1024,
            dimensions: Some(Dimensions::new(width, height)),
            duration: None,
            has_sound: false,
            colors: ColorPalette {
                primary: "#102030".to_string(),
                ..ColorPalette::default()
            },
        }
    }

    impl MediaAnalyzer for MockAnalyzer {
        fn analyze(
            &self,
            path: &Path,
            _declaration: &MediaEmbedDeclaration,
        ) -> Result<MediaFacts, AnalysisError> {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.calls.lock().unwrap().push(name.clone());
            self.results
                .lock()
                .unwrap()
                .get(&name)
                .cloned()
                .ok_or_else(|| {
                    AnalysisError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("no mock facts for {name}"),
                    ))
                })
        }

        fn extracts_colors(&self) -> bool {
            self.colors
        }
    }

    fn declaration(source: &str) -> MediaEmbedDeclaration {
        MediaEmbedDeclaration {
            id: "id".into(),
            anchor: "a".into(),
            alt: String::new(),
            title: String::new(),
            source: source.into(),
            attributes: Default::default(),
        }
    }

    #[test]
    fn mock_answers_and_records() {
        let analyzer = MockAnalyzer::new().with("a.png", png_facts(800, 600));

        let facts = analyzer
            .analyze(Path::new("/work/a.png"), &declaration("a.png"))
            .unwrap();
        assert_eq!(facts.dimensions.unwrap().width, 800);

        assert!(
            analyzer
                .analyze(Path::new("/work/b.png"), &declaration("b.png"))
                .is_err()
        );
        assert_eq!(analyzer.get_calls(), vec!["a.png", "b.png"]);
    }

    #[test]
    fn error_messages_name_the_file() {
        let err = AnalysisError::Probe {
            path: "clip.mp4".into(),
            message: "exit status 1".into(),
        };
        assert_eq!(err.to_string(), "Failed to probe clip.mp4: exit status 1");
    }
}
