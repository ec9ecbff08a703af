//! Media analysis of files on disk.
//!
//! ## Tool mapping
//!
//! | Fact | Source |
//! |---|---|
//! | Content type | `mime_guess` on the extension, then `image` format sniffing, then `application/octet-stream` |
//! | Raster image dimensions | `image::image_dimensions` (header only, no full decode) |
//! | SVG dimensions | `width`/`height` attributes, else `viewBox` |
//! | Dominant colors | [`colors::dominant_colors`](super::colors::dominant_colors) on a decoded raster image |
//! | Audio/video duration, size, sound | `ffprobe -print_format json` |
//!
//! `ffprobe` is optional. When it is not installed, audio and video still get
//! their content type and size, and a debug message is logged.

use super::analyzer::{AnalysisError, MediaAnalyzer, MediaFacts};
use super::colors::dominant_colors;
use crate::types::{Dimensions, MediaEmbedDeclaration};
use image::ImageReader;
use regex::Regex;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

const OCTET_STREAM: &str = "application/octet-stream";

/// Raster formats the `image` crate decodes in this build.
const DECODABLE: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

static SVG_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<svg\b[^>]*>").unwrap());
static SVG_WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\swidth\s*=\s*["'](\d+(?:\.\d+)?)(?:px)?["']"#).unwrap());
static SVG_HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sheight\s*=\s*["'](\d+(?:\.\d+)?)(?:px)?["']"#).unwrap());
static SVG_VIEWBOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sviewBox\s*=\s*["']([^"']+)["']"#).unwrap());

/// Whether colors can be extracted from media of this content type.
pub fn is_decodable(content_type: &str) -> bool {
    DECODABLE.contains(&content_type)
}

/// Content type from a file extension, if `mime_guess` knows it.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}

/// Analyzer for files on the local filesystem.
pub struct FileAnalyzer {
    extract_colors: bool,
    ffprobe: PathBuf,
}

impl FileAnalyzer {
    pub fn new(extract_colors: bool) -> Self {
        Self {
            extract_colors,
            ffprobe: PathBuf::from("ffprobe"),
        }
    }

    /// Use a specific `ffprobe` binary.
    pub fn with_ffprobe(mut self, ffprobe: impl Into<PathBuf>) -> Self {
        self.ffprobe = ffprobe.into();
        self
    }

    fn sniff_content_type(path: &Path) -> io::Result<String> {
        let format = ImageReader::open(path)?.with_guessed_format()?.format();
        Ok(format
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|| OCTET_STREAM.to_string()))
    }

    fn analyze_image(&self, path: &Path, facts: &mut MediaFacts) -> Result<(), AnalysisError> {
        let image_error = |message: String| AnalysisError::Image {
            path: path.display().to_string(),
            message,
        };

        if facts.content_type == "image/svg+xml" {
            let svg = std::fs::read_to_string(path)?;
            facts.dimensions = Some(
                svg_dimensions(&svg)
                    .ok_or_else(|| image_error("cannot determine SVG dimensions".into()))?,
            );
            return Ok(());
        }

        if !is_decodable(&facts.content_type) {
            tracing::debug!(path = %path.display(), content_type = %facts.content_type, "No decoder for image");
            return Ok(());
        }

        if self.extract_colors {
            let image = image::open(path).map_err(|e| image_error(e.to_string()))?;
            facts.dimensions = Some(Dimensions::new(image.width(), image.height()));
            facts.colors = dominant_colors(&image);
        } else {
            let (width, height) =
                image::image_dimensions(path).map_err(|e| image_error(e.to_string()))?;
            facts.dimensions = Some(Dimensions::new(width, height));
        }
        Ok(())
    }

    fn analyze_av(&self, path: &Path, facts: &mut MediaFacts) -> Result<(), AnalysisError> {
        let output = match Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
        {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "ffprobe not found, skipping audio/video analysis");
                if facts.content_type.starts_with("audio/") {
                    facts.has_sound = true;
                }
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let probe_error = |message: String| AnalysisError::Probe {
            path: path.display().to_string(),
            message,
        };
        if !output.status.success() {
            return Err(probe_error(format!("ffprobe exited with {}", output.status)));
        }
        let probe = parse_probe(&String::from_utf8_lossy(&output.stdout))
            .map_err(|e| probe_error(e.to_string()))?;

        facts.duration = probe.duration;
        facts.has_sound = probe.has_sound || facts.content_type.starts_with("audio/");
        if facts.content_type.starts_with("video/") {
            facts.dimensions = probe.dimensions;
        }
        Ok(())
    }
}

impl MediaAnalyzer for FileAnalyzer {
    fn analyze(
        &self,
        path: &Path,
        _declaration: &MediaEmbedDeclaration,
    ) -> Result<MediaFacts, AnalysisError> {
        let metadata = std::fs::metadata(path)?;
        if metadata.is_dir() {
            return Ok(MediaFacts {
                content_type: "directory".to_string(),
                ..MediaFacts::default()
            });
        }

        let content_type = match content_type_for(path) {
            Some(known) => known.to_string(),
            None => Self::sniff_content_type(path)?,
        };
        let mut facts = MediaFacts {
            content_type,
            size: metadata.len(),
            ..MediaFacts::default()
        };

        if facts.content_type.starts_with("image/") {
            self.analyze_image(path, &mut facts)?;
        } else if facts.content_type.starts_with("video/") || facts.content_type.starts_with("audio/")
        {
            self.analyze_av(path, &mut facts)?;
        }
        Ok(facts)
    }

    fn extracts_colors(&self) -> bool {
        self.extract_colors
    }
}

/// Dimensions from the root `<svg>` element.
pub fn svg_dimensions(svg: &str) -> Option<Dimensions> {
    let tag = SVG_TAG.find(svg)?.as_str();
    let number = |re: &Regex| -> Option<f64> { re.captures(tag)?[1].parse().ok() };

    if let (Some(width), Some(height)) = (number(&SVG_WIDTH), number(&SVG_HEIGHT)) {
        return Some(Dimensions::new(width.round() as u32, height.round() as u32));
    }

    let viewbox = SVG_VIEWBOX.captures(tag)?;
    let values: Vec<f64> = viewbox[1]
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    match values.as_slice() {
        [_, _, width, height] if *width > 0.0 && *height > 0.0 => {
            Some(Dimensions::new(width.round() as u32, height.round() as u32))
        }
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// What `ffprobe` tells us about an audio or video file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeFacts {
    pub dimensions: Option<Dimensions>,
    pub duration: Option<u32>,
    pub has_sound: bool,
}

pub fn parse_probe(json: &str) -> Result<ProbeFacts, serde_json::Error> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    let dimensions = probe
        .streams
        .iter()
        .filter(|s| s.codec_type == "video")
        .find_map(|s| Some(Dimensions::new(s.width?, s.height?)));
    let duration = probe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .map(|seconds| seconds.round() as u32);
    Ok(ProbeFacts {
        dimensions,
        duration,
        has_sound: probe.streams.iter().any(|s| s.codec_type == "audio"),
    })
}
