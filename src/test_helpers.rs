//! Shared test utilities for the workbase test suite.
//!
//! Provides fixture databases, work writers and small constructors for the
//! build-phase data structures (`Media`, `AnalyzedWork`).
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! write_work(tmp.path(), "lamp", "# Lamp\n\n![front](front.png)\n", &[("front.png", b"png")]);
//!
//! let media = media_fixture("m1", "front.png");
//! let work = analyzed_work("lamp", vec![media]);
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use tempfile::TempDir;

use crate::scan::DESCRIPTION_FILE_NAME;
use crate::types::{
    AnalyzedWork, ColorPalette, ContentBlock, LayoutCell, LocalizedWorkContent, Media,
    MediaAttributes, MediaEmbedDeclaration, WorkMetadata,
};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/database/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/database");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `<root>/<id>/description.md` and the given files of the work.
///
/// File paths are relative to the work directory; parents are created.
pub fn write_work(root: &Path, id: &str, description: &str, files: &[(&str, &[u8])]) {
    let dir = root.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(DESCRIPTION_FILE_NAME), description).unwrap();
    for (name, contents) in files {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }
}

/// Write a solid-color PNG.
pub fn write_png(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb(rgb));
    img.save(path).unwrap();
}

// =========================================================================
// Constructors
// =========================================================================

pub fn declaration(source: &str) -> MediaEmbedDeclaration {
    MediaEmbedDeclaration {
        id: "decl0001".to_string(),
        anchor: crate::slug::slugify(source),
        alt: String::new(),
        title: String::new(),
        source: source.to_string(),
        attributes: MediaAttributes::default(),
    }
}

/// A media block with no analyzed facts.
pub fn media_fixture(id: &str, source: &str) -> Media {
    Media {
        id: id.to_string(),
        anchor: crate::slug::slugify(source),
        alt: String::new(),
        title: String::new(),
        source: source.to_string(),
        relative_source: source.to_string(),
        dist_source: String::new(),
        content_type: String::new(),
        size: 0,
        dimensions: None,
        duration: None,
        online: crate::media::is_online(source),
        has_sound: false,
        colors: ColorPalette::default(),
        attributes: MediaAttributes::default(),
        hash: String::new(),
    }
}

/// A single-language work whose blocks are the given media, one per row.
pub fn analyzed_work(id: &str, media: Vec<Media>) -> AnalyzedWork {
    let layout = media
        .iter()
        .map(|m| vec![LayoutCell::block(m.id.as_str())])
        .collect();
    let content = LocalizedWorkContent {
        title: id.to_string(),
        layout,
        footnotes: BTreeMap::new(),
        blocks: media.into_iter().map(ContentBlock::Media).collect(),
    };
    AnalyzedWork {
        id: id.to_string(),
        metadata: WorkMetadata::default(),
        localized: BTreeMap::from([("default".to_string(), content)]),
    }
}
