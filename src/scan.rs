//! Work discovery.
//!
//! Every directory directly under the database root is a candidate work,
//! named by its directory name. A candidate is a work when it holds a
//! description document:
//!
//! ```text
//! database/                        # Database root
//! ├── workbase.toml                # Config (optional, not a work)
//! ├── .workbase/                   # Hidden: skipped
//! ├── 2021-lamp/                   # Work "2021-lamp"
//! │   ├── description.md
//! │   └── photos/
//! │       └── front.jpg
//! ├── 2022-chair/                  # Scattered-mode work "2022-chair"
//! │   ├── src/ ...
//! │   └── .workbase/
//! │       ├── description.md
//! │       └── render.png
//! └── notes/                       # No description: skipped
//! ```
//!
//! In scattered mode the description (and the media it references) lives
//! in the scattered-mode folder inside the work directory, so a work can
//! be an existing project tree.
//!
//! Works are returned sorted by id, so builds are deterministic.

use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Name of the description document inside a work.
pub const DESCRIPTION_FILE_NAME: &str = "description.md";

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Cannot read database directory {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Where a work lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkSource {
    /// Directory name, used as the work id.
    pub id: String,
    pub dir: PathBuf,
    pub description: PathBuf,
    /// Directory that relative media sources resolve against.
    pub media_base: PathBuf,
}

/// How to find descriptions inside work directories.
#[derive(Debug, Clone, Copy)]
pub enum DescriptionLocation<'a> {
    /// `<work>/description.md`
    Direct,
    /// `<work>/<folder>/description.md`
    Scattered(&'a str),
}

/// List the works under `root`, sorted by id.
pub fn scan(root: &Path, location: DescriptionLocation<'_>) -> Result<Vec<WorkSource>, ScanError> {
    let mut works = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|source| ScanError::Unreadable {
            path: root.to_path_buf(),
            source,
        })?;
        let id = entry.file_name().to_string_lossy().to_string();
        if is_hidden(&id) || !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path().to_path_buf();
        let media_base = match location {
            DescriptionLocation::Direct => dir.clone(),
            DescriptionLocation::Scattered(folder) => dir.join(folder),
        };
        let description = media_base.join(DESCRIPTION_FILE_NAME);
        if !description.is_file() {
            tracing::debug!(work = %id, "No description, skipping directory");
            continue;
        }
        works.push(WorkSource {
            id,
            dir,
            description,
            media_base,
        });
    }

    Ok(works)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}
