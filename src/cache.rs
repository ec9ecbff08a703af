//! Persisted build state for incremental builds.
//!
//! Two things survive between runs:
//!
//! - **Build metadata**: the timestamp of the previous successful build, in
//!   a small JSON file (`.workbase/build-metadata.json` by default). It drives
//!   [`needs_rebuild`], which decides whether a media copy is stale.
//! - **The previous database**: media analysis (dimensions, duration, colors)
//!   is the expensive part of a build. [`AnalysisCache`] indexes the media of
//!   the previous database by content hash so unchanged files skip analysis.
//!
//! ## Cache keys
//!
//! The analysis cache is **content-addressed**: lookups go by the SHA-256 of
//! the media file, not by its path. Renaming a work folder or moving a file
//! keeps its analysis; editing the file invalidates it. Content hashes also
//! survive `git checkout`, which resets modification times.
//!
//! ## Staleness
//!
//! A path needs rebuilding when it was modified after the previous build, or
//! when either time is unknown. Unknown always means rebuild.
//!
//! ## Bypassing the cache
//!
//! `--no-cache` uses an empty [`AnalysisCache`], so every media file is
//! analyzed again.

use crate::media::file::is_decodable;
use crate::types::{Database, Media};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;

/// What the previous build left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetadata {
    /// `None` means "never built".
    #[serde(default)]
    pub previous_build_date: Option<DateTime<Utc>>,
}

impl BuildMetadata {
    /// Load from `path`. A missing or unreadable file means "never built".
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "Could not read build metadata");
                }
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt build metadata");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())
    }

    /// Metadata for a build finishing at `now`.
    ///
    /// The recorded date strictly advances, even if the clock did not.
    pub fn advanced(&self, now: DateTime<Utc>) -> Self {
        let next = match self.previous_build_date {
            Some(previous) if now <= previous => previous + TimeDelta::nanoseconds(1),
            _ => now,
        };
        Self {
            previous_build_date: Some(next),
        }
    }
}

/// Whether `path` changed since the previous build.
///
/// True when the path was modified after the recorded build date, and
/// whenever either date cannot be determined.
pub fn needs_rebuild(path: &Path, metadata: &BuildMetadata) -> bool {
    let Some(previous) = metadata.previous_build_date else {
        return true;
    };
    match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => DateTime::<Utc>::from(modified) > previous,
        Err(_) => true,
    }
}

/// SHA-256 hash of a file's contents, returned as a hex string.
///
/// The file is streamed through the hasher; large videos are never held in
/// memory.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut std::fs::File::open(path)?, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Write `contents` to `path` through a temporary file in the same
/// directory, so readers never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.flush()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Analyzed media of the previous build, indexed by content hash.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    by_hash: HashMap<String, Media>,
}

impl AnalysisCache {
    /// An empty cache (used for `--no-cache` or first build).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_database(database: &Database) -> Self {
        let by_hash = database
            .values()
            .flat_map(|work| work.media())
            .filter(|media| !media.hash.is_empty())
            .map(|media| (media.hash.clone(), media.clone()))
            .collect();
        Self { by_hash }
    }

    /// Previous analysis of content with this hash.
    ///
    /// With `want_colors`, a raster image analyzed without colors is a miss,
    /// so turning color extraction on takes effect without `--no-cache`.
    pub fn find(&self, hash: &str, want_colors: bool) -> Option<&Media> {
        let media = self.by_hash.get(hash)?;
        if want_colors && is_decodable(&media.content_type) && media.colors.is_empty() {
            return None;
        }
        Some(media)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
    pub copies: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn copy(&mut self) {
        self.copies += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }

    pub fn add(&mut self, other: CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.copies += other.copies;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} analyzed ({} total)",
                self.hits,
                self.misses,
                self.total()
            )?;
        } else {
            write!(f, "{} analyzed", self.misses)?;
        }
        if self.copies > 0 {
            write!(f, ", {} copied", self.copies)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{analyzed_work, media_fixture};
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    // =========================================================================
    // BuildMetadata
    // =========================================================================

    #[test]
    fn load_missing_file_means_never_built() {
        let tmp = TempDir::new().unwrap();
        let metadata = BuildMetadata::load(&tmp.path().join("none.json"));
        assert_eq!(metadata.previous_build_date, None);
    }

    #[test]
    fn load_corrupt_file_means_never_built() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("meta.json");
        fs::write(&path, "{ nope").unwrap();
        assert_eq!(BuildMetadata::load(&path), BuildMetadata::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("meta.json");
        let metadata = BuildMetadata::default().advanced(Utc::now());
        metadata.save(&path).unwrap();
        assert_eq!(BuildMetadata::load(&path), metadata);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("previous_build_date"));
    }

    #[test]
    fn advanced_uses_now_when_later() {
        let earlier = Utc::now() - TimeDelta::seconds(10);
        let now = Utc::now();
        let metadata = BuildMetadata {
            previous_build_date: Some(earlier),
        };
        assert_eq!(metadata.advanced(now).previous_build_date, Some(now));
    }

    #[test]
    fn advanced_strictly_increases_when_clock_stalls() {
        let now = Utc::now();
        let metadata = BuildMetadata {
            previous_build_date: Some(now),
        };
        let next = metadata.advanced(now).previous_build_date.unwrap();
        assert!(next > now);

        let behind = metadata.advanced(now - TimeDelta::seconds(5));
        assert!(behind.previous_build_date.unwrap() > now);
    }

    // =========================================================================
    // needs_rebuild
    // =========================================================================

    #[test]
    fn never_built_needs_rebuild() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "x").unwrap();
        assert!(needs_rebuild(&path, &BuildMetadata::default()));
    }

    #[test]
    fn missing_path_needs_rebuild() {
        let tmp = TempDir::new().unwrap();
        let metadata = BuildMetadata::default().advanced(Utc::now());
        assert!(needs_rebuild(&tmp.path().join("gone"), &metadata));
    }

    #[test]
    fn modified_after_build_needs_rebuild() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "x").unwrap();
        let built = BuildMetadata {
            previous_build_date: Some(Utc::now() - TimeDelta::hours(1)),
        };
        assert!(needs_rebuild(&path, &built));
    }

    #[test]
    fn unchanged_since_build_is_fresh() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        let file = fs::File::create(&path).unwrap();
        file.set_modified(SystemTime::now() - Duration::from_secs(7200))
            .unwrap();
        let built = BuildMetadata {
            previous_build_date: Some(Utc::now() - TimeDelta::hours(1)),
        };
        assert!(!needs_rebuild(&path, &built));
    }

    // =========================================================================
    // Hashing and atomic writes
    // =========================================================================

    #[test]
    fn hash_file_deterministic() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.bin");
        fs::write(&path, b"hello world").unwrap();

        let h1 = hash_file(&path).unwrap();
        let h2 = hash_file(&path).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64); // SHA-256 hex is 64 chars
    }

    #[test]
    fn hash_file_streams_large_files() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("clip.mp4");
        let bytes: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &bytes).unwrap();

        assert_eq!(hash_file(&path).unwrap(), format!("{:x}", Sha256::digest(&bytes)));
    }

    #[test]
    fn hash_file_changes_with_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.bin");

        fs::write(&path, b"version 1").unwrap();
        let h1 = hash_file(&path).unwrap();

        fs::write(&path, b"version 2").unwrap();
        let h2 = hash_file(&path).unwrap();

        assert_ne!(h1, h2);
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    // =========================================================================
    // AnalysisCache
    // =========================================================================

    #[test]
    fn analysis_cache_indexes_previous_media_by_hash() {
        let mut media = media_fixture("m1", "photo.png");
        media.hash = "abc".into();
        media.content_type = "image/png".into();
        media.colors.primary = "#ff0000".into();
        let mut database = Database::new();
        database.insert("work".into(), analyzed_work("work", vec![media.clone()]));

        let cache = AnalysisCache::from_database(&database);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.find("abc", true), Some(&media));
        assert_eq!(cache.find("other", false), None);
    }

    #[test]
    fn analysis_cache_misses_images_without_colors_when_wanted() {
        let mut media = media_fixture("m1", "photo.png");
        media.hash = "abc".into();
        media.content_type = "image/png".into();
        let mut database = Database::new();
        database.insert("work".into(), analyzed_work("work", vec![media]));

        let cache = AnalysisCache::from_database(&database);
        assert!(cache.find("abc", true).is_none());
        assert!(cache.find("abc", false).is_some());
    }

    #[test]
    fn analysis_cache_hits_svg_without_colors() {
        let mut media = media_fixture("m1", "plan.svg");
        media.hash = "def".into();
        media.content_type = "image/svg+xml".into();
        let mut database = Database::new();
        database.insert("work".into(), analyzed_work("work", vec![media]));

        let cache = AnalysisCache::from_database(&database);
        assert!(cache.find("def", true).is_some());
    }

    #[test]
    fn online_media_is_not_cached() {
        let media = media_fixture("m1", "https://example.com/v");
        let mut database = Database::new();
        database.insert("work".into(), analyzed_work("work", vec![media]));
        assert!(AnalysisCache::from_database(&database).is_empty());
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let s = CacheStats {
            hits: 5,
            misses: 2,
            copies: 0,
        };
        assert_eq!(format!("{}", s), "5 cached, 2 analyzed (7 total)");
    }

    #[test]
    fn cache_stats_display_with_copies() {
        let s = CacheStats {
            hits: 0,
            misses: 3,
            copies: 2,
        };
        assert_eq!(format!("{}", s), "3 analyzed, 2 copied");
    }

    #[test]
    fn cache_stats_add() {
        let mut total = CacheStats::default();
        total.add(CacheStats {
            hits: 1,
            misses: 2,
            copies: 3,
        });
        total.hit();
        assert_eq!(total.hits, 2);
        assert_eq!(total.total(), 4);
    }
}
