//! Building a single work.
//!
//! Takes one [`WorkSource`] from the scan and produces its [`AnalyzedWork`]:
//!
//! ```text
//! description.md
//!   │ description::parse_description_with_ids
//!   ▼
//! ParsedWork ──► media declarations ──► analysis (or cache) ──► copy to media dir
//!   │                                         │
//!   │ layout::resolve_layout                  │ failed media: cells emptied
//!   ▼                                         ▼
//! AnalyzedWork { metadata, localized: { language → title, layout, footnotes, blocks } }
//! ```
//!
//! ## Media
//!
//! Sources with a URL scheme are embedded as-is and marked `online`. Other
//! sources are resolved against the work folder (the scattered-mode folder in
//! scattered mode), hashed, then either taken from the [`AnalysisCache`] or
//! handed to the [`MediaAnalyzer`]. The file is copied to
//! `<media dir>/<work id>/<relative source>` when the copy is missing or the
//! source changed since the previous build.
//!
//! The same file declared several times (in several languages, or twice in
//! one) is analyzed once. Each declaration keeps its own id, anchor, alt,
//! title and attributes.
//!
//! A media file that cannot be analyzed or copied is left out: it is logged,
//! its block is dropped and layout cells referring to it become empty.

use crate::cache::{self, AnalysisCache, BuildMetadata, CacheStats};
use crate::config::Config;
use crate::description::{self, blocks::BlockIds};
use crate::layout::{self, LayoutError};
use crate::media::{self, AnalysisError, MediaAnalyzer, MediaFacts};
use crate::scan::WorkSource;
use crate::types::{
    AnalyzedWork, Block, ColorPalette, ContentBlock, Layout, LayoutCell, LocalizedWorkContent,
    Media, MediaEmbedDeclaration, ParsedLanguage,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkError {
    #[error("Cannot read description {}: {source}", path.display())]
    Description {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Read-only state shared by every work of a build.
pub struct WorkContext<'a> {
    pub config: &'a Config,
    pub analyzer: &'a dyn MediaAnalyzer,
    pub cache: &'a AnalysisCache,
    pub metadata: &'a BuildMetadata,
    /// Absolute media output directory.
    pub media_dir: &'a Path,
    pub scattered: bool,
    /// Replaces the description-derived block id seed of every work.
    pub id_seed: Option<u64>,
}

/// What happened to one media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaStatus {
    Online,
    Cached,
    Analyzed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReport {
    pub source: String,
    pub status: MediaStatus,
    pub copied: bool,
}

#[derive(Debug)]
pub struct BuiltWork {
    pub work: AnalyzedWork,
    /// One entry per distinct media source, in declaration order.
    pub media: Vec<MediaReport>,
    pub stats: CacheStats,
}

/// Build one work from its description and media.
///
/// Block ids are seeded from the description text: an unchanged description
/// builds to the same ids.
pub fn build_work(source: &WorkSource, ctx: &WorkContext<'_>) -> Result<BuiltWork, WorkError> {
    let raw = fs::read_to_string(&source.description).map_err(|e| WorkError::Description {
        path: source.description.clone(),
        source: e,
    })?;
    let mut ids = match ctx.id_seed {
        Some(seed) => BlockIds::seeded(seed),
        None => BlockIds::for_text(&raw),
    };
    let parsed =
        description::parse_description_with_ids(&raw, &ctx.config.default_language, &mut ids);

    let mut resolver = MediaResolver::new(source, ctx);
    let mut resolved: BTreeMap<&str, HashMap<String, Media>> = BTreeMap::new();
    for (language, parsed_language) in &parsed.languages {
        let mut media = HashMap::new();
        for declaration in &parsed_language.media {
            if let Some(analyzed) = resolver.resolve(declaration) {
                media.insert(declaration.id.clone(), analyzed);
            }
        }
        resolved.insert(language.as_str(), media);
    }

    let mut metadata = parsed.metadata.clone();
    if ctx.config.extract_colors.enabled
        && metadata.colors.is_empty()
        && let Some(colors) = fallback_colors(&metadata.thumbnail, &parsed.languages, &resolved)
    {
        metadata.colors = colors;
    }

    let no_media = HashMap::new();
    let mut localized = BTreeMap::new();
    for (language, parsed_language) in &parsed.languages {
        let media = resolved.get(language.as_str()).unwrap_or(&no_media);
        let layout =
            layout::resolve_layout(language, parsed_language, metadata.layout.as_ref())?;
        localized.insert(
            language.clone(),
            LocalizedWorkContent {
                title: parsed_language.title.clone(),
                layout: without_missing_media(language, layout, parsed_language, media),
                footnotes: parsed_language.footnotes.clone(),
                blocks: assemble_blocks(language, parsed_language, media),
            },
        );
    }

    Ok(BuiltWork {
        work: AnalyzedWork {
            id: source.id.clone(),
            metadata,
            localized,
        },
        media: resolver.reports,
        stats: resolver.stats,
    })
}

// ============================================================================
// Media resolution
// ============================================================================

struct MediaResolver<'w, 'a> {
    work: &'w WorkSource,
    ctx: &'w WorkContext<'a>,
    /// Analysis per absolute path. `None` records a failure.
    by_path: HashMap<PathBuf, Option<Media>>,
    reports: Vec<MediaReport>,
    stats: CacheStats,
}

impl<'w, 'a> MediaResolver<'w, 'a> {
    fn new(work: &'w WorkSource, ctx: &'w WorkContext<'a>) -> Self {
        Self {
            work,
            ctx,
            by_path: HashMap::new(),
            reports: Vec::new(),
            stats: CacheStats::default(),
        }
    }

    fn resolve(&mut self, declaration: &MediaEmbedDeclaration) -> Option<Media> {
        if media::is_online(&declaration.source) {
            self.reports.push(MediaReport {
                source: declaration.source.clone(),
                status: MediaStatus::Online,
                copied: false,
            });
            let mut online = declared(declaration);
            online.online = true;
            return Some(online);
        }

        let path = clean_path(&self.work.media_base.join(&declaration.source));
        if let Some(previous) = self.by_path.get(&path) {
            return previous.clone().map(|media| presented(media, declaration));
        }

        let analyzed = match self.analyze(&path, declaration) {
            Ok((media, status, copied)) => {
                self.reports.push(MediaReport {
                    source: declaration.source.clone(),
                    status,
                    copied,
                });
                Some(media)
            }
            Err(e) => {
                tracing::warn!(
                    work = %self.work.id,
                    source = %declaration.source,
                    error = %e,
                    "Leaving out media that could not be analyzed"
                );
                self.reports.push(MediaReport {
                    source: declaration.source.clone(),
                    status: MediaStatus::Failed(e.to_string()),
                    copied: false,
                });
                None
            }
        };
        self.by_path.insert(path, analyzed.clone());
        analyzed
    }

    fn analyze(
        &mut self,
        path: &Path,
        declaration: &MediaEmbedDeclaration,
    ) -> Result<(Media, MediaStatus, bool), AnalysisError> {
        let is_dir = path.is_dir();
        let hash = if is_dir {
            String::new()
        } else {
            cache::hash_file(path)?
        };

        let cached = if hash.is_empty() {
            None
        } else {
            self.ctx
                .cache
                .find(&hash, self.ctx.analyzer.extracts_colors())
        };
        let (facts, status) = match cached {
            Some(previous) => {
                tracing::debug!(source = %declaration.source, "Analysis cache hit");
                self.stats.hit();
                (facts_of(previous), MediaStatus::Cached)
            }
            None => {
                let facts = self.ctx.analyzer.analyze(path, declaration)?;
                self.stats.miss();
                (facts, MediaStatus::Analyzed)
            }
        };

        let scattered_folder = self
            .ctx
            .scattered
            .then_some(self.ctx.config.scattered_mode_folder.as_str());
        let relative = relative_source(&declaration.source, scattered_folder);
        let copied = if is_dir {
            false
        } else {
            let target = self.ctx.media_dir.join(&self.work.id).join(&relative);
            copy_if_stale(path, &target, self.ctx.metadata)?
        };
        if copied {
            self.stats.copy();
        }

        let mut media = declared(declaration);
        media.dist_source = format!(
            "{}/{}/{}",
            self.ctx.config.media.at.trim_end_matches('/'),
            self.work.id,
            relative
        );
        media.relative_source = relative;
        media.content_type = facts.content_type;
        media.size = facts.size;
        media.dimensions = facts.dimensions;
        media.duration = facts.duration;
        media.has_sound = facts.has_sound;
        media.colors = facts.colors;
        media.hash = hash;
        Ok((media, status, copied))
    }
}

/// A media block carrying only what the declaration says.
fn declared(declaration: &MediaEmbedDeclaration) -> Media {
    Media {
        id: declaration.id.clone(),
        anchor: declaration.anchor.clone(),
        alt: declaration.alt.clone(),
        title: declaration.title.clone(),
        source: declaration.source.clone(),
        relative_source: String::new(),
        dist_source: String::new(),
        content_type: String::new(),
        size: 0,
        dimensions: None,
        duration: None,
        online: false,
        has_sound: false,
        colors: ColorPalette::default(),
        attributes: declaration.attributes.clone(),
        hash: String::new(),
    }
}

/// Reuse an analysis for another declaration of the same file.
fn presented(mut media: Media, declaration: &MediaEmbedDeclaration) -> Media {
    media.id = declaration.id.clone();
    media.anchor = declaration.anchor.clone();
    media.alt = declaration.alt.clone();
    media.title = declaration.title.clone();
    media.source = declaration.source.clone();
    media.attributes = declaration.attributes.clone();
    media
}

fn facts_of(media: &Media) -> MediaFacts {
    MediaFacts {
        content_type: media.content_type.clone(),
        size: media.size,
        dimensions: media.dimensions,
        duration: media.duration,
        has_sound: media.has_sound,
        colors: media.colors.clone(),
    }
}

/// Copy `source` to `target` unless an up-to-date copy is already there.
fn copy_if_stale(source: &Path, target: &Path, metadata: &BuildMetadata) -> std::io::Result<bool> {
    if target.exists() && !cache::needs_rebuild(source, metadata) {
        return Ok(false);
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, target)?;
    Ok(true)
}

/// Lexically normalize `.` and `..` components.
fn clean_path(path: &Path) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other),
        }
    }
    clean
}

const PARENT_MARKER: &str = "_up";
const ABSOLUTE_MARKER: &str = "_abs";

/// Path of a media source relative to the work folder, `/`-separated.
///
/// Never escapes the work folder, and distinct sources never share a path:
/// each `..` above the work folder becomes a `_up` component, and absolute
/// sources are kept whole under `_abs`.
fn relative_source(source: &str, scattered_folder: Option<&str>) -> String {
    let source_path = Path::new(source);
    let (joined, mut parts) = if source_path.is_absolute() {
        (source_path.to_path_buf(), vec![ABSOLUTE_MARKER.to_string()])
    } else {
        let joined = match scattered_folder {
            Some(folder) => Path::new(folder).join(source_path),
            None => source_path.to_path_buf(),
        };
        (joined, Vec::new())
    };
    let floor = parts.len();
    for component in joined.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                if parts.len() > floor && parts.last().is_some_and(|p| p != PARENT_MARKER) {
                    parts.pop();
                } else {
                    parts.push(PARENT_MARKER.to_string());
                }
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    parts.join("/")
}

// ============================================================================
// Assembly
// ============================================================================

/// Work colors from the thumbnail media, or else the first analyzed media.
fn fallback_colors(
    thumbnail: &str,
    languages: &BTreeMap<String, ParsedLanguage>,
    resolved: &BTreeMap<&str, HashMap<String, Media>>,
) -> Option<ColorPalette> {
    let analyzed: Vec<&Media> = languages
        .iter()
        .flat_map(|(language, parsed)| {
            let media = resolved.get(language.as_str());
            parsed
                .media
                .iter()
                .filter_map(move |declaration| media.and_then(|m| m.get(&declaration.id)))
        })
        .filter(|media| !media.online)
        .collect();

    let thumbnail = thumbnail.trim();
    let thumbnail_media = if thumbnail.is_empty() {
        None
    } else {
        let relative = relative_source(thumbnail, None);
        analyzed
            .iter()
            .find(|media| media.source == thumbnail || media.relative_source == relative)
    };

    thumbnail_media
        .or_else(|| analyzed.first())
        .map(|media| media.colors.clone())
        .filter(|colors| !colors.is_empty())
}

/// Empty the cells of media that were left out.
///
/// Rows emptied entirely this way are removed; rows declared empty stay.
fn without_missing_media(
    language: &str,
    layout: Layout,
    parsed: &ParsedLanguage,
    resolved: &HashMap<String, Media>,
) -> Layout {
    let missing: HashSet<&str> = parsed
        .media
        .iter()
        .map(|declaration| declaration.id.as_str())
        .filter(|id| !resolved.contains_key(*id))
        .collect();
    if missing.is_empty() {
        return layout;
    }

    layout
        .into_iter()
        .filter_map(|row| {
            let mut emptied = false;
            let row: Vec<LayoutCell> = row
                .into_iter()
                .map(|cell| {
                    let is_missing = cell.block_id().is_some_and(|id| missing.contains(id));
                    if is_missing {
                        tracing::info!(
                            language,
                            block = cell.block_id().unwrap_or_default(),
                            "Emptying layout cell of missing media"
                        );
                        emptied = true;
                        LayoutCell::empty()
                    } else {
                        cell
                    }
                })
                .collect();
            (!(emptied && row.iter().all(LayoutCell::is_empty))).then_some(row)
        })
        .collect()
}

fn assemble_blocks(
    language: &str,
    parsed: &ParsedLanguage,
    resolved: &HashMap<String, Media>,
) -> Vec<ContentBlock> {
    parsed
        .order
        .iter()
        .filter_map(|id| match parsed.block(id) {
            Some(Block::Paragraph(paragraph)) => Some(ContentBlock::Paragraph(paragraph)),
            Some(Block::Link(link)) => Some(ContentBlock::Link(link)),
            Some(Block::Media(_)) => resolved.get(id).cloned().map(ContentBlock::Media),
            None => {
                tracing::warn!(language, block = %id, "Could not find block");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::analyzer::tests::{MockAnalyzer, png_facts};
    use crate::scan::{self, DescriptionLocation};
    use crate::test_helpers::write_work;
    use chrono::{TimeDelta, Utc};
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        config: Config,
        cache: AnalysisCache,
        metadata: BuildMetadata,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tmp: TempDir::new().unwrap(),
                config: Config::default(),
                cache: AnalysisCache::empty(),
                metadata: BuildMetadata::default(),
            }
        }

        fn root(&self) -> &Path {
            self.tmp.path()
        }

        fn media_dir(&self) -> PathBuf {
            self.config.media_dir(self.root())
        }

        fn build(&self, analyzer: &MockAnalyzer, scattered: bool) -> BuiltWork {
            let location = if scattered {
                DescriptionLocation::Scattered(&self.config.scattered_mode_folder)
            } else {
                DescriptionLocation::Direct
            };
            let works = scan::scan(self.root(), location).unwrap();
            let media_dir = self.media_dir();
            let ctx = WorkContext {
                config: &self.config,
                analyzer,
                cache: &self.cache,
                metadata: &self.metadata,
                media_dir: &media_dir,
                scattered,
                id_seed: Some(1),
            };
            build_work(&works[0], &ctx).unwrap()
        }
    }

    fn media_blocks(content: &LocalizedWorkContent) -> Vec<&Media> {
        content
            .blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Media(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    // =========================================================================
    // Assembly
    // =========================================================================

    #[test]
    fn builds_localized_content_in_order() {
        let fx = Fixture::new();
        write_work(
            fx.root(),
            "lamp",
            "---\ntags: [light]\n---\n# Lamp\n\nA lamp.\n\n![front](front.png)\n\n[Shop](https://shop.example)\n",
            &[("front.png", b"png")],
        );
        let analyzer = MockAnalyzer::new().with("front.png", png_facts(400, 300));

        let built = fx.build(&analyzer, false);
        let work = &built.work;
        assert_eq!(work.id, "lamp");
        assert_eq!(work.metadata.tags, vec!["light"]);

        let content = &work.localized["default"];
        assert_eq!(content.title, "Lamp");
        assert_eq!(content.blocks.len(), 3);
        assert!(matches!(content.blocks[0], ContentBlock::Paragraph(_)));
        assert!(matches!(content.blocks[1], ContentBlock::Media(_)));
        assert!(matches!(content.blocks[2], ContentBlock::Link(_)));
        assert_eq!(content.layout.len(), 3);
        assert_eq!(
            content.layout[1][0].block_id(),
            Some(content.blocks[1].id())
        );
    }

    #[test]
    fn analyzed_media_carries_facts_and_paths() {
        let fx = Fixture::new();
        write_work(
            fx.root(),
            "lamp",
            "![Front view~](photos/./front.png \"The front\")\n",
            &[("photos/front.png", b"png bytes")],
        );
        let analyzer = MockAnalyzer::new().with("front.png", png_facts(400, 300));

        let built = fx.build(&analyzer, false);
        let media = media_blocks(&built.work.localized["default"])[0].clone();
        assert_eq!(media.alt, "Front view");
        assert!(media.attributes.looped);
        assert_eq!(media.title, "The front");
        assert_eq!(media.source, "photos/./front.png");
        assert_eq!(media.relative_source, "photos/front.png");
        assert_eq!(media.dist_source, "media/lamp/photos/front.png");
        assert_eq!(media.content_type, "image/png");
        assert_eq!(media.dimensions.unwrap().width, 400);
        assert_eq!(media.hash.len(), 64);
        assert!(!media.online);

        assert_eq!(
            built.media,
            vec![MediaReport {
                source: "photos/./front.png".into(),
                status: MediaStatus::Analyzed,
                copied: true,
            }]
        );
        let copy = fx.media_dir().join("lamp/photos/front.png");
        assert_eq!(fs::read(copy).unwrap(), b"png bytes");
    }

    #[test]
    fn online_media_is_not_analyzed() {
        let fx = Fixture::new();
        write_work(fx.root(), "clip", "![A clip](https://videos.example/v.mp4)\n", &[]);
        let analyzer = MockAnalyzer::new();

        let built = fx.build(&analyzer, false);
        let media = media_blocks(&built.work.localized["default"])[0].clone();
        assert!(media.online);
        assert_eq!(media.source, "https://videos.example/v.mp4");
        assert!(analyzer.get_calls().is_empty());
        assert_eq!(built.media[0].status, MediaStatus::Online);
    }

    // =========================================================================
    // Duplicates and failures
    // =========================================================================

    #[test]
    fn duplicate_sources_are_analyzed_once() {
        let fx = Fixture::new();
        write_work(
            fx.root(),
            "lamp",
            ":: en\n![English](a.png)\n\n:: fr\n![Français>](./a.png)\n",
            &[("a.png", b"png")],
        );
        let analyzer = MockAnalyzer::new().with("a.png", png_facts(10, 10));

        let built = fx.build(&analyzer, false);
        assert_eq!(analyzer.get_calls(), vec!["a.png"]);
        assert_eq!(built.media.len(), 1);

        let en = media_blocks(&built.work.localized["en"])[0].clone();
        let fr = media_blocks(&built.work.localized["fr"])[0].clone();
        assert_eq!(en.alt, "English");
        assert_eq!(fr.alt, "Français");
        assert!(fr.attributes.autoplay);
        assert!(!en.attributes.autoplay);
        assert_ne!(en.id, fr.id);
        assert_eq!(en.hash, fr.hash);
        assert_eq!(fr.source, "./a.png");
    }

    #[test]
    fn failed_media_is_left_out_and_its_cells_emptied() {
        let fx = Fixture::new();
        write_work(
            fx.root(),
            "lamp",
            "---\nlayout:\n  - [m1, m2]\n  - m1\n---\nText.\n\n![ok](ok.png)\n\n![broken](missing.png)\n",
            &[("ok.png", b"png")],
        );
        let analyzer = MockAnalyzer::new().with("ok.png", png_facts(10, 10));

        let built = fx.build(&analyzer, false);
        let content = &built.work.localized["default"];
        assert_eq!(media_blocks(content).len(), 1);
        assert_eq!(content.blocks.len(), 2);

        let ok_id = media_blocks(content)[0].id.clone();
        assert_eq!(
            content.layout[0],
            vec![LayoutCell::block(ok_id.as_str()), LayoutCell::empty()]
        );
        assert!(matches!(built.media[1].status, MediaStatus::Failed(_)));
    }

    #[test]
    fn rows_emptied_by_missing_media_are_removed() {
        let fx = Fixture::new();
        write_work(fx.root(), "lamp", "Text.\n\n![broken](missing.png)\n", &[]);
        let analyzer = MockAnalyzer::new();

        let built = fx.build(&analyzer, false);
        let content = &built.work.localized["default"];
        assert_eq!(content.layout.len(), 1);
        assert_eq!(content.layout[0][0].block_id(), Some(content.blocks[0].id()));
    }

    #[test]
    fn unknown_layout_reference_fails_the_work() {
        let fx = Fixture::new();
        write_work(fx.root(), "lamp", "---\nlayout: [p9]\n---\nText.\n", &[]);
        let works = scan::scan(fx.root(), DescriptionLocation::Direct).unwrap();
        let media_dir = fx.media_dir();
        let analyzer = MockAnalyzer::new();
        let ctx = WorkContext {
            config: &fx.config,
            analyzer: &analyzer,
            cache: &fx.cache,
            metadata: &fx.metadata,
            media_dir: &media_dir,
            scattered: false,
            id_seed: Some(1),
        };
        let result = build_work(&works[0], &ctx);
        assert!(matches!(
            result,
            Err(WorkError::Layout(LayoutError::UnknownBlock { .. }))
        ));
    }

    // =========================================================================
    // Cache and copies
    // =========================================================================

    #[test]
    fn cached_analysis_skips_the_analyzer() {
        let mut fx = Fixture::new();
        write_work(fx.root(), "lamp", "![a](a.png)\n", &[("a.png", b"png")]);
        let analyzer = MockAnalyzer::new().with("a.png", png_facts(10, 10));
        let first = fx.build(&analyzer, false);

        let mut database = crate::types::Database::new();
        database.insert("lamp".into(), first.work);
        fx.cache = AnalysisCache::from_database(&database);
        let second = fx.build(&analyzer, false);

        assert_eq!(analyzer.get_calls().len(), 1);
        assert_eq!(second.stats.hits, 1);
        assert_eq!(second.media[0].status, MediaStatus::Cached);
        let media = media_blocks(&second.work.localized["default"])[0].clone();
        assert_eq!(media.dimensions.unwrap().height, 10);
    }

    #[test]
    fn fresh_copies_are_not_copied_again() {
        let mut fx = Fixture::new();
        write_work(fx.root(), "lamp", "![a](a.png)\n", &[("a.png", b"png")]);
        let analyzer = MockAnalyzer::new().with("a.png", png_facts(10, 10));
        assert!(fx.build(&analyzer, false).media[0].copied);

        fx.metadata = BuildMetadata::default().advanced(Utc::now() + TimeDelta::hours(1));
        let again = fx.build(&analyzer, false);
        assert!(!again.media[0].copied);
        assert_eq!(again.stats.copies, 0);
    }

    #[test]
    fn scattered_mode_resolves_media_in_subfolder() {
        let fx = Fixture::new();
        write_work(
            fx.root(),
            "chair",
            "![render](render.png)\n",
            &[],
        );
        // move the description into the scattered folder
        let work_dir = fx.root().join("chair");
        let scattered = work_dir.join(".workbase");
        fs::create_dir_all(&scattered).unwrap();
        fs::rename(work_dir.join("description.md"), scattered.join("description.md")).unwrap();
        fs::write(scattered.join("render.png"), b"png").unwrap();
        let analyzer = MockAnalyzer::new().with("render.png", png_facts(10, 10));

        let built = fx.build(&analyzer, true);
        let media = media_blocks(&built.work.localized["default"])[0].clone();
        assert_eq!(media.relative_source, ".workbase/render.png");
        assert_eq!(media.dist_source, "media/chair/.workbase/render.png");
        assert!(fx.media_dir().join("chair/.workbase/render.png").exists());
    }

    // =========================================================================
    // Colors
    // =========================================================================

    #[test]
    fn colors_come_from_first_media_by_default() {
        let fx = Fixture::new();
        write_work(fx.root(), "lamp", "![a](a.png)\n", &[("a.png", b"png")]);
        let analyzer = MockAnalyzer::new().with("a.png", png_facts(10, 10));

        let built = fx.build(&analyzer, false);
        assert_eq!(built.work.metadata.colors.primary, "#102030");
    }

    #[test]
    fn colors_come_from_thumbnail_media() {
        let fx = Fixture::new();
        write_work(
            fx.root(),
            "lamp",
            "---\nthumbnail: b.png\n---\n![a](a.png)\n\n![b](b.png)\n",
            &[("a.png", b"a"), ("b.png", b"b")],
        );
        let mut b_facts = png_facts(10, 10);
        b_facts.colors.primary = "#abcdef".into();
        let analyzer = MockAnalyzer::new()
            .with("a.png", png_facts(10, 10))
            .with("b.png", b_facts);

        let built = fx.build(&analyzer, false);
        assert_eq!(built.work.metadata.colors.primary, "#abcdef");
    }

    #[test]
    fn declared_colors_are_kept() {
        let fx = Fixture::new();
        write_work(
            fx.root(),
            "lamp",
            "---\ncolors:\n  primary: \"#000000\"\n---\n![a](a.png)\n",
            &[("a.png", b"png")],
        );
        let analyzer = MockAnalyzer::new().with("a.png", png_facts(10, 10));

        let built = fx.build(&analyzer, false);
        assert_eq!(built.work.metadata.colors.primary, "#000000");
    }

    // =========================================================================
    // Path helpers
    // =========================================================================

    #[test]
    fn relative_source_normalizes() {
        assert_eq!(relative_source("a/./b/../c.png", None), "a/c.png");
        assert_eq!(relative_source("c.png", Some(".workbase")), ".workbase/c.png");
        assert_eq!(relative_source("../../x.png", None), "_up/_up/x.png");
        assert_eq!(relative_source("a/../../x.png", None), "_up/x.png");
        assert_eq!(relative_source(".workbase/../x.png", None), "x.png");
        assert_eq!(relative_source("../x.png", Some(".workbase")), "x.png");
        assert_eq!(relative_source("/abs/dir/y.png", None), "_abs/abs/dir/y.png");
    }

    #[test]
    fn sources_outside_the_work_get_their_own_copies() {
        let fx = Fixture::new();
        write_work(
            fx.root(),
            "lamp",
            "![inside](x.png)\n\n![outside](../x.png)\n",
            &[("x.png", b"inside")],
        );
        fs::write(fx.root().join("x.png"), b"outside").unwrap();
        let analyzer = MockAnalyzer::new().with("x.png", png_facts(10, 10));

        let built = fx.build(&analyzer, false);
        let media = media_blocks(&built.work.localized["default"]);
        assert_eq!(media[0].dist_source, "media/lamp/x.png");
        assert_eq!(media[1].dist_source, "media/lamp/_up/x.png");
        assert_eq!(fs::read(fx.media_dir().join("lamp/x.png")).unwrap(), b"inside");
        assert_eq!(fs::read(fx.media_dir().join("lamp/_up/x.png")).unwrap(), b"outside");
    }

    #[test]
    fn clean_path_resolves_dots() {
        assert_eq!(
            clean_path(Path::new("/db/work/./a/../b.png")),
            PathBuf::from("/db/work/b.png")
        );
    }
}
