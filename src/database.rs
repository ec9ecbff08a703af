//! Database build orchestration.
//!
//! A build turns a database directory into one JSON file:
//!
//! ```text
//! Preparing        previous database, build metadata, media directory
//!     │
//! AcquiringLock    .workbase-build-lock beside the output (fails if held)
//!     │
//! Iterating        scan works; include → build, known → carry over, else skip
//!     │
//! Writing          JSON (pretty or minified) to file or stdout, then metadata
//!     │
//! Released         lock removed when the guard drops
//! ```
//!
//! ## Incremental builds
//!
//! The previous output is read back before anything else. Works excluded by
//! `--include` keep their previous entry unchanged, and the media of the
//! previous database seed the [`AnalysisCache`]. Both are read-only: the
//! freshly built map is the only thing written.
//!
//! A failing work is logged and left out of the output. It never fails the
//! build; only problems with the database as a whole do (held lock, bad
//! include pattern, unwritable output).
//!
//! ## Progress
//!
//! When given a sender, the build reports [`BuildEvent`]s as it goes. The
//! CLI prints them from a separate thread; see [`crate::output`].

use crate::cache::{self, AnalysisCache, BuildMetadata, CacheStats};
use crate::config::{Config, ConfigError};
use crate::lock::{self, BuildLock, LockError};
use crate::media::MediaAnalyzer;
use crate::scan::{self, DescriptionLocation, ScanError};
use crate::types::Database;
use crate::work::{self, MediaReport, WorkContext};
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Output path meaning "write to stdout".
pub const STDOUT: &str = "-";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("another build is in progress (remove {} if it is not)", .0.display())]
    BuildInProgress(PathBuf),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Invalid include pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("Cannot create media directory {}: {source}", path.display())]
    MediaDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<LockError> for BuildError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::InProgress(path) => Self::BuildInProgress(path),
            LockError::Io(e) => Self::Io(e),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Glob over work ids; `None` builds every work.
    pub include: Option<String>,
    /// Descriptions live in the scattered-mode folder of each work.
    pub scattered: bool,
    pub minified: bool,
    /// Analyze every media file again.
    pub no_cache: bool,
    /// One block id seed for every work, instead of seeds derived from
    /// each description.
    pub id_seed: Option<u64>,
}

/// Build progress, in the order it happens.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    Started {
        total: usize,
    },
    WorkBuilt {
        index: usize,
        id: String,
        title: String,
        media: Vec<MediaReport>,
    },
    WorkCarriedOver {
        index: usize,
        id: String,
    },
    WorkSkipped {
        index: usize,
        id: String,
    },
    WorkFailed {
        index: usize,
        id: String,
        error: String,
    },
}

/// What a finished build did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildSummary {
    pub built: usize,
    pub carried_over: usize,
    pub skipped: usize,
    pub failed: usize,
    pub stats: CacheStats,
    /// Recorded in the build metadata.
    pub build_date: Option<DateTime<Utc>>,
}

impl BuildSummary {
    pub fn written(&self) -> usize {
        self.built + self.carried_over
    }
}

/// Build the database at `database_root` into `output` (`-` for stdout).
pub fn build(
    database_root: &Path,
    output: &Path,
    config: &Config,
    options: &BuildOptions,
    analyzer: &dyn MediaAnalyzer,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildSummary, BuildError> {
    config.validate()?;
    let include = options
        .include
        .as_deref()
        .map(|pattern| {
            glob::Pattern::new(pattern).map_err(|source| BuildError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
        })
        .transpose()?;

    // Preparing
    let previous = load_previous_database(output);
    let metadata_path = config.build_metadata_path(database_root);
    let metadata = BuildMetadata::load(&metadata_path);
    let media_dir = config.media_dir(database_root);
    std::fs::create_dir_all(&media_dir).map_err(|source| BuildError::MediaDir {
        path: media_dir.clone(),
        source,
    })?;
    if output != Path::new(STDOUT)
        && let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent).map_err(|source| BuildError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    // AcquiringLock
    let lock = BuildLock::acquire(
        lock::lock_path(output, database_root),
        config.stale_lock_after(),
    )?;
    tracing::debug!(lock = %lock.path().display(), "Acquired build lock");

    // Iterating
    let location = if options.scattered {
        DescriptionLocation::Scattered(&config.scattered_mode_folder)
    } else {
        DescriptionLocation::Direct
    };
    let works = scan::scan(database_root, location)?;
    emit(&events, BuildEvent::Started { total: works.len() });

    let cache = if options.no_cache {
        AnalysisCache::empty()
    } else {
        AnalysisCache::from_database(&previous)
    };
    let ctx = WorkContext {
        config,
        analyzer,
        cache: &cache,
        metadata: &metadata,
        media_dir: &media_dir,
        scattered: options.scattered,
        id_seed: options.id_seed,
    };

    let mut database = Database::new();
    let mut summary = BuildSummary::default();
    for (position, source) in works.iter().enumerate() {
        let index = position + 1;
        let included = include
            .as_ref()
            .is_none_or(|pattern| pattern.matches(&source.id));

        if included {
            match work::build_work(source, &ctx) {
                Ok(built) => {
                    summary.built += 1;
                    summary.stats.add(built.stats);
                    emit(
                        &events,
                        BuildEvent::WorkBuilt {
                            index,
                            id: source.id.clone(),
                            title: display_title(&built.work),
                            media: built.media,
                        },
                    );
                    database.insert(source.id.clone(), built.work);
                }
                Err(e) => {
                    tracing::warn!(work = %source.id, error = %e, "Leaving out work that failed to build");
                    summary.failed += 1;
                    emit(
                        &events,
                        BuildEvent::WorkFailed {
                            index,
                            id: source.id.clone(),
                            error: e.to_string(),
                        },
                    );
                }
            }
        } else if let Some(old) = previous.get(&source.id) {
            summary.carried_over += 1;
            database.insert(source.id.clone(), old.clone());
            emit(
                &events,
                BuildEvent::WorkCarriedOver {
                    index,
                    id: source.id.clone(),
                },
            );
        } else {
            tracing::info!(
                work = %source.id,
                "Skipped work: neither included nor present in the previous database"
            );
            summary.skipped += 1;
            emit(
                &events,
                BuildEvent::WorkSkipped {
                    index,
                    id: source.id.clone(),
                },
            );
        }
    }

    // Writing
    write_database(&database, output, options.minified)?;
    let next = metadata.advanced(Utc::now());
    next.save(&metadata_path)
        .map_err(|source| BuildError::Write {
            path: metadata_path.clone(),
            source,
        })?;
    summary.build_date = next.previous_build_date;

    // Released
    drop(lock);
    Ok(summary)
}

fn emit(events: &Option<Sender<BuildEvent>>, event: BuildEvent) {
    if let Some(tx) = events {
        // A closed receiver only means nobody is watching.
        tx.send(event).ok();
    }
}

fn display_title(work: &crate::types::AnalyzedWork) -> String {
    work.localized
        .values()
        .map(|content| crate::slug::strip_tags(&content.title))
        .find(|title| !title.trim().is_empty())
        .unwrap_or_default()
}

/// The database written by the previous build, or an empty one.
pub fn load_previous_database(output: &Path) -> Database {
    if output == Path::new(STDOUT) {
        return Database::new();
    }
    let raw = match std::fs::read_to_string(output) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(path = %output.display(), "No previous database, building from scratch");
            return Database::new();
        }
        Err(e) => {
            tracing::warn!(path = %output.display(), error = %e, "Could not read previous database");
            return Database::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(database) => database,
        Err(e) => {
            tracing::warn!(path = %output.display(), error = %e, "Ignoring unparsable previous database");
            Database::new()
        }
    }
}

/// Serialize `database` to `output`, atomically, or to stdout for `-`.
pub fn write_database(database: &Database, output: &Path, minified: bool) -> Result<(), BuildError> {
    let mut json = if minified {
        serde_json::to_string(database)?
    } else {
        serde_json::to_string_pretty(database)?
    };
    json.push('\n');

    if output == Path::new(STDOUT) {
        let mut stdout = io::stdout().lock();
        stdout.write_all(json.as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }
    cache::write_atomic(output, json.as_bytes()).map_err(|source| BuildError::Write {
        path: output.to_path_buf(),
        source,
    })
}
