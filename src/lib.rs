//! # Workbase
//!
//! Builds a localized JSON content database from a directory of works.
//! Each work is a folder with a `description.md`: a YAML header, then
//! markdown, optionally split into languages with `:: lang` lines. Media
//! embedded in the description are analyzed and copied next to the database.
//!
//! # Architecture: Parse, Resolve, Build
//!
//! ```text
//! 1. Parse     description.md  →  ParsedWork      (header, languages, blocks)
//! 2. Resolve   ParsedWork      →  layout grid     (per language)
//! 3. Build     database dir    →  database.json   (media, cache, lock)
//! ```
//!
//! Parsing is pure: it never touches the filesystem, so the whole description
//! pipeline is testable from strings. Only the build stage reads media,
//! writes files and holds the lock.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`description`] | Description documents: header, languages, markup, blocks, abbreviations |
//! | [`layout`] | Projects a language's blocks onto the declared (or default) grid |
//! | [`database`] | Build orchestration: include patterns, carry-over, output, events |
//! | [`work`] | Builds one work: media resolution, analysis, copies, assembly |
//! | [`scan`] | Finds the works of a database directory |
//! | [`cache`] | Build metadata, content-addressed analysis cache, atomic writes |
//! | [`lock`] | Inter-process build lock |
//! | [`media`] | Media analysis: content type, dimensions, duration, colors |
//! | [`config`] | `workbase.toml` loading, merging and validation |
//! | [`types`] | Database types shared by every stage |
//! | [`slug`] | Anchors and heading ids |
//! | [`output`] | CLI output formatting for build progress |
//!
//! # Design Decisions
//!
//! ## Block Ids From the Description
//!
//! Every content block gets a short id (8 characters of the nanoid
//! alphabet) drawn from a generator seeded with the SHA-256 of the work's
//! description. Rebuilding an unchanged description yields the same ids;
//! editing it reshuffles them, so renderers address blocks through the
//! layout, or through anchors for links. Tests can pin one seed for every
//! work ([`database::BuildOptions::id_seed`]).
//!
//! ## Markdown Through a Small DOM
//!
//! Markdown is rendered with `pulldown-cmark` into a minimal element tree
//! rather than an HTML string. Classification (media, link, paragraph) and
//! footnote extraction are then tree walks instead of HTML parsing.
//!
//! ## Content-Addressed Cache
//!
//! Media analysis is keyed by the SHA-256 of the file. Renames and
//! `git checkout` keep cached analyses; edits invalidate them. The previous
//! database is the cache, so there is no separate cache file to get out of
//! sync.

pub mod cache;
pub mod config;
pub mod database;
pub mod description;
pub mod layout;
pub mod lock;
pub mod media;
pub mod output;
pub mod scan;
pub mod slug;
pub mod types;
pub mod work;

#[cfg(test)]
pub(crate) mod test_helpers;
