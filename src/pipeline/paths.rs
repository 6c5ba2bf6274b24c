//! Input path resolution for one build target.
//!
//! A named platform may override any input by placing it under
//! `<root>/<platform>/<channel>/`; whatever it does not override falls back
//! to the global inputs. The default tree only ever reads the global ones.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::feed::locale::detect_translation_files;
use crate::pipeline::matrix::{platform_data_dir, Target};

pub const ENTRIES_FILE: &str = "entries.html";
pub const RELEASES_FILE: &str = "releases.json";
pub const BLOCKLIST_FILE: &str = "blocklist.xml";
pub const TRANSLATIONS_DIR: &str = "translations";

/// Global inputs shared by every target.
#[derive(Debug, Clone)]
pub struct SourceLayout {
    /// Data root holding the canonical `entries.html`.
    pub data_dir: PathBuf,
    /// Global `releases.json`.
    pub release_json: PathBuf,
    /// Global blocklist fragment, if any.
    pub blocklist: Option<PathBuf>,
    /// Translations directory override for the default tree.
    pub translations_dir: Option<PathBuf>,
}

impl SourceLayout {
    pub fn canonical_entries(&self) -> PathBuf {
        self.data_dir.join(ENTRIES_FILE)
    }
}

/// Why a target was not built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The per-platform data directory does not exist.
    NotConfigured(PathBuf),
    /// Neither the per-platform nor the global releases file exists.
    NoReleases(PathBuf),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured(dir) => write!(f, "no data directory at '{}'", dir.display()),
            Self::NoReleases(path) => write!(f, "no releases file (looked for '{}')", path.display()),
        }
    }
}

/// Inputs resolved for one target.
#[derive(Debug, Clone)]
pub struct ResolvedSources {
    pub target: Target,
    pub data_dir: PathBuf,
    pub canonical_entries: PathBuf,
    pub entries: PathBuf,
    pub releases: PathBuf,
    pub blocklist: Option<PathBuf>,
    pub translations_dir: PathBuf,
}

impl ResolvedSources {
    /// The target's entries file followed by every translation, in order.
    pub fn entries_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.entries.clone()];
        files.extend(detect_translation_files(&self.translations_dir));
        files
    }

    /// Any entries file other than the canonical one gets the canonical
    /// articles merged in after its own.
    pub fn base_entries_for(&self, entries: &Path) -> Option<PathBuf> {
        (entries != self.canonical_entries).then(|| self.canonical_entries.clone())
    }
}

pub enum Resolution {
    Ready(ResolvedSources),
    Skipped(SkipReason),
}

pub fn resolve_sources(layout: &SourceLayout, target: &Target) -> Resolution {
    let root = &layout.data_dir;
    let data_dir = platform_data_dir(root, &target.platform, &target.channel);
    let canonical_entries = layout.canonical_entries();

    if target.is_default_tree() {
        if !layout.release_json.is_file() {
            warn!(target = %target, path = %layout.release_json.display(), "releases file missing; skipping");
            return Resolution::Skipped(SkipReason::NoReleases(layout.release_json.clone()));
        }
        return Resolution::Ready(ResolvedSources {
            target: target.clone(),
            data_dir,
            entries: canonical_entries.clone(),
            canonical_entries,
            releases: layout.release_json.clone(),
            blocklist: layout.blocklist.clone(),
            translations_dir: layout
                .translations_dir
                .clone()
                .unwrap_or_else(|| root.join(TRANSLATIONS_DIR)),
        });
    }

    if !data_dir.is_dir() {
        debug!(target = %target, dir = %data_dir.display(), "platform not configured; skipping");
        return Resolution::Skipped(SkipReason::NotConfigured(data_dir));
    }

    let local_releases = data_dir.join(RELEASES_FILE);
    let releases = if local_releases.is_file() {
        local_releases
    } else if layout.release_json.is_file() {
        layout.release_json.clone()
    } else {
        warn!(target = %target, path = %local_releases.display(), "no releases file for platform; skipping");
        return Resolution::Skipped(SkipReason::NoReleases(local_releases));
    };

    let local_blocklist = data_dir.join(BLOCKLIST_FILE);
    let blocklist = if local_blocklist.is_file() {
        Some(local_blocklist)
    } else {
        layout.blocklist.clone()
    };

    let local_entries = data_dir.join(ENTRIES_FILE);
    let entries = if local_entries.is_file() {
        local_entries
    } else {
        canonical_entries.clone()
    };

    let local_translations = data_dir.join(TRANSLATIONS_DIR);
    let translations_dir = if local_translations.is_dir() {
        local_translations
    } else {
        root.join(TRANSLATIONS_DIR)
    };

    Resolution::Ready(ResolvedSources {
        target: target.clone(),
        data_dir,
        canonical_entries,
        entries,
        releases,
        blocklist,
        translations_dir,
    })
}
