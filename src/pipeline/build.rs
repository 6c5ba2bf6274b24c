//! Build driver: every target × every entries file → one `.atom.xml`.

use std::fs;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ErrorKind, FeedError, Result};
use crate::feed::locale::{locale_from_path, DEFAULT_LOCALE};
use crate::feed::{build_feed, FeedConfig};
use crate::pipeline::matrix::Target;
use crate::pipeline::paths::{resolve_sources, Resolution, ResolvedSources, SkipReason, SourceLayout};

/// Feed-level metadata shared by every document of a build.
#[derive(Debug, Clone, Default)]
pub struct FeedMetadata {
    pub title: String,
    pub subtitle: String,
    pub site_url: String,
    pub main_feed_url: String,
    pub backup_feed_url: Option<String>,
    /// Fixed feed UUID; `None` generates one per document.
    pub urn_id: Option<String>,
    /// Explicit language for the canonical feed. Translations always use the
    /// locale in their file name.
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub layout: SourceLayout,
    pub build_dir: PathBuf,
    pub targets: Vec<Target>,
    pub metadata: FeedMetadata,
    pub generation_time: OffsetDateTime,
}

#[derive(Debug, Default)]
pub struct BuildSummary {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<(Target, SkipReason)>,
    pub failed: Vec<(PathBuf, FeedError)>,
}

/// Derive `news[_<locale>].atom.xml` from an entries path.
///
/// The path is taken relative to `base`; when that is impossible only the
/// file name is used.
pub fn output_file_name(base: &Path, entries: &Path) -> PathBuf {
    let relative = match entries.strip_prefix(base) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => entries
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("entries.html")),
    };
    let renamed = relative
        .to_string_lossy()
        .replace('\\', "/")
        .replace(".html", ".atom.xml")
        .replace("entries.", "news_")
        .replace("news_atom", "news.atom");
    renamed
        .split('/')
        .filter(|part| !part.is_empty() && *part != "translations")
        .collect()
}

/// Where the feed for `entries` lands inside `build_dir`.
pub fn output_path(build_dir: &Path, sources: &ResolvedSources, data_root: &Path, entries: &Path) -> PathBuf {
    let base = if entries.starts_with(&sources.data_dir) {
        sources.data_dir.as_path()
    } else {
        data_root
    };
    build_dir
        .join(sources.target.relative_dir())
        .join(output_file_name(base, entries))
}

/// Walk the matrix and write every feed.
///
/// Missing or malformed inputs are logged and recorded in the summary; only
/// failures to write the output tree abort the run.
pub fn run_build(options: &BuildOptions) -> Result<BuildSummary> {
    let mut summary = BuildSummary::default();

    for target in &options.targets {
        let sources = match resolve_sources(&options.layout, target) {
            Resolution::Ready(sources) => sources,
            Resolution::Skipped(reason) => {
                summary.skipped.push((target.clone(), reason));
                continue;
            }
        };

        for entries in sources.entries_files() {
            let output = output_path(&options.build_dir, &sources, &options.layout.data_dir, &entries);
            let config = feed_config(options, &sources, &entries);

            let bytes = match build_feed(&config) {
                Ok(bytes) => bytes,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    match err.kind() {
                        ErrorKind::InputAbsent => {
                            warn!(target = %target, entries = %entries.display(), error = %err, "input missing; feed not built")
                        }
                        _ => {
                            warn!(target = %target, entries = %entries.display(), error = %err, "feed build failed")
                        }
                    }
                    summary.failed.push((output, err));
                    continue;
                }
            };

            write_output(&output, &bytes)?;
            info!(
                target = %target,
                language = %config.language,
                path = %output.display(),
                bytes = bytes.len(),
                "wrote feed"
            );
            summary.written.push(output);
        }
    }

    info!(
        written = summary.written.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        "build finished"
    );
    Ok(summary)
}

fn feed_config(options: &BuildOptions, sources: &ResolvedSources, entries: &Path) -> FeedConfig {
    let meta = &options.metadata;
    let path_locale = locale_from_path(entries);
    let language = match &meta.language {
        Some(explicit) if path_locale == DEFAULT_LOCALE && !explicit.is_empty() => explicit.clone(),
        _ => path_locale,
    };
    let urn_id = meta
        .urn_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    FeedConfig {
        urn_id,
        title: meta.title.clone(),
        subtitle: meta.subtitle.clone(),
        site_url: meta.site_url.clone(),
        main_feed_url: meta.main_feed_url.clone(),
        backup_feed_url: meta.backup_feed_url.clone(),
        language,
        entries_path: entries.to_path_buf(),
        base_entries_path: sources.base_entries_for(entries),
        releases_path: sources.releases.clone(),
        blocklist_path: sources.blocklist.clone(),
        generation_time: options.generation_time,
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| FeedError::write("creating output directory", parent, e))?;
    }
    fs::write(path, bytes).map_err(|e| FeedError::write("writing feed", path, e))?;
    debug!(path = %path.display(), "output written");
    Ok(())
}
