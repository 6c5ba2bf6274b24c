//! Locale discovery for translated entries files.
//!
//! Translations are named `entries.<locale>.html`, with `_` standing in for
//! the BCP 47 subtag separator (`entries.pt_BR.html`).

use std::fs;
use std::path::{Path, PathBuf};

use language_tags::LanguageTag;
use tracing::debug;

pub const DEFAULT_LOCALE: &str = "en";

/// Split a base name into `(prefix, locale, suffix)` if it has exactly three
/// dot-separated segments.
fn split_entries_name(name: &str) -> Option<(&str, &str, &str)> {
    let mut parts = name.split('.');
    let prefix = parts.next()?;
    let locale = parts.next()?;
    let suffix = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((prefix, locale, suffix))
}

fn translation_locale(name: &str) -> Option<&str> {
    match split_entries_name(name)? {
        ("entries", locale, "html") if !locale.is_empty() => Some(locale),
        _ => None,
    }
}

/// Derive a BCP 47 tag from an entries file path.
///
/// Anything that is not `entries.<loc>.html` is the canonical feed and maps
/// to `en`. A locale that fails BCP 47 validation is still returned in its
/// hyphenated form.
pub fn locale_from_path(path: &Path) -> String {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return DEFAULT_LOCALE.to_string();
    };
    let Some(locale) = translation_locale(name) else {
        return DEFAULT_LOCALE.to_string();
    };
    let raw = locale.replace('_', "-");

    match LanguageTag::parse(&raw) {
        Ok(tag) => tag.as_str().to_string(),
        Err(err) => {
            debug!(locale = %raw, error = %err, "locale is not a valid BCP 47 tag; using it as-is");
            raw
        }
    }
}

/// List translation files directly inside `dir`, sorted by path.
///
/// A missing or unreadable directory has no translations.
pub fn detect_translation_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "no translations directory");
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if translation_locale(name).is_some() {
            files.push(path);
        }
    }
    files.sort();
    files
}
