//! Feed building: turn entries HTML, a release descriptor and a blocklist
//! fragment into one Atom document.
//!
//! - [`escape`] - XML text/attribute escaping and the character and name rules
//! - [`locale`] - locale tags from `entries.<loc>.html` names
//! - [`entries`] - HTML entries parser
//! - [`release`] - `releases.json` decoder
//! - [`blocklist`] - blocklist fragment validation
//! - [`atom`] - document assembly

pub mod atom;
pub mod blocklist;
pub mod entries;
pub mod escape;
pub mod locale;
pub mod release;

use std::path::PathBuf;

use time::OffsetDateTime;
use tracing::debug;

use crate::error::Result;
use self::blocklist::read_blocklist;
use self::entries::read_entries;
use self::release::read_release;

/// Inputs for one feed document.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// UUID rendered as `urn:uuid:<urn_id>`.
    pub urn_id: String,
    /// Feed title; empty falls back to the entries `<header>` text.
    pub title: String,
    pub subtitle: String,
    pub site_url: String,
    pub main_feed_url: String,
    pub backup_feed_url: Option<String>,
    /// BCP 47 tag; empty means `en`.
    pub language: String,
    pub entries_path: PathBuf,
    /// Canonical entries merged after `entries_path`.
    pub base_entries_path: Option<PathBuf>,
    pub releases_path: PathBuf,
    pub blocklist_path: Option<PathBuf>,
    pub generation_time: OffsetDateTime,
}

/// Read every input named by `config` and assemble the feed.
pub fn build_feed(config: &FeedConfig) -> Result<Vec<u8>> {
    let mut document = read_entries(&config.entries_path)?;
    if let Some(base) = &config.base_entries_path {
        document = document.merge_overlay(read_entries(base)?);
    }
    let release = read_release(&config.releases_path)?;
    let blocklist = read_blocklist(config.blocklist_path.as_deref())?;

    debug!(
        entries = %config.entries_path.display(),
        articles = document.articles.len(),
        language = %config.language,
        "assembling feed"
    );
    let xml = atom::render_feed(config, &document, &release.to_xml(), &blocklist)?;
    Ok(xml.into_bytes())
}
