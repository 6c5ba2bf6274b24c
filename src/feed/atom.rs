//! Atom document assembly.
//!
//! The document is written with a fixed two-space layout and is never
//! re-flowed afterwards, so article bodies and the blocklist fragment reach
//! the output exactly as they were handed in.

use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::error::{FeedError, Result};
use crate::feed::blocklist::I2P_NAMESPACE;
use crate::feed::entries::{Article, EntriesDocument};
use crate::feed::escape::escape;
use crate::feed::locale::DEFAULT_LOCALE;
use crate::feed::FeedConfig;

const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";
const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
const GENERATOR: &str =
    r#"<generator uri="http://idk.i2p/newsgo" version="0.1.0">newsgo</generator>"#;

/// Render `time` as `YYYY-MM-DDThh:mm:ss.mmm+00:00` after normalizing to UTC.
pub fn format_updated(time: OffsetDateTime) -> Result<String> {
    time.to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]+00:00"
        ))
        .map_err(|e| FeedError::Render(format!("formatting timestamp: {e}")))
}

/// Assemble the feed document.
///
/// `release_xml` and `blocklist` are trusted fragments: the release comes from
/// [`Release::to_xml`](crate::feed::release::Release::to_xml) and the blocklist
/// has been through [`validate_blocklist`](crate::feed::blocklist::validate_blocklist).
pub fn render_feed(
    config: &FeedConfig,
    entries: &EntriesDocument,
    release_xml: &str,
    blocklist: &str,
) -> Result<String> {
    let language = if config.language.is_empty() {
        DEFAULT_LOCALE
    } else {
        config.language.as_str()
    };
    let title = if config.title.is_empty() {
        entries.header_title.as_str()
    } else {
        config.title.as_str()
    };
    let updated = format_updated(config.generation_time)?;

    let mut out = String::with_capacity(4096);
    out.push_str("<?xml version='1.0' encoding='UTF-8'?>\n");
    out.push_str(&format!(
        "<feed xmlns:i2p=\"{I2P_NAMESPACE}\" xmlns=\"{ATOM_NAMESPACE}\" xml:lang=\"{}\">\n",
        escape(language)
    ));
    out.push_str(&format!("  <id>urn:uuid:{}</id>\n", escape(&config.urn_id)));
    out.push_str(&format!("  <title>{}</title>\n", escape(title)));
    out.push_str(&format!("  <updated>{updated}</updated>\n"));
    out.push_str(&format!("  <link href=\"{}\"/>\n", escape(&config.site_url)));
    out.push_str(&format!(
        "  <link href=\"{}\" rel=\"self\"/>\n",
        escape(&config.main_feed_url)
    ));
    if let Some(backup) = config.backup_feed_url.as_deref().filter(|url| !url.is_empty()) {
        out.push_str(&format!(
            "  <link href=\"{}\" rel=\"alternate\"/>\n",
            escape(backup)
        ));
    }
    out.push_str(&format!("  {GENERATOR}\n"));
    out.push_str(&format!("  <subtitle>{}</subtitle>\n", escape(&config.subtitle)));

    if !blocklist.trim().is_empty() {
        out.push_str(blocklist.trim_end());
        out.push('\n');
    }

    for line in release_xml.lines() {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }

    for article in &entries.articles {
        write_entry(&mut out, article);
    }

    out.push_str("</feed>\n");
    Ok(out)
}

fn write_entry(out: &mut String, article: &Article) {
    out.push_str("  <entry>\n");
    out.push_str(&format!("    <id>{}</id>\n", escape(&article.uid)));
    out.push_str(&format!("    <title>{}</title>\n", escape(&article.title)));
    out.push_str(&format!("    <updated>{}</updated>\n", escape(&article.updated)));
    out.push_str(&format!(
        "    <author><name>{}</name></author>\n",
        escape(&article.author)
    ));
    out.push_str(&format!(
        "    <link href=\"{}\" rel=\"alternate\"/>\n",
        escape(&article.link)
    ));
    out.push_str(&format!(
        "    <published>{}</published>\n",
        escape(&article.published)
    ));
    out.push_str(&format!("    <summary>{}</summary>\n", escape(&article.summary)));
    out.push_str("    <content type=\"xhtml\">\n");
    out.push_str(&format!("      <div xmlns=\"{XHTML_NAMESPACE}\">\n"));
    out.push_str(&article.body_xhtml);
    out.push_str("\n      </div>\n");
    out.push_str("    </content>\n");
    out.push_str("  </entry>\n");
}
