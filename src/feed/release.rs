//! Decoder for `releases.json` and the `<i2p:release>` fragment it feeds.
//!
//! The file is an array of release objects; only the first (newest) one is
//! advertised:
//!
//! ```json
//! [{
//!   "date": "2022-11-21",
//!   "version": "2.0.0",
//!   "minVersion": "0.9.9",
//!   "minJavaVersion": "1.8",
//!   "updates": { "su3": { "torrent": "magnet:?...", "url": ["http://..."] } }
//! }]
//! ```

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{FeedError, Result};
use crate::feed::escape::escape;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub date: String,
    pub version: String,
    pub min_version: String,
    pub min_java_version: String,
    pub torrent_uri: String,
    pub update_urls: Vec<String>,
}

pub fn read_release(path: &Path) -> Result<Release> {
    let bytes = fs::read(path).map_err(|e| FeedError::read("reading releases JSON", path, e))?;
    decode_release(&bytes).map_err(|err| match err {
        FeedError::Release(detail) => FeedError::Release(format!("'{}': {detail}", path.display())),
        other => other,
    })
}

pub fn decode_release(bytes: &[u8]) -> Result<Release> {
    let root: Value = serde_json::from_slice(bytes)
        .map_err(|e| FeedError::Release(format!("invalid JSON: {e}")))?;
    let releases = root
        .as_array()
        .ok_or_else(|| FeedError::Release("top-level value must be an array".to_string()))?;
    let first = releases
        .first()
        .ok_or_else(|| FeedError::Release("release array is empty".to_string()))?;
    let release = first
        .as_object()
        .ok_or_else(|| FeedError::Release("release [0] must be an object".to_string()))?;

    let su3 = req_object(release, "updates", "updates")?;
    let su3 = req_object(su3, "su3", "updates.su3")?;

    let urls = su3
        .get("url")
        .ok_or_else(|| missing("updates.su3.url"))?
        .as_array()
        .ok_or_else(|| wrong_type("updates.su3.url", "an array of strings"))?;
    if urls.is_empty() {
        return Err(FeedError::Release(
            "field \"updates.su3.url\" must not be empty".to_string(),
        ));
    }
    let update_urls = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            url.as_str()
                .map(str::to_string)
                .ok_or_else(|| wrong_type(&format!("updates.su3.url[{i}]"), "a string"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Release {
        date: req_str(release, "date", "date")?,
        version: req_str(release, "version", "version")?,
        min_version: req_str(release, "minVersion", "minVersion")?,
        min_java_version: req_str(release, "minJavaVersion", "minJavaVersion")?,
        torrent_uri: req_str(su3, "torrent", "updates.su3.torrent")?,
        update_urls,
    })
}

fn missing(field: &str) -> FeedError {
    FeedError::Release(format!("missing field \"{field}\""))
}

fn wrong_type(field: &str, expected: &str) -> FeedError {
    FeedError::Release(format!("field \"{field}\" must be {expected}"))
}

fn req_str(map: &Map<String, Value>, key: &str, field: &str) -> Result<String> {
    map.get(key)
        .ok_or_else(|| missing(field))?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| wrong_type(field, "a string"))
}

fn req_object<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<&'a Map<String, Value>> {
    map.get(key)
        .ok_or_else(|| missing(field))?
        .as_object()
        .ok_or_else(|| wrong_type(field, "an object"))
}

impl Release {
    /// Render the `<i2p:release>` element, every value escaped.
    pub fn to_xml(&self) -> String {
        let mut out = format!(
            "<i2p:release date=\"{}\" minVersion=\"{}\" minJavaVersion=\"{}\">\n",
            escape(&self.date),
            escape(&self.min_version),
            escape(&self.min_java_version)
        );
        out.push_str(&format!(
            "  <i2p:version>{}</i2p:version>\n",
            escape(&self.version)
        ));
        out.push_str("  <i2p:update type=\"su3\">\n");
        out.push_str(&format!(
            "    <i2p:torrent href=\"{}\"/>\n",
            escape(&self.torrent_uri)
        ));
        for url in &self.update_urls {
            out.push_str(&format!("    <i2p:url href=\"{}\"/>\n", escape(url)));
        }
        out.push_str("  </i2p:update>\n");
        out.push_str("</i2p:release>");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"[{
        "date": "2022-11-21",
        "version": "2.0.0",
        "minVersion": "0.9.9",
        "minJavaVersion": "1.8",
        "updates": {"su3": {
            "torrent": "magnet:?xt=urn:btih:abc123",
            "url": ["http://stats.i2p/i2p/i2pupdate.su3", "http://example.b32.i2p/i2pupdate.su3"]
        }}
    }, {"date": "older"}]"#;

    fn decode_err(json: &str) -> String {
        decode_release(json.as_bytes()).unwrap_err().to_string()
    }

    #[test]
    fn decodes_first_release() {
        let release = decode_release(VALID.as_bytes()).unwrap();
        assert_eq!(release.date, "2022-11-21");
        assert_eq!(release.version, "2.0.0");
        assert_eq!(release.min_version, "0.9.9");
        assert_eq!(release.min_java_version, "1.8");
        assert_eq!(release.torrent_uri, "magnet:?xt=urn:btih:abc123");
        assert_eq!(release.update_urls.len(), 2);
    }

    #[test]
    fn renders_escaped_fragment() {
        let release = decode_release(VALID.as_bytes()).unwrap();
        let xml = release.to_xml();
        assert!(xml.starts_with(
            r#"<i2p:release date="2022-11-21" minVersion="0.9.9" minJavaVersion="1.8">"#
        ));
        assert!(xml.contains("<i2p:version>2.0.0</i2p:version>"));
        assert!(xml.contains(r#"<i2p:torrent href="magnet:?xt=urn:btih:abc123"/>"#));
        assert!(xml.contains(r#"<i2p:url href="http://stats.i2p/i2p/i2pupdate.su3"/>"#));
        assert!(xml.ends_with("</i2p:release>"));

        let tricky = Release {
            torrent_uri: "magnet:?a=1&b=2".into(),
            ..release
        };
        assert!(tricky.to_xml().contains("magnet:?a=1&amp;b=2"));
    }

    #[test]
    fn names_missing_nested_field() {
        let err = decode_err(
            r#"[{"date":"d","version":"v","minVersion":"m","minJavaVersion":"j",
                "updates":{"su3":{"torrent":"t"}}}]"#,
        );
        assert!(err.contains(r#"missing field "updates.su3.url""#), "{err}");
    }

    #[test]
    fn names_missing_top_level_field() {
        let err = decode_err(
            r#"[{"date":"d","minVersion":"m","minJavaVersion":"j",
                "updates":{"su3":{"torrent":"t","url":["u"]}}}]"#,
        );
        assert!(err.contains(r#"missing field "version""#), "{err}");
    }

    #[test]
    fn rejects_wrong_types_without_panicking() {
        let err = decode_err(
            r#"[{"date":5,"version":"v","minVersion":"m","minJavaVersion":"j",
                "updates":{"su3":{"torrent":"t","url":["u"]}}}]"#,
        );
        assert!(err.contains(r#"field "date" must be a string"#), "{err}");

        let err = decode_err(
            r#"[{"date":"d","version":"v","minVersion":"m","minJavaVersion":"j",
                "updates":{"su3":{"torrent":"t","url":"u"}}}]"#,
        );
        assert!(err.contains("updates.su3.url"), "{err}");

        let err = decode_err(
            r#"[{"date":"d","version":"v","minVersion":"m","minJavaVersion":"j",
                "updates":{"su3":{"torrent":"t","url":["u", 7]}}}]"#,
        );
        assert!(err.contains("updates.su3.url[1]"), "{err}");

        assert!(decode_err(r#"{"date":"d"}"#).contains("array"));
        assert!(decode_err("[1]").contains("object"));
        assert!(decode_err("not json").contains("invalid JSON"));
    }

    #[test]
    fn rejects_empty_arrays() {
        assert!(decode_err("[]").contains("empty"));
        let err = decode_err(
            r#"[{"date":"d","version":"v","minVersion":"m","minJavaVersion":"j",
                "updates":{"su3":{"torrent":"t","url":[]}}}]"#,
        );
        assert!(err.contains("must not be empty"), "{err}");
    }
}
