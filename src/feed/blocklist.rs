//! Blocklist fragment validation.
//!
//! The fragment is spliced into the feed byte-for-byte, so it has to be
//! well-formed on its own and must not carry an XML declaration of its own.

use std::fs;
use std::io;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::{FeedError, Result};
use crate::feed::escape::{is_xml_char, is_xml_name};

pub const I2P_NAMESPACE: &str = "http://geti2p.net/en/docs/spec/updates";

/// Read the blocklist at `path`. No path, or a file that does not exist, is
/// an empty blocklist.
pub fn read_blocklist(path: Option<&Path>) -> Result<String> {
    let Some(path) = path else {
        return Ok(String::new());
    };
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "blocklist not present; feed will carry none");
            return Ok(String::new());
        }
        Err(err) => return Err(FeedError::read("reading blocklist", path, err)),
    };
    let text = String::from_utf8(bytes).map_err(|_| {
        FeedError::Blocklist(format!("'{}' is not valid UTF-8", path.display()))
    })?;
    validate_blocklist(&text)?;
    Ok(text)
}

/// Accept an empty fragment, or well-formed XML without a declaration.
pub fn validate_blocklist(fragment: &str) -> Result<()> {
    if fragment.trim().is_empty() {
        return Ok(());
    }
    if fragment.trim_start().starts_with("<?xml") {
        return Err(FeedError::Blocklist(
            "fragment must not start with an XML declaration; the feed already has one"
                .to_string(),
        ));
    }

    let wrapped = format!("<blocklist-root xmlns:i2p=\"{I2P_NAMESPACE}\">{fragment}</blocklist-root>");
    check_well_formed(wrapped.as_bytes()).map_err(FeedError::Blocklist)
}

/// Strict well-formedness check for a complete XML document.
///
/// Requires UTF-8 made only of XML characters, exactly one root element,
/// balanced and matching end tags, valid names, resolvable entity references
/// and no declaration after the first event.
pub fn check_well_formed(xml: &[u8]) -> std::result::Result<(), String> {
    let text = std::str::from_utf8(xml)
        .map_err(|e| format!("not UTF-8 at byte {}", e.valid_up_to()))?;
    if let Some((at, c)) = text.char_indices().find(|&(_, c)| !is_xml_char(c)) {
        return Err(format!("character U+{:04X} not allowed in XML at byte {at}", u32::from(c)));
    }

    let mut reader = Reader::from_reader(xml);
    let mut depth = 0usize;
    let mut roots = 0usize;
    let mut seen_event = false;

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|e| format!("not well-formed at byte {position}: {e}"))?;
        match event {
            Event::Eof => break,
            Event::Decl(_) if !seen_event => {}
            Event::Decl(_) => {
                return Err(format!("unexpected XML declaration at byte {position}"));
            }
            Event::DocType(_) if depth > 0 || roots > 0 => {
                return Err(format!("unexpected DOCTYPE at byte {position}"));
            }
            Event::Start(start) => {
                open_element(&start, depth, roots, position)?;
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Event::Empty(start) => {
                open_element(&start, depth, roots, position)?;
                if depth == 0 {
                    roots += 1;
                }
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unmatched end tag at byte {position}"))?;
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|e| format!("bad character data at byte {position}: {e}"))?;
                check_chars(&value, position)?;
                if depth == 0 && !value.trim().is_empty() {
                    return Err(format!("text outside the root element at byte {position}"));
                }
            }
            Event::CData(_) if depth == 0 => {
                return Err(format!("CDATA outside the root element at byte {position}"));
            }
            _ => {}
        }
        seen_event = true;
    }

    if depth != 0 {
        return Err(format!("{depth} element(s) left unclosed"));
    }
    if roots != 1 {
        return Err(format!("expected exactly one root element, found {roots}"));
    }
    Ok(())
}

fn open_element(
    start: &BytesStart<'_>,
    depth: usize,
    roots: usize,
    position: usize,
) -> std::result::Result<(), String> {
    if depth == 0 && roots > 0 {
        return Err(format!("second root element at byte {position}"));
    }
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    if !is_xml_name(&name) {
        return Err(format!("invalid element name '{name}' at byte {position}"));
    }
    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute at byte {position}: {e}"))?;
        if !is_xml_name(&String::from_utf8_lossy(attr.key.as_ref())) {
            return Err(format!("invalid attribute name at byte {position}"));
        }
        let value = attr
            .unescape_value()
            .map_err(|e| format!("bad attribute value at byte {position}: {e}"))?;
        check_chars(&value, position)?;
    }
    Ok(())
}

/// Character references can spell what the raw bytes may not.
fn check_chars(value: &str, position: usize) -> std::result::Result<(), String> {
    match value.chars().find(|&c| !is_xml_char(c)) {
        Some(c) => Err(format!(
            "character reference to U+{:04X} not allowed in XML at byte {position}",
            u32::from(c)
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn empty_fragment_is_valid() {
        assert!(validate_blocklist("").is_ok());
        assert!(validate_blocklist("  \n\t").is_ok());
    }

    #[test]
    fn accepts_namespaced_fragment() {
        let fragment = r#"<i2p:blocklist signer="a@mail.i2p" sig="x" updated="2024-01-01T00:00:00Z">
  <i2p:block host="1.2.3.4"/>
  <i2p:unblock host="5.6.7.8"/>
</i2p:blocklist>"#;
        assert!(validate_blocklist(fragment).is_ok());
    }

    #[test]
    fn rejects_declaration() {
        let err = validate_blocklist("<?xml version='1.0'?><i2p:blocklist/>").unwrap_err();
        assert!(err.to_string().contains("declaration"), "{err}");

        let err = validate_blocklist("<i2p:a/><?xml version='1.0'?>").unwrap_err();
        assert!(err.to_string().contains("declaration"), "{err}");
    }

    #[test]
    fn rejects_malformed_fragments() {
        assert!(validate_blocklist("<i2p:blocklist>").is_err());
        assert!(validate_blocklist("<a></b>").is_err());
        assert!(validate_blocklist("<a>AT&T</a>").is_err());
        assert!(validate_blocklist(r#"<a x="1" x="2"/>"#).is_err());
    }

    #[test]
    fn missing_file_is_empty_but_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            read_blocklist(Some(&tmp.path().join("blocklist.xml"))).unwrap(),
            ""
        );
        assert_eq!(read_blocklist(None).unwrap(), "");

        let err = read_blocklist(Some(tmp.path())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputMalformed);
    }

    #[test]
    fn strict_checker_rejects_multiple_roots_and_stray_text() {
        assert!(check_well_formed(b"<a/>").is_ok());
        assert!(check_well_formed(b"<?xml version='1.0'?>\n<a>x</a>\n").is_ok());
        assert!(check_well_formed(b"<a/><b/>").is_err());
        assert!(check_well_formed(b"<a/>tail").is_err());
        assert!(check_well_formed(b"").is_err());
    }

    #[test]
    fn strict_checker_rejects_forbidden_characters() {
        assert!(check_well_formed("<a>tab\tand\nnewline</a>".as_bytes()).is_ok());
        assert!(check_well_formed(b"<a>x\x01y</a>").is_err());
        assert!(check_well_formed(b"<a t=\"\x0c\"/>").is_err());
        assert!(check_well_formed(b"<a>&#1;</a>").is_err());
        assert!(check_well_formed(b"<a t=\"&#x1F;\"/>").is_err());
        assert!(check_well_formed(b"<a>\xff</a>").is_err());
        assert!(check_well_formed(b"<a\"b/>").is_err());

        let err = validate_blocklist("<i2p:block host=\"1.2.3.4\u{b}\"/>").unwrap_err();
        assert!(err.to_string().contains("U+000B"), "{err}");
    }
}
