//! Parser for author-edited `entries.html` files.
//!
//! The input is HTML, not XML: unclosed `<p>`, upper-case tags and stray
//! markup are accepted. Each `<article>` becomes one [`Article`]; its metadata
//! lives in attributes, its summary in the first `<details><summary>`, and
//! whatever remains is re-serialized as XHTML for the Atom `<content>` body.

use std::fs;
use std::path::Path;

use scraper::node::Node;
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::error::{FeedError, Result};
use crate::feed::escape::{escape, is_xml_name};

/// HTML void elements; serialized self-closed so the body stays XML.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// One news entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    pub uid: String,
    pub title: String,
    pub link: String,
    pub author: String,
    pub published: String,
    pub updated: String,
    pub summary: String,
    /// Well-formed XHTML, embedded verbatim in `<content type="xhtml">`.
    pub body_xhtml: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntriesDocument {
    pub header_title: String,
    pub articles: Vec<Article>,
}

impl EntriesDocument {
    /// Overlay articles first, then the baseline's; the baseline title wins.
    pub fn merge_overlay(self, base: EntriesDocument) -> EntriesDocument {
        let mut articles = self.articles;
        articles.extend(base.articles);
        EntriesDocument {
            header_title: base.header_title,
            articles,
        }
    }
}

/// Read and parse an entries file.
pub fn read_entries(path: &Path) -> Result<EntriesDocument> {
    let bytes = fs::read(path).map_err(|e| FeedError::read("reading entries", path, e))?;
    let doc = parse_entries(&String::from_utf8_lossy(&bytes));
    debug!(
        path = %path.display(),
        articles = doc.articles.len(),
        "parsed entries file"
    );
    Ok(doc)
}

/// Parse entries HTML. Never fails; unusable input yields an empty document.
pub fn parse_entries(html: &str) -> EntriesDocument {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let header_title = find_elements(root, "header")
        .next()
        .map(|header| header.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let articles = find_elements(root, "article").map(parse_article).collect();

    EntriesDocument {
        header_title,
        articles,
    }
}

fn find_elements<'a>(
    root: ElementRef<'a>,
    name: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    root.descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == name)
}

fn parse_article(article: ElementRef<'_>) -> Article {
    let attr = |name: &str| article.value().attr(name).unwrap_or_default().to_string();

    let summary = find_elements(article, "details")
        .next()
        .and_then(|details| find_elements(details, "summary").next())
        .map(|summary| summary.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let mut body = String::new();
    write_children(article, &mut body);

    let mut published = attr("published");
    let mut updated = attr("updated");
    if updated.is_empty() {
        updated = published.clone();
    } else if published.is_empty() {
        published = updated.clone();
    }

    Article {
        uid: attr("id"),
        title: attr("title"),
        link: attr("href"),
        author: attr("author"),
        published,
        updated,
        summary,
        body_xhtml: body.trim().to_string(),
    }
}

fn write_children(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(el: ElementRef<'_>, out: &mut String) {
    let name = el.value().name();
    // The summary block has already been lifted out of the body.
    if name == "details" {
        return;
    }
    // Tag soup such as `<a"b>` has no XML spelling; keep only its content.
    if !is_plain_name(name) {
        write_children(el, out);
        return;
    }

    out.push('<');
    out.push_str(name);
    for (key, value) in el.value().attrs() {
        if !is_plain_name(key) {
            continue;
        }
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }

    if VOID_ELEMENTS.contains(&name) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    write_children(el, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// An XML name with no namespace prefix, since the body declares none.
fn is_plain_name(name: &str) -> bool {
    is_xml_name(name) && !name.contains(':')
}
