//! sitemaps.org XML renderers.
//!
//! Both renderers consume `include_in_sitemap` URLs only, so every language
//! variant ends up in the sitemap regardless of the LLM filters.

use crate::types::{CuratedUrl, CurationResult};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::BTreeMap;
use url::Url;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Rendered sitemap index plus its child sitemaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapIndex {
    /// `sitemap_index.xml` contents.
    pub index: String,
    /// `(file name, contents)` per host, sorted by host.
    pub children: Vec<(String, String)>,
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Result<Self> {
        let mut out = Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        };
        out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(out)
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| Error::Serialization(format!("sitemap XML: {e}")))
    }

    fn open_root(&mut self, name: &str) -> Result<()> {
        let mut start = BytesStart::new(name);
        start.push_attribute(("xmlns", SITEMAP_NS));
        self.event(Event::Start(start))
    }

    fn open(&mut self, name: &str) -> Result<()> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.open(name)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn finish(self) -> Result<String> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| Error::Serialization(format!("sitemap XML is not UTF-8: {e}")))
    }
}

fn render_urlset<'a>(urls: impl Iterator<Item = &'a CuratedUrl>) -> Result<String> {
    let mut out = XmlOut::new()?;
    out.open_root("urlset")?;
    for url in urls {
        out.open("url")?;
        out.text_element("loc", &url.url)?;
        if let Some(lastmod) = url.lastmod {
            out.text_element("lastmod", &lastmod.format("%Y-%m-%d").to_string())?;
        }
        out.close("url")?;
    }
    out.close("urlset")?;
    out.finish()
}

/// Render `sitemap.xml` for every `include_in_sitemap` URL.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if XML writing fails.
pub fn render_sitemap_xml(result: &CurationResult) -> Result<String> {
    render_urlset(result.sitemap_urls())
}

/// Split sitemap URLs per host and render an index over the parts.
///
/// Each host gets `<first label>_sitemap.xml` (`www_sitemap.xml`,
/// `docs_sitemap.xml`), referenced from the index at the host's root. Index
/// entries carry `generated_at` as their `lastmod`.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if XML writing fails.
pub fn render_sitemap_index(result: &CurationResult, generated_at: DateTime<Utc>) -> Result<SitemapIndex> {
    let mut by_host: BTreeMap<String, (String, Vec<&CuratedUrl>)> = BTreeMap::new();
    for url in result.sitemap_urls() {
        let Ok(parsed) = Url::parse(&url.url) else {
            continue;
        };
        let Some(host) = parsed.host_str().map(str::to_ascii_lowercase) else {
            continue;
        };
        by_host
            .entry(host)
            .or_insert_with(|| (parsed.scheme().to_string(), Vec::new()))
            .1
            .push(url);
    }

    let today = generated_at.format("%Y-%m-%d").to_string();
    let mut index = XmlOut::new()?;
    index.open_root("sitemapindex")?;
    let mut children = Vec::with_capacity(by_host.len());
    for (host, (scheme, urls)) in &by_host {
        let label = host.split('.').next().unwrap_or("site");
        let file_name = format!("{label}_sitemap.xml");

        index.open("sitemap")?;
        index.text_element("loc", &format!("{scheme}://{host}/{file_name}"))?;
        index.text_element("lastmod", &today)?;
        index.close("sitemap")?;

        children.push((file_name, render_urlset(urls.iter().copied())?));
    }
    index.close("sitemapindex")?;

    Ok(SitemapIndex {
        index: index.finish()?,
        children,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::super::test_support::{fixed_time, page, result};
    use super::*;
    use crate::sitemap::{SitemapDocument, parse_sitemap_document};

    #[test]
    fn test_sitemap_keeps_every_language_and_escapes() {
        // Given: A non-default-language page kept out of LLM output
        let mut fr = page("https://ex.com/fr/about", "About", 20, false);
        fr.lastmod = Some(fixed_time());
        let mut excluded = page("https://ex.com/search?q=a&b=c", "Other", 0, false);
        excluded.include_in_sitemap = false;
        let curated = result(vec![
            page("https://ex.com/a?x=1&y=2", "Other", 10, true),
            fr,
            excluded,
        ]);

        // When
        let xml = render_sitemap_xml(&curated).unwrap();

        // Then
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<loc>https://ex.com/a?x=1&amp;y=2</loc>"));
        assert!(xml.contains("<loc>https://ex.com/fr/about</loc>"));
        assert!(xml.contains("<lastmod>2025-03-01</lastmod>"));
        assert!(!xml.contains("search"));

        match parse_sitemap_document(&xml).unwrap() {
            SitemapDocument::UrlSet(entries) => {
                let locs: Vec<_> = entries.iter().map(|e| e.url.as_str()).collect();
                assert_eq!(locs, vec!["https://ex.com/a?x=1&y=2", "https://ex.com/fr/about"]);
            },
            SitemapDocument::Index(_) => panic!("expected a urlset"),
        }
    }

    #[test]
    fn test_sitemap_index_splits_by_host() {
        let curated = result(vec![
            page("https://www.ex.com/", "Home", 50, true),
            page("https://docs.ex.com/start", "Docs", 30, true),
            page("https://www.ex.com/pricing", "Pricing", 38, true),
        ]);

        let rendered = render_sitemap_index(&curated, fixed_time()).unwrap();

        let names: Vec<_> = rendered.children.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["docs_sitemap.xml", "www_sitemap.xml"]);
        assert!(rendered.children[1].1.contains("https://www.ex.com/pricing"));
        assert!(!rendered.children[0].1.contains("www.ex.com"));

        match parse_sitemap_document(&rendered.index).unwrap() {
            SitemapDocument::Index(children) => assert_eq!(
                children,
                vec![
                    "https://docs.ex.com/docs_sitemap.xml".to_string(),
                    "https://www.ex.com/www_sitemap.xml".to_string(),
                ]
            ),
            SitemapDocument::UrlSet(_) => panic!("expected an index"),
        }
        assert!(rendered.index.contains("<lastmod>2025-03-01</lastmod>"));
    }
}
