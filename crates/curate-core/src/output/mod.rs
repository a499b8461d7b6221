//! Renderers for the curated result.
//!
//! Every renderer is a pure function of the [`CurationResult`] and the
//! configuration: no pipeline decision is re-derived here and nothing touches
//! the filesystem. Callers write the returned [`RenderedFile`]s wherever they
//! like.
//!
//! | Output | Consumes |
//! |---|---|
//! | `llms.txt` | `include_in_llms` URLs, grouped |
//! | `llms-full.txt` | `include_in_llms` URLs, one block per page |
//! | `llms.json` | `include_in_llms` URLs with score and language |
//! | `sitemap.xml` | `include_in_sitemap` URLs, all languages |
//! | `sitemap_index.xml` | `include_in_sitemap` URLs split per host |

mod llms_json;
mod llms_txt;
mod sitemap_xml;

pub use llms_json::{LlmsJson, LlmsJsonPage, LlmsJsonSite, render_llms_json};
pub use llms_txt::{render_llms_full_txt, render_llms_txt};
pub use sitemap_xml::{SitemapIndex, render_sitemap_index, render_sitemap_xml};

use crate::Result;
use crate::config::CurateConfig;
use crate::types::CurationResult;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::debug;

/// Name written into generated files.
pub const TOOL_NAME: &str = concat!("curate-core ", env!("CARGO_PKG_VERSION"));

/// One rendered output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    /// File name relative to the output directory.
    pub name: String,
    /// File contents.
    pub contents: String,
}

impl RenderedFile {
    fn new(name: &str, contents: String) -> Self {
        Self {
            name: name.to_string(),
            contents,
        }
    }
}

/// Render every output enabled in `config.output`.
///
/// Child sitemaps of the index are named after the index's directory, so an
/// index at `out/sitemap_index.xml` yields `out/www_sitemap.xml` and friends.
///
/// # Errors
///
/// Returns [`crate::Error::Serialization`] if JSON or XML encoding fails.
pub fn render_all(
    result: &CurationResult,
    config: &CurateConfig,
    generated_at: DateTime<Utc>,
) -> Result<Vec<RenderedFile>> {
    let output = &config.output;
    let mut files = Vec::new();

    if let Some(name) = output.llms_txt.as_deref() {
        files.push(RenderedFile::new(name, render_llms_txt(result, config)));
    }
    if let Some(name) = output.llms_full_txt.as_deref() {
        files.push(RenderedFile::new(name, render_llms_full_txt(result, config)));
    }
    if let Some(name) = output.llms_json.as_deref() {
        files.push(RenderedFile::new(
            name,
            render_llms_json(result, config, generated_at)?,
        ));
    }
    if let Some(name) = output.sitemap_xml.as_deref() {
        files.push(RenderedFile::new(name, render_sitemap_xml(result)?));
    }
    if let Some(name) = output.sitemap_index.as_deref() {
        let index = render_sitemap_index(result, generated_at)?;
        let dir = Path::new(name).parent().filter(|p| !p.as_os_str().is_empty());
        for (child, contents) in index.children {
            let child_name = dir.map_or_else(
                || child.clone(),
                |d| d.join(&child).to_string_lossy().into_owned(),
            );
            files.push(RenderedFile {
                name: child_name,
                contents,
            });
        }
        files.push(RenderedFile::new(name, index.index));
    }

    debug!(files = files.len(), "Rendered outputs");
    Ok(files)
}

/// Title shown for a page, falling back to its URL.
pub(crate) fn display_title(url: &crate::types::CuratedUrl) -> &str {
    url.title.as_deref().unwrap_or(&url.url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_support {
    use crate::types::{CuratedUrl, CurationResult, SourceKind};
    use chrono::{DateTime, TimeZone, Utc};

    pub(crate) fn page(url: &str, group: &str, score: i64, llms: bool) -> CuratedUrl {
        let parsed = url::Url::parse(url).unwrap();
        CuratedUrl {
            url: url.to_string(),
            normalized_key: crate::normalize::normalize(url).unwrap(),
            path: parsed.path().to_string(),
            language: None,
            group: group.to_string(),
            priority: 0,
            score,
            title: None,
            summary: None,
            include_in_llms: llms,
            include_in_sitemap: true,
            source_kind: SourceKind::Sitemap,
            depth: 0,
            lastmod: None,
        }
    }

    pub(crate) fn result(urls: Vec<CuratedUrl>) -> CurationResult {
        CurationResult {
            urls,
            ..CurationResult::default()
        }
    }

    pub(crate) fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::test_support::{fixed_time, page, result};
    use super::*;

    #[test]
    fn test_render_all_follows_output_config() {
        let mut config = CurateConfig::new("https://www.ex.com");
        config.output.llms_txt = Some("llms.txt".to_string());
        config.output.llms_json = Some("llms.json".to_string());
        config.output.sitemap_index = Some("out/sitemap_index.xml".to_string());

        let curated = result(vec![
            page("https://www.ex.com/pricing", "Pricing", 38, true),
            page("https://docs.ex.com/start", "Docs", 30, true),
        ]);
        let files = render_all(&curated, &config, fixed_time()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "llms.txt",
                "llms.json",
                "out/docs_sitemap.xml",
                "out/www_sitemap.xml",
                "out/sitemap_index.xml",
            ]
        );
    }

    #[test]
    fn test_render_all_with_nothing_enabled() {
        let mut config = CurateConfig::new("https://ex.com");
        config.output.llms_txt = None;
        let files = render_all(&result(vec![]), &config, fixed_time()).unwrap();
        assert!(files.is_empty());
    }
}
