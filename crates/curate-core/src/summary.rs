//! Title and description extraction from fetched HTML.
//!
//! The pipeline only depends on the [`Summarizer`] trait. [`HtmlSummarizer`]
//! is the default implementation and picks:
//!
//! - **title**: `<title>`, then the first `<h1>`, then the first `<h2>`,
//!   trimmed at a site-name separator such as `" | "`
//! - **description**: `<meta name="description">`, then `og:description`,
//!   then the first substantial paragraph
//!
//! Extraction never fails; a page with nothing usable yields an empty summary.

use crate::fetch::FetchedPage;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Separators between a page title and the site name.
const TITLE_SEPARATORS: &[&str] = &[" | ", " - ", " \u{2014} ", " \u{00b7} "];

/// Meta descriptions at or below this length are treated as missing.
const MIN_META_LEN: usize = 10;

/// Paragraphs at or below this length are skipped.
const MIN_PARAGRAPH_LEN: usize = 20;

/// Paragraph fallback is cut to this many characters.
const PARAGRAPH_CAP: usize = 400;

/// Final description cap.
const DESCRIPTION_CAP: usize = 500;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        /// SAFETY: Selector is a compile-time constant that is known to be valid.
        #[allow(clippy::unwrap_used)]
        static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

selector!(TITLE, "title");
selector!(H1, "h1");
selector!(H2, "h2");
selector!(META_DESCRIPTION, r#"meta[name="description"]"#);
selector!(OG_DESCRIPTION, r#"meta[property="og:description"]"#);
selector!(PARAGRAPH, "p");

/// Title and description of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSummary {
    /// Page title.
    pub title: Option<String>,
    /// Short description.
    pub description: Option<String>,
}

impl PageSummary {
    /// Whether neither field was found.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

/// Capability to summarize a fetched page.
pub trait Summarizer: Send + Sync {
    /// Extract a summary; an empty summary when nothing usable is found.
    fn summarize(&self, page: &FetchedPage) -> PageSummary;
}

/// HTML summarizer built on `scraper`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlSummarizer;

impl Summarizer for HtmlSummarizer {
    fn summarize(&self, page: &FetchedPage) -> PageSummary {
        if !page.is_html() || page.body.trim().is_empty() {
            return PageSummary::default();
        }
        let document = Html::parse_document(&page.body);
        PageSummary {
            title: extract_title(&document),
            description: extract_description(&document),
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|m| m.value().attr("content"))
        .map(collapse_whitespace)
        .find(|c| c.chars().count() > MIN_META_LEN)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

fn extract_title(document: &Html) -> Option<String> {
    let raw = first_text(document, &TITLE)
        .or_else(|| first_text(document, &H1))
        .or_else(|| first_text(document, &H2))?;
    Some(strip_site_name(&raw))
}

/// Keep the part before the first site-name separator when it is a
/// plausible title on its own.
fn strip_site_name(title: &str) -> String {
    for sep in TITLE_SEPARATORS {
        if let Some((head, _)) = title.split_once(sep) {
            let head = head.trim();
            if (5..=120).contains(&head.chars().count()) {
                return head.to_string();
            }
        }
    }
    title.to_string()
}

fn extract_description(document: &Html) -> Option<String> {
    let description = meta_content(document, &META_DESCRIPTION)
        .or_else(|| meta_content(document, &OG_DESCRIPTION))
        .or_else(|| {
            document
                .select(&PARAGRAPH)
                .map(element_text)
                .find(|p| p.chars().count() > MIN_PARAGRAPH_LEN)
                .map(|p| p.chars().take(PARAGRAPH_CAP).collect())
        })?;
    Some(truncate_chars(&description, DESCRIPTION_CAP))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn summarize(html: &str) -> PageSummary {
        HtmlSummarizer.summarize(&FetchedPage::html("https://ex.com/p", html))
    }

    #[test]
    fn test_title_and_meta_description() {
        let summary = summarize(
            r#"<html><head><title>Pricing | Example</title>
            <meta name="description" content="Plans   for every   team size.">
            </head><body><h1>Other</h1></body></html>"#,
        );
        assert_eq!(summary.title.as_deref(), Some("Pricing"));
        assert_eq!(
            summary.description.as_deref(),
            Some("Plans for every team size.")
        );
    }

    #[test]
    fn test_fallbacks_to_heading_and_paragraph() {
        let summary = summarize(
            "<html><body><h2>Sub</h2><h1>Getting started</h1>\
             <p>short</p><p>This paragraph is long enough to describe the page.</p></body></html>",
        );
        assert_eq!(summary.title.as_deref(), Some("Getting started"));
        assert_eq!(
            summary.description.as_deref(),
            Some("This paragraph is long enough to describe the page.")
        );
    }

    #[test]
    fn test_og_description_when_meta_too_short() {
        let summary = summarize(
            r#"<head><meta name="description" content="tiny">
            <meta property="og:description" content="Open graph description text"></head>"#,
        );
        assert_eq!(
            summary.description.as_deref(),
            Some("Open graph description text")
        );
    }

    #[test]
    fn test_short_title_head_is_kept_whole() {
        // "API" is too short to stand alone, so the full title is kept.
        assert_eq!(strip_site_name("API - Example Docs"), "API - Example Docs");
        assert_eq!(
            strip_site_name("Authentication guide \u{00b7} Example"),
            "Authentication guide"
        );
    }

    #[test]
    fn test_long_description_is_capped() {
        let long = "word ".repeat(200);
        let html = format!(r#"<meta name="description" content="{long}">"#);
        let description = summarize(&html).description.unwrap();
        assert_eq!(description.chars().count(), DESCRIPTION_CAP);
        assert!(description.ends_with("..."));
    }

    #[test]
    fn test_non_html_yields_empty_summary() {
        let mut page = FetchedPage::html("https://ex.com/f.pdf", "%PDF-1.4");
        page.content_type = Some("application/pdf".to_string());
        assert!(HtmlSummarizer.summarize(&page).is_empty());
        assert!(summarize("").is_empty());
    }
}
