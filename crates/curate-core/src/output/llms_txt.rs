//! Markdown renderers: `llms.txt` and `llms-full.txt`.

use super::{TOOL_NAME, display_title};
use crate::config::CurateConfig;
use crate::types::CurationResult;
use std::fmt::Write as _;

/// Render `llms.txt`.
///
/// ```text
/// # https://example.com
///
///  > Site description
///
/// ## Products
///
/// - [Title](https://example.com/products/a): Summary
/// ```
///
/// Groups appear in output order. Pages without a title show their URL.
#[must_use]
pub fn render_llms_txt(result: &CurationResult, config: &CurateConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", config.site.base_url);
    out.push('\n');

    if let Some(description) = config.site.description.as_deref() {
        let mut any = false;
        for line in description.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let _ = writeln!(out, " > {line}");
            any = true;
        }
        if any {
            out.push('\n');
        }
    }

    for group in result.llms_groups() {
        let _ = writeln!(out, "## {group}");
        out.push('\n');
        for url in result.llms_urls().filter(|u| u.group == group) {
            let title = display_title(url);
            match url.summary.as_deref() {
                Some(summary) => {
                    let _ = writeln!(out, "- [{title}]({}): {summary}", url.url);
                },
                None => {
                    let _ = writeln!(out, "- [{title}]({})", url.url);
                },
            }
        }
        out.push('\n');
    }
    out
}

/// Render `llms-full.txt`: one delimited block per LLM page.
#[must_use]
pub fn render_llms_full_txt(result: &CurationResult, config: &CurateConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} llms-full.txt", config.site.base_url);
    let _ = writeln!(out, "# Generated by {TOOL_NAME}");
    let _ = writeln!(out, "# Default language: {}", config.site.default_language);
    out.push('\n');

    for (idx, url) in result.llms_urls().enumerate() {
        let _ = writeln!(out, "<|page-{}|>", idx + 1);
        let _ = writeln!(out, "## {}", display_title(url));
        let _ = writeln!(out, "URL: {}", url.url);
        let _ = writeln!(out, "Group: {}", url.group);
        let _ = writeln!(out, "Score: {}", url.score);
        out.push('\n');
        if let Some(summary) = url.summary.as_deref() {
            let _ = writeln!(out, "{summary}");
            out.push('\n');
        }
    }
    out
}
