//! `llms.json` document.

use super::{TOOL_NAME, display_title};
use crate::config::CurateConfig;
use crate::types::CurationResult;
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Top-level `llms.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmsJson {
    /// Site metadata.
    pub site: LlmsJsonSite,
    /// LLM pages in output order.
    pub pages: Vec<LlmsJsonPage>,
}

/// Site block of `llms.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmsJsonSite {
    /// Configured base URL.
    pub base_url: String,
    /// Configured default language.
    pub default_language: String,
    /// RFC 3339 timestamp.
    pub generated_at: String,
    /// Generator name and version.
    pub tool: String,
}

/// One page of `llms.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmsJsonPage {
    /// Displayed URL.
    pub url: String,
    /// Display group.
    pub group: String,
    /// URL path.
    pub path: String,
    /// Importance score.
    pub score: i64,
    /// Detected language, omitted when unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Page title, or the URL when none was extracted.
    pub title: String,
    /// Page summary, omitted when none was extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LlmsJson {
    /// Build the document from a curated result.
    #[must_use]
    pub fn from_result(result: &CurationResult, config: &CurateConfig, generated_at: DateTime<Utc>) -> Self {
        Self {
            site: LlmsJsonSite {
                base_url: config.site.base_url.clone(),
                default_language: config.site.default_language.clone(),
                generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                tool: TOOL_NAME.to_string(),
            },
            pages: result
                .llms_urls()
                .map(|u| LlmsJsonPage {
                    url: u.url.clone(),
                    group: u.group.clone(),
                    path: u.path.clone(),
                    score: u.score,
                    language: u.language.clone(),
                    title: display_title(u).to_string(),
                    description: u.summary.clone(),
                })
                .collect(),
        }
    }
}

/// Render `llms.json` as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if encoding fails.
pub fn render_llms_json(result: &CurationResult, config: &CurateConfig, generated_at: DateTime<Utc>) -> Result<String> {
    let document = LlmsJson::from_result(result, config, generated_at);
    serde_json::to_string_pretty(&document).map_err(|e| Error::Serialization(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::test_support::{fixed_time, page, result};
    use super::*;

    #[test]
    fn test_llms_json_shape() {
        let mut docs = page("https://ex.com/docs", "Docs", 36, true);
        docs.language = Some("en".to_string());
        docs.title = Some("Docs".to_string());
        let curated = result(vec![docs, page("https://ex.com/de/docs", "Docs", 30, false)]);

        let json = render_llms_json(&curated, &CurateConfig::new("https://ex.com"), fixed_time()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["site"]["base_url"], "https://ex.com");
        assert_eq!(value["site"]["generated_at"], "2025-03-01T12:00:00Z");
        let pages = value["pages"].as_array().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0]["group"], "Docs");
        assert_eq!(pages[0]["score"], 36);
        assert_eq!(pages[0]["language"], "en");
        assert!(pages[0].get("description").is_none());
    }
}
