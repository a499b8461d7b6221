//! # curate-core
//!
//! URL collection and curation for `llms.txt`, `llms.json` and `sitemap.xml`.
//!
//! This crate gathers every URL of a website from heterogeneous sources
//! (sitemaps, sitemap indexes, a bounded crawl, sibling subdomains, static
//! lists), collapses them to one entry per canonical URL, and curates the
//! result into ranked, grouped sets for two consumers: LLM ingestion and
//! search-engine crawlers.
//!
//! ## Architecture
//!
//! ```text
//! Collector -> Deduplicator -> FilterEngine -> GroupScorer -> Truncator -> output
//! ```
//!
//! - **Collection**: [`sitemap`], [`crawler`], [`subdomain`] and [`collector`]
//!   turn configured sources into [`RawUrlEntry`] values
//! - **Curation**: [`dedup`], [`filter`], [`grouper`] and [`truncate`] produce
//!   the [`CuratedUrl`] set with both inclusion flags
//! - **Rendering**: [`output`] turns a [`CurationResult`] into file contents
//! - **Capabilities**: network access goes through [`PageFetcher`] and page
//!   summaries through [`Summarizer`], so tests run without a network
//!
//! ## Quick Start
//!
//! ```rust
//! use curate_core::{CurateConfig, RawUrlEntry, RunOptions, SourceKind, curate_entries};
//!
//! let config = CurateConfig::new("https://example.com");
//! let entries = vec![
//!     RawUrlEntry::new("https://example.com/pricing", SourceKind::Sitemap),
//!     RawUrlEntry::new("https://example.com/pricing/", SourceKind::Crawl),
//!     RawUrlEntry::new("https://example.com/fr/pricing", SourceKind::Sitemap),
//! ];
//!
//! let result = curate_entries(&config, entries, &RunOptions::default())?;
//! assert_eq!(result.diagnostics.duplicates_removed, 1);
//! assert_eq!(result.llms_urls().count(), 1);
//! assert_eq!(result.sitemap_urls().count(), 2);
//! # Ok::<(), curate_core::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Per-URL and per-source failures never abort a run; they are counted in
//! [`Diagnostics`]. Only whole-run conditions surface as errors:
//!
//! ```rust,no_run
//! use curate_core::{CurateConfig, Error, RunOptions, curate_site};
//!
//! # async fn example() {
//! let config = CurateConfig::new("https://example.com");
//! match curate_site(&config, &RunOptions::default()).await {
//!     Ok(result) => println!("{} URLs for llms.txt", result.diagnostics.final_llms),
//!     Err(Error::EmptyCollection) => eprintln!("no source produced any URL"),
//!     Err(e) => eprintln!("curation failed ({}): {e}", e.category()),
//! }
//! # }
//! ```

/// Site analysis and configuration recommendation
pub mod analyze;
/// Cooperative cancellation with deadline and page budget
pub mod cancel;
/// Source orchestration
pub mod collector;
/// Configuration model and TOML loading
pub mod config;
/// Bounded breadth-first crawler
pub mod crawler;
/// Deduplication by normalized key
pub mod dedup;
/// Error types and result aliases
pub mod error;
/// Page fetching capability and HTTP implementation
pub mod fetch;
/// Include/exclude rules and language detection
pub mod filter;
/// Automatic grouping and scoring
pub mod grouper;
/// URL normalization and domain helpers
pub mod normalize;
/// Renderers for llms.txt, llms.json and sitemaps
pub mod output;
/// End-to-end curation run
pub mod pipeline;
/// Per-host request pacing
pub mod politeness;
/// Sitemap and sitemap index reading
pub mod sitemap;
/// Sibling subdomain discovery
pub mod subdomain;
/// Page title and description extraction
pub mod summary;
/// Profiles and truncation
pub mod truncate;
/// Core data types and structures
pub mod types;

// Re-export commonly used types
pub use analyze::{Recommendation, SiteAnalysis, SiteAnalyzer, recommend_config};
pub use cancel::CancellationToken;
pub use collector::{Collection, Collector};
pub use config::{
    CrawlConfig, CurateConfig, FiltersConfig, OutputConfig, ProfileConfig, RuleConfig, SiteConfig,
    SourceConfig,
};
pub use crawler::{CrawlOutcome, CrawlRequest, Crawler};
pub use error::{Error, Result};
pub use fetch::{FetchedPage, HttpFetcher, PageFetcher};
pub use filter::{FilterEngine, LanguageHints, Verdict};
pub use grouper::GroupScorer;
pub use output::{RenderedFile, render_all};
pub use pipeline::{Pipeline, RunOptions, curate_entries, curate_site};
pub use politeness::{HostThrottle, ThrottledFetcher};
pub use sitemap::SitemapReader;
pub use subdomain::SubdomainDiscovery;
pub use summary::{HtmlSummarizer, PageSummary, Summarizer};
pub use truncate::TruncationPlan;
pub use types::*;
