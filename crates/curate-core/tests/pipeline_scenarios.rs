//! End-to-end curation scenarios: wiremock-served sources through the HTTP
//! fetcher, and property checks over already-collected entries.

#![allow(clippy::unwrap_used, clippy::panic)]

use curate_core::{
    CancellationToken, CurateConfig, Error, HtmlSummarizer, HttpFetcher, Pipeline, ProfileConfig,
    RawUrlEntry, RuleConfig, RunOptions, SourceConfig, SourceKind, curate_entries,
};
use proptest::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn urlset(locs: &[String]) -> String {
    let body: String = locs.iter().map(|l| format!("<url><loc>{l}</loc></url>")).collect();
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{body}</urlset>"#)
}

fn quiet_config(base: &str) -> CurateConfig {
    let mut config = CurateConfig::new(base);
    config.crawl.politeness_delay_ms = 0;
    config.crawl.max_retries = 0;
    config
}

fn sitemap_entries(paths: &[&str]) -> Vec<RawUrlEntry> {
    paths
        .iter()
        .map(|p| RawUrlEntry::new(format!("https://ex.com{p}"), SourceKind::Sitemap))
        .collect()
}

fn llms_paths(result: &curate_core::CurationResult) -> Vec<String> {
    result.llms_urls().map(|u| u.path.clone()).collect()
}

#[tokio::test]
async fn test_blog_excluded_from_llms_but_kept_in_sitemap() {
    // Given: One sitemap with two product pages and a blog post, blog excluded
    let server = MockServer::start().await;
    let uri = server.uri();
    let locs = vec![
        format!("{uri}/products/a"),
        format!("{uri}/products/b"),
        format!("{uri}/blog/x"),
    ];
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(urlset(&locs))
                .insert_header("content-type", "application/xml"),
        )
        .mount(&server)
        .await;

    let mut config = quiet_config(&uri);
    config.sources = vec![SourceConfig::sitemap(format!("{uri}/sitemap.xml"))];
    config.filters.exclude = vec![RuleConfig::pattern("blog")];
    let fetcher = HttpFetcher::new(&config.crawl).unwrap();

    // When
    let result = Pipeline::new(&fetcher, &HtmlSummarizer, CancellationToken::new())
        .run(&config, &RunOptions::default())
        .await
        .unwrap();

    // Then
    let mut llms = llms_paths(&result);
    llms.sort();
    assert_eq!(llms, vec!["/products/a", "/products/b"]);
    assert!(result.llms_urls().all(|u| u.group == "Products"));
    assert_eq!(result.sitemap_urls().count(), 3);
    assert_eq!(result.diagnostics.excluded, 1);
}

#[tokio::test]
async fn test_failing_source_does_not_abort_run() {
    // Given: A missing sitemap followed by a working one
    let server = MockServer::start().await;
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/ok.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(urlset(&[format!("{uri}/pricing")])))
        .mount(&server)
        .await;

    let mut config = quiet_config(&uri);
    config.sources = vec![
        SourceConfig::sitemap(format!("{uri}/missing.xml")),
        SourceConfig::sitemap(format!("{uri}/ok.xml")),
    ];
    let fetcher = HttpFetcher::new(&config.crawl).unwrap();

    // When
    let result = Pipeline::new(&fetcher, &HtmlSummarizer, CancellationToken::new())
        .run(&config, &RunOptions::default())
        .await
        .unwrap();

    // Then
    assert_eq!(llms_paths(&result), vec!["/pricing"]);
    assert_eq!(result.diagnostics.source_failures.len(), 1);
    assert!(result.diagnostics.source_failures[0].url.ends_with("/missing.xml"));
}

#[tokio::test]
async fn test_all_sources_failing_is_empty_collection() {
    let server = MockServer::start().await;
    let mut config = quiet_config(&server.uri());
    config.sources = vec![SourceConfig::sitemap(format!("{}/none.xml", server.uri()))];
    let fetcher = HttpFetcher::new(&config.crawl).unwrap();

    let result = Pipeline::new(&fetcher, &HtmlSummarizer, CancellationToken::new())
        .run(&config, &RunOptions::default())
        .await;

    assert!(matches!(result, Err(Error::EmptyCollection)));
}

#[test]
fn test_trailing_slash_duplicates_collapse() {
    let config = CurateConfig::new("https://ex.com");
    let result = curate_entries(&config, sitemap_entries(&["/page", "/page/"]), &RunOptions::default()).unwrap();

    assert_eq!(result.urls.len(), 1);
    assert_eq!(result.diagnostics.duplicates_removed, 1);
}

#[test]
fn test_global_max_keeps_lexicographically_smaller_path() {
    let mut config = CurateConfig::new("https://ex.com");
    config.filters.max_urls = 1;

    for _ in 0..3 {
        let result = curate_entries(&config, sitemap_entries(&["/b", "/a"]), &RunOptions::default()).unwrap();
        assert_eq!(llms_paths(&result), vec!["/a"]);
        assert_eq!(result.diagnostics.truncated, 1);
        assert_eq!(result.sitemap_urls().count(), 2);
    }
}

#[test]
fn test_only_groups_with_builtin_profile() {
    let config = CurateConfig::new("https://ex.com");
    let options = RunOptions::default()
        .with_profile("minimal")
        .with_only_groups(["Docs"]);
    let result = curate_entries(
        &config,
        sitemap_entries(&["/docs/a", "/docs/b", "/pricing", "/blog/x"]),
        &options,
    )
    .unwrap();

    assert_eq!(llms_paths(&result), vec!["/docs/a", "/docs/b"]);
    assert_eq!(result.sitemap_urls().count(), 4);
}

#[test]
fn test_only_groups_take_the_global_cap() {
    // Given: Products outscore Docs and only two LLM slots exist
    let mut config = CurateConfig::new("https://ex.com");
    config.filters.max_urls = 2;

    // When
    let result = curate_entries(
        &config,
        sitemap_entries(&["/products/a", "/products/b", "/docs/c", "/docs/d"]),
        &RunOptions::default().with_only_groups(["Docs"]),
    )
    .unwrap();

    // Then: Both slots go to the selected group
    assert_eq!(llms_paths(&result), vec!["/docs/c", "/docs/d"]);
}

#[test]
fn test_only_groups_override_profile_groups() {
    let mut config = CurateConfig::new("https://ex.com");
    config.filters.profiles.insert(
        "sales".to_string(),
        ProfileConfig {
            include_groups: vec!["Products".to_string()],
            ..ProfileConfig::default()
        },
    );
    let options = RunOptions::default()
        .with_profile("sales")
        .with_only_groups(["Docs"]);

    let result = curate_entries(&config, sitemap_entries(&["/products/a", "/docs/c"]), &options).unwrap();

    assert_eq!(llms_paths(&result), vec!["/docs/c"]);
    assert_eq!(result.sitemap_urls().count(), 2);
}

const PATHS: &[&str] = &[
    "/",
    "/pricing",
    "/products/a",
    "/products/a/",
    "/products/b",
    "/docs/start",
    "/docs/guide/install",
    "/blog/post-1",
    "/blog/post-2",
    "/fr/pricing",
    "/de/docs/start",
    "/careers",
    "/legal/terms",
    "/misc/thing",
];

proptest! {
    #[test]
    fn prop_language_never_changes_sitemap_membership(
        picks in prop::collection::vec(0..PATHS.len(), 1..30),
        max_urls in 0usize..6,
    ) {
        let paths: Vec<&str> = picks.iter().map(|&i| PATHS[i]).collect();
        let mut config = CurateConfig::new("https://ex.com");
        config.filters.max_urls = max_urls;
        config.filters.exclude = vec![RuleConfig::pattern("^/legal")];
        config.output.sitemap_apply_filters = true;

        let result = curate_entries(&config, sitemap_entries(&paths), &RunOptions::default()).unwrap();

        for url in &result.urls {
            if url.language.as_deref().is_some_and(|l| l != "en") {
                prop_assert!(!url.include_in_llms);
            }
            prop_assert_eq!(url.include_in_sitemap, !url.path.starts_with("/legal"));
        }
        if max_urls > 0 {
            prop_assert!(result.llms_urls().count() <= max_urls);
        }
    }

    #[test]
    fn prop_curation_is_deterministic(
        picks in prop::collection::vec(0..PATHS.len(), 1..30),
        max_urls in 0usize..6,
    ) {
        let paths: Vec<&str> = picks.iter().map(|&i| PATHS[i]).collect();
        let mut config = CurateConfig::new("https://ex.com");
        config.filters.max_urls = max_urls;

        let first = curate_entries(&config, sitemap_entries(&paths), &RunOptions::default()).unwrap();
        let second = curate_entries(&config, sitemap_entries(&paths), &RunOptions::default()).unwrap();
        prop_assert_eq!(first.urls, second.urls);
        prop_assert_eq!(first.diagnostics, second.diagnostics);
    }
}
