//! Sibling subdomain discovery.
//!
//! Hostnames that share the base site's root domain but differ from the base
//! host (`docs.example.com` next to `example.com`) are candidate sources of
//! their own. [`discover`] finds them in a set of seed URLs;
//! [`SubdomainDiscovery::discover_live`] gathers those seeds from the base
//! site's sitemap, robots.txt and homepage first.

use crate::cancel::CancellationToken;
use crate::fetch::PageFetcher;
use crate::normalize::{host_of, is_same_root_domain, root_domain_from_host};
use crate::politeness::{HostThrottle, ThrottledFetcher};
use crate::sitemap::{SitemapReader, fetch_robots_sitemaps};
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::{debug, info, instrument};
use url::Url;

/// SAFETY: Selector is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Hostnames in `seeds` that share `root_domain` but are not `base_host`.
///
/// The result is sorted and free of duplicates. A `www.` prefix does not make
/// a host distinct from the base host.
///
/// ```rust
/// use curate_core::subdomain::discover;
///
/// let seeds = [
///     "https://example.com/a",
///     "https://docs.example.com/start",
///     "https://Blog.Example.com/post",
///     "https://docs.example.com/other",
///     "https://example.org/elsewhere",
/// ];
/// assert_eq!(
///     discover(seeds, "example.com", "example.com"),
///     vec!["blog.example.com", "docs.example.com"]
/// );
/// ```
#[must_use]
pub fn discover<'s, I>(seeds: I, root_domain: &str, base_host: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'s str>,
{
    let base = strip_www(&base_host.to_ascii_lowercase()).to_string();
    seeds
        .into_iter()
        .filter_map(host_of)
        .filter(|host| strip_www(host) != base && is_same_root_domain(host, root_domain))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Restrict candidates to an explicit selection, when one is configured.
///
/// Selected entries may be full hostnames or bare labels (`docs`).
#[must_use]
pub fn select(candidates: Vec<String>, selected: Option<&[String]>, root_domain: &str) -> Vec<String> {
    let Some(selected) = selected else {
        return candidates;
    };
    let wanted: BTreeSet<String> = selected
        .iter()
        .map(|s| {
            let s = s.trim().to_ascii_lowercase();
            if s.contains('.') { s } else { format!("{s}.{root_domain}") }
        })
        .collect();
    candidates.into_iter().filter(|c| wanted.contains(c)).collect()
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Live discovery against the base site.
///
/// Every request waits on the run's [`HostThrottle`], so the lookups here and
/// the source fetches that follow them stay spaced per host.
pub struct SubdomainDiscovery<'a> {
    fetcher: ThrottledFetcher<'a>,
    cancel: CancellationToken,
    sitemap_max_depth: u32,
}

impl<'a> SubdomainDiscovery<'a> {
    /// Discovery through `fetcher`, paced by `throttle`.
    #[must_use]
    pub const fn new(
        fetcher: &'a dyn PageFetcher,
        throttle: &'a HostThrottle,
        cancel: CancellationToken,
        sitemap_max_depth: u32,
    ) -> Self {
        Self {
            fetcher: ThrottledFetcher::new(fetcher, throttle),
            cancel,
            sitemap_max_depth,
        }
    }

    /// Collect seed URLs from the base site and return candidate subdomains.
    ///
    /// Seeds come from `/sitemap.xml`, `/sitemap_index.xml`, the sitemaps
    /// declared in robots.txt and the homepage links. Every lookup is
    /// best-effort.
    #[instrument(skip(self), fields(base = %base))]
    pub async fn discover_live(&self, base: &Url) -> Vec<String> {
        let Some(base_host) = base.host_str().map(str::to_ascii_lowercase) else {
            return Vec::new();
        };
        let root_domain = root_domain_from_host(&base_host);
        let mut seeds: Vec<String> = Vec::new();

        let origin = base.origin().ascii_serialization();
        let mut sitemap_locations = vec![
            format!("{origin}/sitemap.xml"),
            format!("{origin}/sitemap_index.xml"),
        ];
        for declared in fetch_robots_sitemaps(&self.fetcher, base).await {
            seeds.push(declared.clone());
            sitemap_locations.push(declared);
        }

        let reader = SitemapReader::new(&self.fetcher, self.cancel.clone()).with_max_depth(self.sitemap_max_depth);
        for location in &sitemap_locations {
            if self.cancel.is_cancelled() {
                break;
            }
            match reader.read(location).await {
                Ok(read) => seeds.extend(read.entries.into_iter().map(|e| e.url)),
                Err(e) => debug!(url = %location, error = %e, "No sitemap for subdomain discovery"),
            }
        }

        if !self.cancel.is_cancelled() {
            match self.fetcher.fetch(base.as_str()).await {
                Ok(page) if page.is_success() && page.is_html() => {
                    seeds.extend(homepage_links(&page.body, base));
                },
                Ok(page) => debug!(status = page.status, "Homepage unavailable for subdomain discovery"),
                Err(e) => debug!(error = %e, "Homepage unavailable for subdomain discovery"),
            }
        }

        let found = discover(seeds.iter().map(String::as_str), &root_domain, &base_host);
        info!(count = found.len(), root_domain = %root_domain, "Discovered subdomains");
        found
    }
}

fn homepage_links(body: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(body);
    document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(String::from)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::fetch::FetchedPage;
    use crate::fetch::fake::StaticFetcher;
    use std::time::{Duration, Instant};

    #[test]
    fn test_excludes_base_host_and_foreign_domains() {
        let seeds = [
            "https://www.example.com/",
            "https://example.com/x",
            "https://shop.example.com/",
            "https://example.net/",
            "https://notexample.com/",
            "not a url",
        ];
        assert_eq!(discover(seeds, "example.com", "example.com"), vec!["shop.example.com"]);
    }

    #[test]
    fn test_multi_part_suffix() {
        let seeds = ["https://docs.example.co.uk/", "https://other.co.uk/"];
        assert_eq!(
            discover(seeds, "example.co.uk", "example.co.uk"),
            vec!["docs.example.co.uk"]
        );
    }

    #[test]
    fn test_select_accepts_labels_and_hosts() {
        let candidates = vec![
            "blog.ex.com".to_string(),
            "docs.ex.com".to_string(),
            "status.ex.com".to_string(),
        ];
        let selected = vec!["docs".to_string(), "status.ex.com".to_string()];
        assert_eq!(
            select(candidates.clone(), Some(selected.as_slice()), "ex.com"),
            vec!["docs.ex.com", "status.ex.com"]
        );
        assert_eq!(select(candidates.clone(), None, "ex.com"), candidates);
    }

    #[tokio::test]
    async fn test_live_discovery_reads_sitemap_robots_and_homepage() {
        // Given: Each seed source mentions a different subdomain
        let mut sitemap = FetchedPage::html(
            "https://ex.com/sitemap.xml",
            "<urlset><url><loc>https://docs.ex.com/start</loc></url>\
             <url><loc>https://ex.com/about</loc></url></urlset>",
        );
        sitemap.content_type = Some("application/xml".to_string());
        let mut robots = FetchedPage::html(
            "https://ex.com/robots.txt",
            "Sitemap: https://status.ex.com/sitemap.xml\n",
        );
        robots.content_type = Some("text/plain".to_string());
        let fetcher = StaticFetcher::new()
            .with_page("https://ex.com/sitemap.xml", sitemap)
            .with_page("https://ex.com/robots.txt", robots)
            .with_html("https://ex.com/", r#"<a href="https://blog.ex.com/">Blog</a><a href="/pricing">P</a>"#);

        // When
        let throttle = HostThrottle::new(Duration::from_millis(30));
        let start = Instant::now();
        let found = SubdomainDiscovery::new(&fetcher, &throttle, CancellationToken::new(), 5)
            .discover_live(&Url::parse("https://ex.com/").unwrap())
            .await;

        // Then: Four requests to ex.com (robots, two sitemaps, homepage) were spaced
        assert_eq!(found, vec!["blog.ex.com", "docs.ex.com", "status.ex.com"]);
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
