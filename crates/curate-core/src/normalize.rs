//! URL canonicalization and host helpers.
//!
//! Every stage that compares URLs goes through [`normalize`], so two URLs that
//! address the same page always collapse to the same [`NormalizedKey`]:
//!
//! - scheme and host are lower-cased
//! - default ports (80 for http, 443 for https) are removed
//! - the fragment is dropped
//! - trailing slashes are removed, except on the root path
//! - the query string is kept, so `?page=2` stays a distinct page
//!
//! ## Quick Start
//!
//! ```rust
//! use curate_core::normalize::normalize;
//!
//! let a = normalize("HTTPS://Example.com:443/Docs/#intro")?;
//! let b = normalize("https://example.com/Docs")?;
//! assert_eq!(a, b);
//! assert_eq!(a.as_str(), "https://example.com/Docs");
//! # Ok::<(), curate_core::Error>(())
//! ```

use crate::{Error, NormalizedKey, Result};
use std::collections::BTreeSet;
use url::Url;

/// File extensions that never point at an HTML page worth curating.
const SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico", ".zip", ".rar", ".7z",
    ".gz", ".tgz", ".mp4", ".mov", ".avi", ".mp3", ".wav", ".woff", ".woff2", ".ttf", ".eot",
];

/// Second-level labels under which registrations happen one level deeper
/// (`example.co.uk`, `example.com.au`).
const MULTI_PART_SUFFIX_LABELS: &[&str] = &["co", "com", "net", "org", "gov", "ac", "edu"];

/// Parse `raw` and apply the canonicalization policy, returning the parsed URL.
///
/// # Errors
///
/// Returns [`Error::MalformedUrl`] when `raw` is not an absolute `http`/`https`
/// URL with a host.
pub fn canonicalize(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let mut url = Url::parse(trimmed).map_err(|e| Error::MalformedUrl(format!("{trimmed}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::MalformedUrl(format!(
            "{trimmed}: unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::MalformedUrl(format!("{trimmed}: missing host")));
    }

    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let stripped = path.trim_end_matches('/');
        let stripped = if stripped.is_empty() { "/" } else { stripped }.to_string();
        url.set_path(&stripped);
    }

    Ok(url)
}

/// Canonicalize a URL into its deduplication key.
///
/// # Errors
///
/// Returns [`Error::MalformedUrl`] when the string is not an absolute URL.
pub fn normalize(raw: &str) -> Result<NormalizedKey> {
    canonicalize(raw).map(|url| NormalizedKey::new(url.into()))
}

/// The canonical URL as a displayable string.
///
/// Feeding the result back into [`normalize`] yields the same key.
///
/// # Errors
///
/// Returns [`Error::MalformedUrl`] when the string is not an absolute URL.
pub fn display_form(raw: &str) -> Result<String> {
    canonicalize(raw).map(String::from)
}

/// Resolve `href` against `base`, returning the canonical absolute URL.
///
/// Returns `None` for unresolvable references and non-http(s) schemes.
#[must_use]
pub fn resolve(base: &Url, href: &str) -> Option<Url> {
    let joined = base.join(href.trim()).ok()?;
    canonicalize(joined.as_str()).ok()
}

/// Lower-cased host of a URL string, if it parses.
#[must_use]
pub fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
}

/// Best-effort registrable domain for a host.
///
/// Keeps the last two labels, or three when the second-level label is a
/// well-known multi-part suffix such as `co.uk`. IP addresses and single-label
/// hosts are returned unchanged.
///
/// ```rust
/// use curate_core::normalize::root_domain_from_host;
///
/// assert_eq!(root_domain_from_host("blog.example.com"), "example.com");
/// assert_eq!(root_domain_from_host("shop.example.co.uk"), "example.co.uk");
/// assert_eq!(root_domain_from_host("localhost"), "localhost");
/// ```
#[must_use]
pub fn root_domain_from_host(host: &str) -> String {
    let host = host.trim().trim_matches('.').to_ascii_lowercase();
    if host.parse::<std::net::IpAddr>().is_ok() {
        return host;
    }
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let keep = if labels.len() >= 3
        && labels[labels.len() - 1].len() == 2
        && MULTI_PART_SUFFIX_LABELS.contains(&labels[labels.len() - 2])
    {
        3
    } else {
        2
    };
    if labels.len() <= keep {
        return labels.join(".");
    }
    labels[labels.len() - keep..].join(".")
}

/// Whether `host` equals `root_domain` or is one of its subdomains.
#[must_use]
pub fn is_same_root_domain(host: &str, root_domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let root = root_domain.to_ascii_lowercase();
    !host.is_empty()
        && !root.is_empty()
        && (host == root || host.ends_with(&format!(".{root}")))
}

/// Hosts a run may touch.
///
/// A leading `www.` is ignored on both sides. With `allow_subdomains`, any
/// host sharing the root domain of an allowed host is admitted too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostAllowList {
    hosts: BTreeSet<String>,
    allow_subdomains: bool,
}

impl HostAllowList {
    /// Allow-list over `hosts`.
    #[must_use]
    pub fn new<I, S>(hosts: I, allow_subdomains: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| strip_www(&h.as_ref().trim().to_ascii_lowercase()).to_string())
                .filter(|h| !h.is_empty())
                .collect(),
            allow_subdomains,
        }
    }

    /// Admit one more host.
    pub fn insert(&mut self, host: &str) {
        self.hosts
            .insert(strip_www(&host.to_ascii_lowercase()).to_string());
    }

    /// Whether `host` may be fetched or emitted.
    #[must_use]
    pub fn allows(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let host = strip_www(&host);
        if self.hosts.contains(host) {
            return true;
        }
        self.allow_subdomains
            && self
                .hosts
                .iter()
                .any(|allowed| is_same_root_domain(host, &root_domain_from_host(allowed)))
    }

    /// Whether the host of `url` is allowed.
    #[must_use]
    pub fn allows_url(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|h| self.allows(h))
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Whether the URL path ends in a static-asset extension.
#[must_use]
pub fn should_skip_by_extension(raw: &str) -> bool {
    let path = Url::parse(raw.trim()).map_or_else(
        |_| raw.to_ascii_lowercase(),
        |u| u.path().to_ascii_lowercase(),
    );
    SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_host_allow_list() {
        let strict = HostAllowList::new(["www.Ex.com"], false);
        assert!(strict.allows("ex.com"));
        assert!(strict.allows("WWW.ex.com"));
        assert!(!strict.allows("docs.ex.com"));

        let mut relaxed = HostAllowList::new(["ex.com"], true);
        assert!(relaxed.allows("docs.ex.com"));
        assert!(!relaxed.allows("ex.org"));
        relaxed.insert("ex.org");
        assert!(relaxed.allows("ex.org"));
    }

    #[test]
    fn test_trailing_slash_equivalence() {
        assert_eq!(
            normalize("https://x.com/a").unwrap(),
            normalize("https://x.com/a/").unwrap()
        );
    }

    #[test]
    fn test_root_keeps_its_slash() {
        assert_eq!(normalize("https://x.com").unwrap().as_str(), "https://x.com/");
        assert_eq!(normalize("https://x.com/").unwrap().as_str(), "https://x.com/");
        assert_eq!(normalize("https://x.com//").unwrap().as_str(), "https://x.com/");
    }

    #[test]
    fn test_case_folding_and_default_ports() {
        let key = normalize("HTTP://WWW.Example.COM:80/Path").unwrap();
        assert_eq!(key.as_str(), "http://www.example.com/Path");

        let key = normalize("https://example.com:443/").unwrap();
        assert_eq!(key.as_str(), "https://example.com/");

        let key = normalize("https://example.com:8443/").unwrap();
        assert_eq!(key.as_str(), "https://example.com:8443/");
    }

    #[test]
    fn test_fragment_dropped_query_kept() {
        let key = normalize("https://x.com/list/?page=2#top").unwrap();
        assert_eq!(key.as_str(), "https://x.com/list?page=2");
        assert_ne!(key, normalize("https://x.com/list?page=3").unwrap());
    }

    #[test]
    fn test_malformed_urls_rejected() {
        for raw in ["", "not a url", "/relative/path", "mailto:a@b.com", "ftp://x.com/f"] {
            match normalize(raw) {
                Err(Error::MalformedUrl(_)) => {},
                other => panic!("expected MalformedUrl for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_resolve_relative_links() {
        let base = Url::parse("https://x.com/docs/intro").unwrap();
        assert_eq!(
            resolve(&base, "../pricing/").unwrap().as_str(),
            "https://x.com/pricing"
        );
        assert!(resolve(&base, "javascript:void(0)").is_none());
    }

    #[test]
    fn test_root_domain_helpers() {
        assert_eq!(root_domain_from_host("a.b.example.com"), "example.com");
        assert_eq!(root_domain_from_host("example.com."), "example.com");
        assert_eq!(root_domain_from_host("127.0.0.1"), "127.0.0.1");
        assert!(is_same_root_domain("blog.example.com", "example.com"));
        assert!(is_same_root_domain("example.com", "example.com"));
        assert!(!is_same_root_domain("notexample.com", "example.com"));
    }

    #[test]
    fn test_should_skip_by_extension() {
        assert!(should_skip_by_extension("https://x.com/files/report.PDF"));
        assert!(should_skip_by_extension("https://x.com/logo.svg?v=2"));
        assert!(!should_skip_by_extension("https://x.com/docs/pdf-guide"));
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            host in "[a-z]{1,10}\\.(com|org|io)",
            segments in prop::collection::vec("[a-zA-Z0-9_-]{0,8}", 0..4),
            trailing in "/{0,3}",
            query in prop::option::of("[a-z]{1,5}=[0-9]{1,3}"),
            fragment in prop::option::of("[a-z]{1,6}"),
        ) {
            let mut raw = format!("https://{host}/{}{trailing}", segments.join("/"));
            if let Some(q) = &query {
                raw.push('?');
                raw.push_str(q);
            }
            if let Some(f) = &fragment {
                raw.push('#');
                raw.push_str(f);
            }

            let key = normalize(&raw).unwrap();
            let display = display_form(&raw).unwrap();
            prop_assert_eq!(normalize(&display).unwrap(), key.clone());
            prop_assert_eq!(normalize(key.as_str()).unwrap(), key);
        }
    }
}
