//! Per-host request spacing.
//!
//! Requests to the same host are serialized and spaced by at least the
//! configured delay, whatever the global concurrency. Requests to different
//! hosts proceed independently.
//!
//! The crawler takes a [`HostSlot`] itself around each fetch. Everything else
//! that talks to the site (sitemaps, robots.txt, subdomain probing) goes
//! through a [`ThrottledFetcher`].

use crate::Result;
use crate::fetch::{FetchedPage, PageFetcher};
use crate::normalize::host_of;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type HostState = Arc<AsyncMutex<Option<Instant>>>;

/// Politeness gate shared by all fetches of one run.
#[derive(Debug, Default)]
pub struct HostThrottle {
    delay: Duration,
    hosts: Mutex<HashMap<String, HostState>>,
}

/// Exclusive right to send one request to a host.
///
/// Dropping the slot records the request time for the next waiter.
#[derive(Debug)]
pub struct HostSlot {
    guard: OwnedMutexGuard<Option<Instant>>,
}

impl Drop for HostSlot {
    fn drop(&mut self) {
        *self.guard = Some(Instant::now());
    }
}

impl HostThrottle {
    /// Throttle with the given minimum spacing per host.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Configured spacing.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    fn state_for(&self, host: &str) -> HostState {
        let mut hosts = match self.hosts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(hosts.entry(host.to_ascii_lowercase()).or_default())
    }

    /// Wait until a request to `host` may be sent.
    pub async fn acquire(&self, host: &str) -> HostSlot {
        let guard = self.state_for(host).lock_owned().await;
        if let Some(last) = *guard {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        HostSlot { guard }
    }
}

/// A [`PageFetcher`] that holds a [`HostSlot`] for every request.
///
/// Must not wrap the fetcher of a caller that already acquires slots from the
/// same throttle, or the second acquire waits on the first forever.
pub struct ThrottledFetcher<'a> {
    inner: &'a dyn PageFetcher,
    throttle: &'a HostThrottle,
}

impl<'a> ThrottledFetcher<'a> {
    /// Wrap `inner` with `throttle`.
    #[must_use]
    pub const fn new(inner: &'a dyn PageFetcher, throttle: &'a HostThrottle) -> Self {
        Self { inner, throttle }
    }
}

#[async_trait::async_trait]
impl PageFetcher for ThrottledFetcher<'_> {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let Some(host) = host_of(url) else {
            return self.inner.fetch(url).await;
        };
        let _slot = self.throttle.acquire(&host).await;
        self.inner.fetch(url).await
    }
}
