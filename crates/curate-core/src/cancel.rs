//! Cooperative cancellation for a pipeline run.
//!
//! The crawler and sitemap reader check the token between fetches. Once it
//! trips they stop issuing requests and return what they already collected.
//! A token trips when [`CancellationToken::cancel`] is called, when its
//! deadline passes, or when its page budget is used up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    page_budget: Option<usize>,
    pages_claimed: AtomicUsize,
}

/// Shared cancellation signal with optional time and page budgets.
///
/// Clones share state.
///
/// ```rust
/// use curate_core::CancellationToken;
///
/// let token = CancellationToken::with_limits(None, Some(2));
/// assert!(token.try_claim_page());
/// assert!(token.try_claim_page());
/// assert!(!token.try_claim_page());
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Token without budgets; trips only on [`cancel`](Self::cancel).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token with an optional wall-clock budget and page budget.
    #[must_use]
    pub fn with_limits(max_duration: Option<Duration>, max_pages: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline: max_duration.map(|d| Instant::now() + d),
                page_budget: max_pages,
                ..Inner::default()
            }),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether fetching should stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        if self.inner.deadline.is_some_and(|d| Instant::now() >= d) {
            self.cancel();
            return true;
        }
        false
    }

    /// Reserve one page fetch against the budget.
    ///
    /// Returns `false` (and trips the token) when the budget is exhausted or
    /// the token is already cancelled.
    #[must_use]
    pub fn try_claim_page(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let Some(budget) = self.inner.page_budget else {
            self.inner.pages_claimed.fetch_add(1, Ordering::SeqCst);
            return true;
        };
        let claimed = self.inner.pages_claimed.fetch_add(1, Ordering::SeqCst);
        if claimed < budget {
            true
        } else {
            self.inner.pages_claimed.fetch_sub(1, Ordering::SeqCst);
            tracing::info!(budget, "Page budget exhausted; stopping further fetches");
            self.cancel();
            false
        }
    }

    /// Pages claimed so far.
    #[must_use]
    pub fn pages_claimed(&self) -> usize {
        self.inner.pages_claimed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(!clone.try_claim_page());
    }

    #[test]
    fn test_expired_deadline_trips() {
        let token = CancellationToken::with_limits(Some(Duration::ZERO), None);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_unbounded_token_counts_pages() {
        let token = CancellationToken::new();
        for _ in 0..5 {
            assert!(token.try_claim_page());
        }
        assert_eq!(token.pages_claimed(), 5);
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_exceed_budget() {
        let token = CancellationToken::with_limits(None, Some(10));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let t = token.clone();
            handles.push(tokio::spawn(async move {
                let mut granted = 0;
                for _ in 0..5 {
                    if t.try_claim_page() {
                        granted += 1;
                    }
                }
                granted
            }));
        }
        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }
        assert_eq!(total, 10);
        assert_eq!(token.pages_claimed(), 10);
    }
}
