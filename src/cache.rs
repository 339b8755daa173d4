//! # Session Cache Module
//!
//! Ephemeral per-session cache of upstream data: the rarely changing
//! reference lists (departments, restaurants) and previously fetched comment
//! pages keyed by their serialized query parameters. Lives for the process
//! lifetime; nothing here is persisted, and staleness is an accepted
//! trade-off.

use std::collections::HashMap;
use std::future::Future;

use crate::api::{CommentPage, Department, Restaurant};
use crate::errors::BotError;

/// Cached upstream data for one session
#[derive(Clone, Debug, Default)]
pub struct SessionCache {
    pub departments: Option<Vec<Department>>,
    pub restaurants: Option<Vec<Restaurant>>,
    /// Serialized query parameters -> fetched page
    pages: HashMap<String, CommentPage>,
}

impl SessionCache {
    pub fn get_page(&self, key: &str) -> Option<&CommentPage> {
        self.pages.get(key)
    }

    pub fn put_page(&mut self, key: String, page: CommentPage) {
        self.pages.insert(key, page);
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Return the cached value or fetch and remember it.
///
/// Generic over the fetcher so callers (and tests) can supply a closure; a
/// cache hit must never invoke it.
pub async fn ensure_cached<T, F, Fut>(
    slot: &mut Option<T>,
    fetcher: F,
) -> Result<T, BotError>
where
    T: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, BotError>>,
{
    if let Some(value) = slot {
        return Ok(value.clone());
    }
    let value = fetcher().await?;
    *slot = Some(value.clone());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_ensure_cached_fetches_once() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let mut slot: Option<Vec<Department>> = None;

        let first = ensure_cached(&mut slot, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Department {
                id: "d1".to_string(),
                name: "Delivery".to_string(),
            }])
        })
        .await
        .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Second call is served from the slot, fetcher untouched
        let second = ensure_cached(&mut slot, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        })
        .await
        .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ensure_cached_propagates_fetch_error() {
        let mut slot: Option<Vec<Department>> = None;
        let result = ensure_cached(&mut slot, || async {
            Err(BotError::Upstream("HTTP 502".to_string()))
        })
        .await;
        assert!(result.is_err());
        assert!(slot.is_none());
    }

    #[test]
    fn test_page_cache_keyed_by_params() {
        let mut cache = SessionCache::default();
        assert!(cache.get_page("department_id=d1&page=1").is_none());

        cache.put_page(
            "department_id=d1&page=1".to_string(),
            CommentPage {
                count: 12,
                ..CommentPage::default()
            },
        );
        assert_eq!(cache.get_page("department_id=d1&page=1").unwrap().count, 12);
        assert!(cache.get_page("department_id=d1&page=2").is_none());
        assert_eq!(cache.page_count(), 1);
    }
}
