use std::sync::Arc;

use teloxide::prelude::*;
use tempfile::tempdir;
use tokio::sync::Mutex;

use review_radar::api::{ApiClient, CommentPage, CommentQuery};
use review_radar::fetcher::{build_queries, fetch_and_send, fetch_pages, total_pages, FetchOutcome};
use review_radar::flow::FlowStep;
use review_radar::session::SessionStore;
use review_radar::settings::{Settings, SettingsMap};

/// Nothing listens on the discard port, so any upstream attempt fails fast
const DEAD_UPSTREAM: &str = "http://127.0.0.1:9";

fn two_department_settings() -> Settings {
    Settings {
        department_ids: vec!["d1".to_string(), "d2".to_string()],
        ..Settings::default()
    }
}

fn page_with(ids: &[i64], count: u64) -> CommentPage {
    let results = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "text": format!("review {id}"),
                "created_at": "2024-03-01T12:30:00Z",
                "name": "Alex",
                "stars": 4,
                "restaurant": {"name": "La Piazza", "type_comments_loader": "google"}
            })
        })
        .collect::<Vec<_>>();
    serde_json::from_value(serde_json::json!({
        "count": count,
        "results": results
    }))
    .unwrap()
}

/// Two departments each returning 5 results on page 1 with count=12 and
/// page_size=5: the merged render shows 10 items and offers a next page
#[test]
fn test_two_department_merge_and_pagination() {
    let outcome = FetchOutcome {
        pages: vec![
            page_with(&[1, 2, 3, 4, 5], 12),
            page_with(&[6, 7, 8, 9, 10], 12),
        ],
        failures: 0,
    };

    let merged = outcome.merged();
    assert_eq!(merged.len(), 10);

    let total = total_pages(&outcome.counts(), 5);
    assert_eq!(total, 3);
    // Page 1 of 3: a next control is offered, no previous
    assert!(1 < total);
}

/// Aggregation is the max of per-department page counts, so the department
/// with more pages keeps navigation alive
#[test]
fn test_pagination_boundary_both_directions() {
    // One department exhausted, the other still has pages
    assert_eq!(total_pages(&[3, 12], 5), 3);
    // Both exhausted after one page
    assert_eq!(total_pages(&[3, 4], 5), 1);
}

/// One query per department, in selection order, sharing the page settings
#[test]
fn test_queries_follow_selection_order() {
    let queries = build_queries(&two_department_settings(), 2, false);
    assert_eq!(
        queries.iter().map(|q| q.department_id.as_str()).collect::<Vec<_>>(),
        vec!["d1", "d2"]
    );
    assert!(queries.iter().all(|q| q.page == 2));
}

/// Identical parameter sets produce identical cache keys; changing the page
/// produces a different key (and therefore a new upstream call)
#[test]
fn test_cache_key_stability() {
    let settings = two_department_settings();
    let first = build_queries(&settings, 1, false);
    let again = build_queries(&settings, 1, false);
    assert_eq!(first[0].cache_key(), again[0].cache_key());

    let next_page = build_queries(&settings, 2, false);
    assert_ne!(first[0].cache_key(), next_page[0].cache_key());
}

/// Polling queries replace user date bounds with the lastChecked cursor
#[test]
fn test_polling_query_uses_cursor() {
    let mut settings = two_department_settings();
    settings.created_at_after = Some("2020-01-01".to_string());
    settings.created_at_before = Some("2020-12-31".to_string());
    settings.last_checked = "2024-05-10T08:15:00Z".to_string();

    let queries = build_queries(&settings, 1, true);
    for query in &queries {
        assert_eq!(query.created_at_after.as_deref(), Some("2024-05-10"));
        assert!(query.created_at_before.is_none());
    }
}

/// A department that failed (rendered as an empty page) does not hide the
/// successfully fetched departments
#[test]
fn test_failed_department_does_not_mask_others() {
    let outcome = FetchOutcome {
        pages: vec![CommentPage::default(), page_with(&[1, 2], 2)],
        failures: 1,
    };
    let merged = outcome.merged();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].id, 1);
}

fn store_with(session_id: &str, settings: Settings, dir: &tempfile::TempDir) -> SessionStore {
    let mut map = SettingsMap::new();
    map.insert(session_id.to_string(), settings);
    SessionStore::new(map, dir.path().join("filters.json"))
}

/// An interactive cache hit short-circuits the upstream call entirely: with
/// every query pre-seeded, a dead upstream causes no failures
#[tokio::test]
async fn test_interactive_cache_hit_skips_upstream() {
    let dir = tempdir().unwrap();
    let settings = two_department_settings();
    let store = Arc::new(Mutex::new(store_with("100", settings.clone(), &dir)));
    let api = ApiClient::new(DEAD_UPSTREAM);

    let queries = build_queries(&settings, 1, false);
    {
        let mut guard = store.lock().await;
        for query in &queries {
            guard
                .cache_mut("100")
                .put_page(query.cache_key(), page_with(&[1, 2], 2));
        }
    }

    let outcome = fetch_pages(&api, &store, "100", &queries, true).await;
    assert_eq!(outcome.failures, 0);
    assert_eq!(outcome.merged().len(), 4);
}

/// A polling sweep must not be served from the page cache: pages cached by
/// an earlier sweep the same day are ignored and upstream is contacted
#[tokio::test]
async fn test_interval_fetch_bypasses_page_cache() {
    let dir = tempdir().unwrap();
    let mut settings = two_department_settings();
    settings.last_checked = "2024-05-10T08:00:00Z".to_string();
    let store = Arc::new(Mutex::new(store_with("100", settings.clone(), &dir)));
    let api = ApiClient::new(DEAD_UPSTREAM);

    let queries = build_queries(&settings, 1, true);
    {
        let mut guard = store.lock().await;
        for query in &queries {
            guard
                .cache_mut("100")
                .put_page(query.cache_key(), page_with(&[1], 1));
        }
    }

    let outcome = fetch_pages(&api, &store, "100", &queries, false).await;
    // Every department reached for upstream and reported the failure,
    // instead of silently replaying the stale snapshot
    assert_eq!(outcome.failures, queries.len());
    assert!(outcome.merged().is_empty());
}

/// A sweep whose fetch fails leaves the polling cursor untouched, even when
/// an earlier sweep cached a page under the same day's query key
#[tokio::test]
async fn test_failed_sweep_leaves_cursor() {
    let dir = tempdir().unwrap();
    let mut settings = two_department_settings();
    settings.subscribed = true;
    settings.last_checked = "2024-05-10T08:00:00Z".to_string();
    let store = Arc::new(Mutex::new(store_with("100", settings.clone(), &dir)));
    let api = ApiClient::new(DEAD_UPSTREAM);
    let bot = Bot::new("123456:TESTTOKEN").set_api_url(DEAD_UPSTREAM.parse().unwrap());

    let queries = build_queries(&settings, 1, true);
    {
        let mut guard = store.lock().await;
        for query in &queries {
            guard
                .cache_mut("100")
                .put_page(query.cache_key(), page_with(&[1], 1));
        }
    }

    fetch_and_send(&bot, &api, &store, ChatId(100), 1, true)
        .await
        .unwrap();

    let guard = store.lock().await;
    assert_eq!(guard.settings("100").last_checked, "2024-05-10T08:00:00Z");
}

/// A failed interactive render still commits its bookkeeping: the error
/// propagates, the flow cursor is cleared and the polling cursor does not
/// advance past undelivered items
#[tokio::test]
async fn test_failed_render_commits_bookkeeping() {
    let dir = tempdir().unwrap();
    let mut settings = two_department_settings();
    settings.last_checked = "2024-05-10T08:00:00Z".to_string();
    let store = Arc::new(Mutex::new(store_with("100", settings.clone(), &dir)));
    let api = ApiClient::new(DEAD_UPSTREAM);
    // Telegram is unreachable too, so the first send of the render fails
    let bot = Bot::new("123456:TESTTOKEN").set_api_url(DEAD_UPSTREAM.parse().unwrap());

    let queries = build_queries(&settings, 1, false);
    {
        let mut guard = store.lock().await;
        guard.set_flow_step("100", FlowStep::GetData);
        guard.set_rendered("100", vec![teloxide::types::MessageId(7)]);
        for query in &queries {
            guard
                .cache_mut("100")
                .put_page(query.cache_key(), page_with(&[1, 2], 2));
        }
    }

    let result = fetch_and_send(&bot, &api, &store, ChatId(100), 1, false).await;
    assert!(result.is_err());

    let mut guard = store.lock().await;
    assert!(guard.flow_step("100").is_none());
    assert_eq!(guard.settings("100").last_checked, "2024-05-10T08:00:00Z");
    // The old render was consumed and the partial render (nothing was
    // delivered before the failure) replaced it
    assert!(guard.take_rendered("100").is_empty());
}

/// Query parameter serialization is stable enough to be a cache key
#[test]
fn test_query_pairs_shape() {
    let query = CommentQuery {
        department_id: "d1".to_string(),
        page: 1,
        page_size: "5".to_string(),
        created_at_after: Some("2024-01-01".to_string()),
        created_at_before: None,
        stars: Some("3".to_string()),
        restaurant: None,
    };
    assert_eq!(
        query.cache_key(),
        "department_id=d1&page=1&page_size=5&created_at_after=2024-01-01&stars=3"
    );
}
