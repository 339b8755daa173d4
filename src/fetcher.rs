//! # Fetch-and-Render Engine Module
//!
//! Given a session's settings and a requested page, assembles one query per
//! selected department, fetches the pages in parallel (serving interactive
//! repeats from the session cache), merges the results in selection order
//! and renders them as Telegram messages with pagination controls. A failed
//! department is logged and rendered as empty so the remaining departments
//! still show. Polling sweeps bypass the page cache so every sweep observes
//! fresh upstream state.

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use teloxide::prelude::*;
use teloxide::types::MessageId;
use tokio::sync::Mutex;

use crate::api::{ApiClient, Comment, CommentPage, CommentQuery};
use crate::bot::ui_builder::{comment_buttons, format_comment, pagination_keyboard};
use crate::errors::BotError;
use crate::session::SessionStore;
use crate::settings::{now_iso, Settings};

/// Merged fetch result across all selected departments
pub struct FetchOutcome {
    /// One page per department, in selection order (failures are empty)
    pub pages: Vec<CommentPage>,
    pub failures: usize,
}

impl FetchOutcome {
    /// Concatenate all departments' results in selection order
    pub fn merged(&self) -> Vec<Comment> {
        self.pages
            .iter()
            .flat_map(|p| p.results.iter().cloned())
            .collect()
    }

    pub fn counts(&self) -> Vec<u64> {
        self.pages.iter().map(|p| p.count).collect()
    }
}

/// Assemble one query per selected department.
///
/// Interval (polling) requests discard the user's date bounds and filter on
/// the `lastChecked` cursor instead; interactive requests include the date
/// bounds only when an upper bound is set.
pub fn build_queries(settings: &Settings, page: u32, interval: bool) -> Vec<CommentQuery> {
    let (after, before) = if interval {
        (Some(settings.last_checked_date()), None)
    } else if settings.created_at_before.is_some() {
        (
            settings.created_at_after.clone(),
            settings.created_at_before.clone(),
        )
    } else {
        (None, None)
    };

    settings
        .department_ids
        .iter()
        .map(|department_id| CommentQuery {
            department_id: department_id.clone(),
            page,
            page_size: settings.page_size.clone(),
            created_at_after: after.clone(),
            created_at_before: before.clone(),
            stars: settings.stars_param(),
            restaurant: settings.restaurant_id.clone(),
        })
        .collect()
}

/// Total page count across departments: the maximum of the per-department
/// counts, so "next" is offered while any department still has pages.
pub fn total_pages(counts: &[u64], page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    counts
        .iter()
        .map(|count| count.div_ceil(page_size))
        .max()
        .unwrap_or(0) as u32
}

fn page_size_num(settings: &Settings) -> u32 {
    settings.page_size.parse().unwrap_or(5).max(1)
}

/// Fetch all queries, serving repeats from the session cache when
/// `use_cache` is set.
///
/// Cache misses run as parallel tasks; results are awaited (and merged) in
/// department-selection order. The store lock is never held across a fetch.
/// Polling passes `use_cache = false`: the interval query key only carries
/// the date portion of the cursor, so a cached page from earlier the same
/// day would otherwise mask anything posted since.
pub async fn fetch_pages(
    api: &ApiClient,
    store: &Arc<Mutex<SessionStore>>,
    session_id: &str,
    queries: &[CommentQuery],
    use_cache: bool,
) -> FetchOutcome {
    let cached: Vec<Option<CommentPage>> = if use_cache {
        let mut guard = store.lock().await;
        let cache = guard.cache_mut(session_id);
        queries
            .iter()
            .map(|q| cache.get_page(&q.cache_key()).cloned())
            .collect()
    } else {
        vec![None; queries.len()]
    };

    let mut handles: Vec<Option<tokio::task::JoinHandle<Result<CommentPage, BotError>>>> =
        Vec::with_capacity(queries.len());
    for (query, hit) in queries.iter().zip(&cached) {
        if hit.is_some() {
            handles.push(None);
            continue;
        }
        let api = api.clone();
        let query = query.clone();
        handles.push(Some(tokio::spawn(
            async move { api.comments(&query).await },
        )));
    }

    let mut pages = Vec::with_capacity(queries.len());
    let mut failures = 0;
    for (i, handle) in handles.into_iter().enumerate() {
        match handle {
            None => pages.push(cached[i].clone().unwrap_or_default()),
            Some(handle) => match handle.await {
                Ok(Ok(page)) => {
                    if use_cache {
                        let mut guard = store.lock().await;
                        guard
                            .cache_mut(session_id)
                            .put_page(queries[i].cache_key(), page.clone());
                    }
                    pages.push(page);
                }
                Ok(Err(e)) => {
                    error!(
                        "Comments fetch failed for department {}: {e}",
                        queries[i].department_id
                    );
                    failures += 1;
                    pages.push(CommentPage::default());
                }
                Err(e) => {
                    error!("Comments fetch task failed: {e}");
                    failures += 1;
                    pages.push(CommentPage::default());
                }
            },
        }
    }

    FetchOutcome { pages, failures }
}

/// Fetch the requested page for the session and render it to the chat.
///
/// Interactive requests first delete the previous render and finish with a
/// pagination control; interval (polling) requests only push the new items.
pub async fn fetch_and_send(
    bot: &Bot,
    api: &ApiClient,
    store: &Arc<Mutex<SessionStore>>,
    chat_id: ChatId,
    page: u32,
    interval: bool,
) -> Result<()> {
    let session_id = chat_id.to_string();

    if !interval {
        let previous = {
            let mut guard = store.lock().await;
            guard.take_rendered(&session_id)
        };
        for message_id in previous {
            // Previously rendered messages may already be gone
            let _ = bot.delete_message(chat_id, message_id).await;
        }
    }

    let settings = {
        let guard = store.lock().await;
        guard.settings(&session_id)
    };

    if settings.department_ids.is_empty() {
        if !interval {
            bot.send_message(chat_id, "No departments selected. Use /filters to configure.")
                .await?;
            let mut guard = store.lock().await;
            guard.clear_flow(&session_id);
        }
        return Ok(());
    }

    let queries = build_queries(&settings, page, interval);
    let outcome = fetch_pages(api, store, &session_id, &queries, !interval).await;
    let merged = outcome.merged();

    if merged.is_empty() {
        if !interval {
            if outcome.failures == queries.len() {
                bot.send_message(chat_id, "Unable to fetch reviews. Try again later.")
                    .await?;
            } else {
                bot.send_message(chat_id, "No reviews found.").await?;
            }
        }
        let mut guard = store.lock().await;
        if outcome.failures == 0 {
            // Confirmed empty window: advance the cursor so it is not re-scanned
            guard.settings_mut(&session_id).last_checked = now_iso();
        }
        guard.clear_flow(&session_id);
        guard.persist().await;
        return Ok(());
    }

    info!(
        "Rendering {} comments for chat {chat_id} (page {page}, interval: {interval})",
        merged.len()
    );

    let mut sent_ids = Vec::new();
    let mut render = render_comments(bot, chat_id, &merged, &mut sent_ids).await;

    if !interval && render.is_ok() {
        let total = total_pages(&outcome.counts(), page_size_num(&settings));
        if let Some(keyboard) = pagination_keyboard(page, total) {
            render = match bot
                .send_message(chat_id, format!("Page {page} of {total}"))
                .reply_markup(keyboard)
                .await
            {
                Ok(message) => {
                    sent_ids.push(message.id);
                    Ok(())
                }
                Err(e) => Err(e.into()),
            };
        }
    }

    let mut guard = store.lock().await;
    if !interval {
        // A partial render is recorded too, so the next render can delete it
        guard.set_rendered(&session_id, sent_ids);
    }
    if render.is_ok() && outcome.failures == 0 {
        guard.settings_mut(&session_id).last_checked = now_iso();
    }
    guard.clear_flow(&session_id);
    guard.persist().await;

    render
}

/// Send one message per comment, recording each id before an error can
/// propagate past the caller's bookkeeping.
async fn render_comments(
    bot: &Bot,
    chat_id: ChatId,
    comments: &[Comment],
    sent_ids: &mut Vec<MessageId>,
) -> Result<()> {
    for comment in comments {
        let mut request = bot.send_message(chat_id, format_comment(comment));
        if let Some(keyboard) = comment_buttons(comment) {
            request = request.reply_markup(keyboard);
        }
        let message = request.await?;
        sent_ids.push(message.id);
    }
    Ok(())
}
