//! Flow Manager module driving the filter flow over Telegram
//!
//! Renders the prompt for the session's current step, advances the cursor
//! on skip signals and routes free-text input through the validators in
//! [`crate::flow`]. Any unexpected error mid-step clears the cursor and
//! reports a generic failure, so the user restarts from the Preview step.

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use teloxide::prelude::*;
use tokio::sync::Mutex;

use crate::api::{ApiClient, Department};
use crate::cache::ensure_cached;
use crate::errors::BotError;
use crate::fetcher::fetch_and_send;
use crate::flow::{apply_text_input, FlowStep, TextOutcome};
use crate::session::SessionStore;

use super::ui_builder::{
    begin_keyboard, department_keyboard, format_filter_summary, skip_cancel_keyboard,
    subscription_keyboard,
};

const DATES_PROMPT: &str = "Step 2: Skip, or enter dates as:\n\n\
    YYYY-MM-DD:YYYY-MM-DD for a range\n\n\
    YYYY-MM-DD for a start date only\n\n\
    :YYYY-MM-DD for an end date only.";
const STARS_PROMPT: &str =
    "Step 3: Skip, or enter a star rating from 1 to 5, or an ascending range like 2-4.";
const PAGE_SIZE_PROMPT: &str = "Step 4: Skip, or enter the number of reviews shown per page.";

/// Department reference list for the session, fetched once and cached
async fn departments_for(
    api: &ApiClient,
    store: &Arc<Mutex<SessionStore>>,
    session_id: &str,
) -> Result<Vec<Department>, BotError> {
    let mut slot = {
        let mut guard = store.lock().await;
        guard.cache_mut(session_id).departments.clone()
    };
    let departments = ensure_cached(&mut slot, || api.departments()).await?;
    let mut guard = store.lock().await;
    guard.cache_mut(session_id).departments = slot;
    Ok(departments)
}

/// Display name for the session's restaurant filter, if one is set.
///
/// Reference-data failures only degrade the summary to the raw id.
pub async fn resolve_restaurant_name(
    api: &ApiClient,
    store: &Arc<Mutex<SessionStore>>,
    session_id: &str,
    restaurant_id: Option<&str>,
) -> Option<String> {
    let restaurant_id = restaurant_id?;
    let mut slot = {
        let mut guard = store.lock().await;
        guard.cache_mut(session_id).restaurants.clone()
    };
    let restaurants = match ensure_cached(&mut slot, || api.restaurants()).await {
        Ok(restaurants) => restaurants,
        Err(e) => {
            error!("Restaurants fetch failed for session {session_id}: {e}");
            return None;
        }
    };
    {
        let mut guard = store.lock().await;
        guard.cache_mut(session_id).restaurants = slot;
    }
    restaurants
        .iter()
        .find(|r| r.id.to_string() == restaurant_id)
        .map(|r| r.name.clone())
}

/// Render the prompt for the session's current step.
///
/// A step error aborts the flow: the cursor is cleared and the user is
/// asked to start over.
pub async fn render_step(
    bot: &Bot,
    api: &ApiClient,
    store: &Arc<Mutex<SessionStore>>,
    chat_id: ChatId,
) -> Result<()> {
    if let Err(e) = render_step_inner(bot, api, store, chat_id).await {
        let e = BotError::Flow(e.to_string());
        error!("Chat {chat_id}: {e}");
        {
            let mut guard = store.lock().await;
            guard.clear_flow(&chat_id.to_string());
        }
        bot.send_message(chat_id, "Filter step failed. Start again with /filters.")
            .await?;
    }
    Ok(())
}

async fn render_step_inner(
    bot: &Bot,
    api: &ApiClient,
    store: &Arc<Mutex<SessionStore>>,
    chat_id: ChatId,
) -> Result<()> {
    let session_id = chat_id.to_string();
    let mut step = {
        let guard = store.lock().await;
        guard.flow_step(&session_id).unwrap_or(FlowStep::Preview)
    };

    // The Subscription step is skipped when filters changed this pass, so a
    // single signal may fall through to the terminal step.
    loop {
        match step {
            FlowStep::Preview => {
                let settings = {
                    let guard = store.lock().await;
                    guard.settings(&session_id)
                };
                if !settings.department_ids.is_empty() {
                    let restaurant = resolve_restaurant_name(
                        api,
                        store,
                        &session_id,
                        settings.restaurant_id.as_deref(),
                    )
                    .await;
                    bot.send_message(
                        chat_id,
                        format_filter_summary(&settings, restaurant.as_deref()),
                    )
                    .await?;
                }
                bot.send_message(chat_id, "Configure filters?")
                    .reply_markup(begin_keyboard())
                    .await?;
                return Ok(());
            }
            FlowStep::Department => {
                let departments = departments_for(api, store, &session_id).await?;
                let selected = {
                    let guard = store.lock().await;
                    guard.settings(&session_id).department_ids
                };
                bot.send_message(
                    chat_id,
                    "Step 1: Toggle departments, then press Done:",
                )
                .reply_markup(department_keyboard(&departments, &selected))
                .await?;
                return Ok(());
            }
            FlowStep::Dates => {
                bot.send_message(chat_id, DATES_PROMPT)
                    .reply_markup(skip_cancel_keyboard())
                    .await?;
                return Ok(());
            }
            FlowStep::Stars => {
                bot.send_message(chat_id, STARS_PROMPT)
                    .reply_markup(skip_cancel_keyboard())
                    .await?;
                return Ok(());
            }
            FlowStep::PageSize => {
                bot.send_message(chat_id, PAGE_SIZE_PROMPT)
                    .reply_markup(skip_cancel_keyboard())
                    .await?;
                return Ok(());
            }
            FlowStep::Subscription => {
                let changed = {
                    let guard = store.lock().await;
                    guard.settings(&session_id).is_val_changes
                };
                if changed {
                    step = FlowStep::GetData;
                    let mut guard = store.lock().await;
                    guard.set_flow_step(&session_id, step);
                    continue;
                }
                bot.send_message(chat_id, "Notify you about new reviews periodically?")
                    .reply_markup(subscription_keyboard())
                    .await?;
                return Ok(());
            }
            FlowStep::GetData => {
                {
                    let mut guard = store.lock().await;
                    guard.settings_mut(&session_id).is_val_changes = false;
                    guard.persist().await;
                }
                bot.send_message(chat_id, "Fetching reviews, please wait...")
                    .await?;
                return fetch_and_send(bot, api, store, chat_id, 1, false).await;
            }
        }
    }
}

/// Advance the cursor by exactly one step and render the new step.
///
/// Skip never validates or mutates the skipped step's field.
pub async fn advance_step(
    bot: &Bot,
    api: &ApiClient,
    store: &Arc<Mutex<SessionStore>>,
    chat_id: ChatId,
) -> Result<()> {
    let session_id = chat_id.to_string();
    let step = {
        let guard = store.lock().await;
        guard.flow_step(&session_id)
    };
    match step {
        Some(step) => {
            {
                let mut guard = store.lock().await;
                guard.set_flow_step(&session_id, step.next());
            }
            render_step(bot, api, store, chat_id).await
        }
        None => {
            bot.send_message(chat_id, "No active filter flow. Start with /filters.")
                .await?;
            Ok(())
        }
    }
}

/// Route free text into the current step's validator.
///
/// Returns `false` when the session has no active text-consuming step, so
/// the caller can fall back to its default text handling.
pub async fn handle_flow_text(
    bot: &Bot,
    api: &ApiClient,
    store: &Arc<Mutex<SessionStore>>,
    chat_id: ChatId,
    text: &str,
) -> Result<bool> {
    let session_id = chat_id.to_string();
    let step = {
        let guard = store.lock().await;
        guard.flow_step(&session_id)
    };
    let Some(step) = step else {
        return Ok(false);
    };
    if !step.accepts_text() {
        // Preview and Department are button-driven; stray text is ignored
        return Ok(true);
    }

    let outcome = {
        let mut guard = store.lock().await;
        let settings = guard.settings_mut(&session_id);
        let outcome = apply_text_input(step, text, settings);
        if let TextOutcome::Advance(next) = &outcome {
            guard.set_flow_step(&session_id, *next);
            guard.persist().await;
        }
        outcome
    };

    match outcome {
        TextOutcome::Advance(next) => {
            info!("Chat {chat_id} completed step {step:?}, moving to {next:?}");
            render_step(bot, api, store, chat_id).await?;
        }
        TextOutcome::Reject(reason) => {
            bot.send_message(chat_id, reason).await?;
        }
    }
    Ok(true)
}
