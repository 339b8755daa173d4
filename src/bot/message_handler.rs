//! Message Handler module for processing incoming Telegram messages

use std::sync::Arc;

use anyhow::Result;
use log::info;
use teloxide::prelude::*;
use tokio::sync::Mutex;

use crate::api::ApiClient;
use crate::flow::FlowStep;
use crate::session::SessionStore;

use super::flow_manager::{handle_flow_text, render_step, resolve_restaurant_name};
use super::ui_builder::format_filter_summary;

const WELCOME: &str = "Welcome! Use /comments to browse reviews and /filters to set up filters.";

async fn handle_comments_command(
    bot: &Bot,
    store: &Arc<Mutex<SessionStore>>,
    api: &ApiClient,
    chat_id: ChatId,
) -> Result<()> {
    let session_id = chat_id.to_string();
    let settings = {
        let guard = store.lock().await;
        guard.settings(&session_id)
    };
    if settings.department_ids.is_empty() {
        // Nothing configured yet, walk the user through the flow
        let mut guard = store.lock().await;
        guard.set_flow_step(&session_id, FlowStep::Preview);
    } else {
        let restaurant =
            resolve_restaurant_name(api, store, &session_id, settings.restaurant_id.as_deref())
                .await;
        bot.send_message(chat_id, format_filter_summary(&settings, restaurant.as_deref()))
            .await?;
        let mut guard = store.lock().await;
        guard.set_flow_step(&session_id, FlowStep::GetData);
    }
    render_step(bot, api, store, chat_id).await
}

async fn handle_unsubscribe_command(
    bot: &Bot,
    store: &Arc<Mutex<SessionStore>>,
    chat_id: ChatId,
) -> Result<()> {
    {
        let mut guard = store.lock().await;
        guard.settings_mut(&chat_id.to_string()).subscribed = false;
        guard.persist().await;
    }
    bot.send_message(chat_id, "Periodic notifications disabled.")
        .await?;
    Ok(())
}

/// Entry point for all incoming messages
pub async fn message_handler(
    bot: Bot,
    msg: Message,
    store: Arc<Mutex<SessionStore>>,
    api: ApiClient,
) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    info!("Received text from chat {chat_id}: {text}");

    match text.trim() {
        "/start" => {
            bot.send_message(chat_id, WELCOME).await?;
        }
        "/comments" => {
            handle_comments_command(&bot, &store, &api, chat_id).await?;
        }
        "/filters" => {
            {
                let mut guard = store.lock().await;
                guard.set_flow_step(&chat_id.to_string(), FlowStep::Preview);
            }
            render_step(&bot, &api, &store, chat_id).await?;
        }
        "/unsubscribe" => {
            handle_unsubscribe_command(&bot, &store, chat_id).await?;
        }
        other => {
            // Free text only matters mid-flow; otherwise stay quiet
            handle_flow_text(&bot, &api, &store, chat_id, other).await?;
        }
    }
    Ok(())
}
