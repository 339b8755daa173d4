//! Callback Handler module for processing inline keyboard callback queries

use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};
use teloxide::prelude::*;
use tokio::sync::Mutex;

use crate::api::ApiClient;
use crate::fetcher::fetch_and_send;
use crate::flow::{toggle_department, FlowStep};
use crate::session::SessionStore;

use super::flow_manager::{advance_step, render_step};

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: teloxide::types::CallbackQuery,
    store: Arc<Mutex<SessionStore>>,
    api: ApiClient,
) -> Result<()> {
    // Answer first so the button stops showing the loading state even when
    // the action itself takes a while (fetching a page, for example).
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(message) = &q.message else {
        warn!("Callback query without an originating message");
        return Ok(());
    };
    let chat_id = message.chat().id;
    let session_id = chat_id.to_string();
    let data = q.data.as_deref().unwrap_or("");
    info!("Callback from chat {chat_id}: {data}");

    match data {
        "cancel" => {
            {
                let mut guard = store.lock().await;
                guard.clear_flow(&session_id);
            }
            bot.send_message(chat_id, "Operation cancelled.").await?;
        }
        "skip" => {
            advance_step(&bot, &api, &store, chat_id).await?;
        }
        "dept_done" => {
            let selected = {
                let guard = store.lock().await;
                guard.settings(&session_id).department_ids
            };
            if selected.is_empty() {
                bot.send_message(chat_id, "Select at least one department first.")
                    .await?;
            } else {
                {
                    let mut guard = store.lock().await;
                    guard.set_flow_step(&session_id, FlowStep::Department.next());
                }
                render_step(&bot, &api, &store, chat_id).await?;
            }
        }
        data if data.starts_with("dept:") => {
            let department_id = &data["dept:".len()..];
            {
                let mut guard = store.lock().await;
                toggle_department(guard.settings_mut(&session_id), department_id);
                guard.persist().await;
            }
            // Re-render the same step with the updated selection marks
            render_step(&bot, &api, &store, chat_id).await?;
        }
        data if data.starts_with("sub:") => {
            let enabled = data == "sub:yes";
            {
                let mut guard = store.lock().await;
                guard.settings_mut(&session_id).subscribed = enabled;
                guard.set_flow_step(&session_id, FlowStep::GetData);
                guard.persist().await;
            }
            render_step(&bot, &api, &store, chat_id).await?;
        }
        data if data.starts_with("page:") => {
            match data["page:".len()..].parse::<u32>() {
                Ok(page) if page >= 1 => {
                    fetch_and_send(&bot, &api, &store, chat_id, page, false).await?;
                }
                _ => warn!("Malformed page payload from chat {chat_id}: {data}"),
            }
        }
        other => {
            warn!("Unknown callback payload from chat {chat_id}: {other}");
        }
    }

    Ok(())
}
