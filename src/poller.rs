//! # Polling Loop Module
//!
//! Timer-driven sweep over all subscribed sessions. A ticker task emits
//! tick events on an mpsc channel at a fixed interval; the poller consumes
//! them and re-runs the fetch engine in interval mode for each subscribed
//! session. One session's failure never aborts the rest of the sweep.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use teloxide::prelude::*;
use tokio::sync::{mpsc, Mutex};

use crate::api::ApiClient;
use crate::fetcher::fetch_and_send;
use crate::session::SessionStore;

/// Spawn a ticker task emitting on the returned channel every `interval`
pub fn spawn_ticker(interval: Duration) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        // The first tick of tokio's interval fires immediately; skip it so
        // the first sweep happens one full interval after startup.
        timer.tick().await;
        loop {
            timer.tick().await;
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// Run `check` for every session id, isolating failures per session.
///
/// Returns the number of sessions whose check succeeded.
pub async fn sweep_sessions<F, Fut>(session_ids: Vec<String>, mut check: F) -> usize
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut succeeded = 0;
    for session_id in session_ids {
        match check(session_id.clone()).await {
            Ok(()) => succeeded += 1,
            Err(e) => error!("Polling sweep failed for session {session_id}: {e}"),
        }
    }
    succeeded
}

/// Periodic sweep task over subscribed sessions
pub struct Poller {
    bot: Bot,
    api: ApiClient,
    store: Arc<Mutex<SessionStore>>,
}

impl Poller {
    pub fn new(bot: Bot, api: ApiClient, store: Arc<Mutex<SessionStore>>) -> Self {
        Self { bot, api, store }
    }

    /// Consume ticks until the channel closes
    pub async fn run(self, mut ticks: mpsc::Receiver<()>) {
        while ticks.recv().await.is_some() {
            self.sweep().await;
        }
    }

    /// One sweep across all subscribed sessions, in interval mode
    pub async fn sweep(&self) {
        let session_ids = {
            let guard = self.store.lock().await;
            guard.subscribed_sessions()
        };
        if session_ids.is_empty() {
            return;
        }
        info!("Polling sweep over {} subscribed sessions", session_ids.len());

        let succeeded = sweep_sessions(session_ids, |session_id| async move {
            let chat_id = ChatId(session_id.parse()?);
            fetch_and_send(&self.bot, &self.api, &self.store, chat_id, 1, true).await
        })
        .await;
        info!("Polling sweep finished, {succeeded} sessions updated");
    }
}
