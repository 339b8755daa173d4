use std::sync::Arc;

use anyhow::Result;
use log::info;
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tokio::sync::Mutex;

use review_radar::api::ApiClient;
use review_radar::bot;
use review_radar::config::Config;
use review_radar::poller::{spawn_ticker, Poller};
use review_radar::session::SessionStore;
use review_radar::settings::load_settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    info!("Starting Review Radar Telegram Bot");

    let config = Config::from_env()?;

    info!("Loading settings from: {}", config.storage_path.display());
    let settings = load_settings(&config.storage_path).await?;
    let store = Arc::new(Mutex::new(SessionStore::new(
        settings,
        config.storage_path.clone(),
    )));

    let api = ApiClient::new(&config.api_base);
    let bot = Bot::new(&config.bot_token);

    // Spawn the subscription sweep, fed by a fixed-interval tick channel
    let ticks = spawn_ticker(config.check_interval);
    let poller = Poller::new(bot.clone(), api.clone(), Arc::clone(&store));
    tokio::spawn(poller.run(ticks));

    let address = ([0, 0, 0, 0], config.port).into();
    let webhook_url = config.webhook_url.join("webhook")?;
    let listener =
        webhooks::axum(bot.clone(), webhooks::Options::new(address, webhook_url)).await?;

    info!("Webhook registered, starting dispatcher on port {}", config.port);

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let store = Arc::clone(&store);
            let api = api.clone();
            move |bot: Bot, msg: Message| {
                let store = Arc::clone(&store);
                let api = api.clone();
                async move { bot::message_handler(bot, msg, store, api).await }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let store = Arc::clone(&store);
            let api = api.clone();
            move |bot: Bot, q: teloxide::types::CallbackQuery| {
                let store = Arc::clone(&store);
                let api = api.clone();
                async move { bot::callback_handler(bot, q, store, api).await }
            }
        }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    Ok(())
}
