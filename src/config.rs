//! # Configuration Module
//!
//! Environment-based startup configuration. Missing required variables are
//! fatal: the process reports the problem and does not start.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

/// Poll interval for the subscription sweep
pub const CHECK_INTERVAL: Duration = Duration::from_secs(3600);

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_STORAGE: &str = "filters.json";

/// Startup configuration, read once from the environment
#[derive(Clone, Debug)]
pub struct Config {
    pub bot_token: String,
    /// Public HTTPS base URL Telegram posts updates to
    pub webhook_url: Url,
    pub port: u16,
    /// Upstream review API base URL
    pub api_base: String,
    pub storage_path: PathBuf,
    pub check_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").context("BOT_TOKEN is required")?;
        let webhook_url = env::var("WEBHOOK_URL").context("WEBHOOK_URL is required")?;
        let webhook_url =
            Url::parse(&webhook_url).context("WEBHOOK_URL must be a valid URL")?;
        let api_base = env::var("API").context("API is required")?;
        let port = parse_port(env::var("PORT").ok())?;
        let storage_path = env::var("FILTERS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE));

        Ok(Self {
            bot_token,
            webhook_url,
            port,
            api_base,
            storage_path,
            check_interval: CHECK_INTERVAL,
        })
    }
}

fn parse_port(value: Option<String>) -> Result<u16> {
    match value {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("PORT must be a number, got {raw:?}")),
        None => Ok(DEFAULT_PORT),
    }
}
