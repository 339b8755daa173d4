//! # Settings Module
//!
//! Per-session filter and subscription state, persisted as a single JSON
//! document mapping chat id to [`Settings`]. The whole file is read once at
//! startup and rewritten on every durable mutation; a write failure is
//! logged and the in-memory map remains authoritative.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};

use crate::errors::BotError;

pub const DEFAULT_PAGE_SIZE: &str = "5";

/// Filter and subscription record for one session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Selected departments, in selection order
    pub department_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_before: Option<String>,
    /// One value = exact rating, two values = inclusive range (low, high)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<Vec<u8>>,
    /// Positive integer kept in its string form, as entered
    pub page_size: String,
    /// Cursor for "new since" polling
    #[serde(rename = "lastChecked")]
    pub last_checked: String,
    #[serde(default)]
    pub subscribed: bool,
    /// Set while a flow pass mutates any filter value; never persisted
    #[serde(skip)]
    pub is_val_changes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            department_ids: Vec::new(),
            restaurant_id: None,
            created_at_after: None,
            created_at_before: None,
            stars: None,
            page_size: DEFAULT_PAGE_SIZE.to_string(),
            last_checked: epoch_iso(),
            subscribed: false,
            is_val_changes: false,
        }
    }
}

impl Settings {
    /// Joined form of the stars filter for the upstream `stars` param
    pub fn stars_param(&self) -> Option<String> {
        self.stars.as_ref().map(|values| {
            values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
    }

    /// Human-readable stars filter for the summary message
    pub fn stars_display(&self) -> String {
        match self.stars.as_deref() {
            Some([exact]) => exact.to_string(),
            Some([low, high]) => format!("{low}-{high}"),
            _ => "all".to_string(),
        }
    }

    /// Date portion (`YYYY-MM-DD`) of the polling cursor
    pub fn last_checked_date(&self) -> String {
        match self.last_checked.parse::<DateTime<Utc>>() {
            Ok(ts) => ts.format("%Y-%m-%d").to_string(),
            Err(_) => epoch_iso().split('T').next().unwrap_or("1970-01-01").to_string(),
        }
    }
}

/// ISO timestamp for the Unix epoch, the initial polling cursor
pub fn epoch_iso() -> String {
    DateTime::<Utc>::from_timestamp(0, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Current time in the same ISO form used for `lastChecked`
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub type SettingsMap = HashMap<String, Settings>;

/// Load the settings map, creating an empty file when missing
pub async fn load_settings(path: &Path) -> Result<SettingsMap, BotError> {
    if tokio::fs::try_exists(path).await? {
        let data = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&data)?)
    } else {
        tokio::fs::write(path, "{}").await?;
        Ok(SettingsMap::new())
    }
}

/// Rewrite the whole settings file from the in-memory map
pub async fn save_settings(path: &Path, settings: &SettingsMap) -> Result<(), BotError> {
    let data = serde_json::to_string_pretty(settings)?;
    tokio::fs::write(path, data).await?;
    Ok(())
}

/// Best-effort persistence: log and continue on failure
pub async fn persist_or_log(path: &Path, settings: &SettingsMap) {
    if let Err(e) = save_settings(path, settings).await {
        error!("Failed to persist settings to {}: {e}", path.display());
    }
}
