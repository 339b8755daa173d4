//! # Session Store Module
//!
//! Owned table of all per-session state, indexed by chat id: persisted
//! [`Settings`], the transient flow cursor, the upstream cache and the ids
//! of the messages from the last render. Handlers receive the store behind
//! an `Arc<tokio::sync::Mutex<_>>` instead of reaching for globals; the
//! lock is released before any upstream call.

use std::collections::HashMap;
use std::path::PathBuf;

use teloxide::types::MessageId;

use crate::cache::SessionCache;
use crate::flow::FlowStep;
use crate::settings::{persist_or_log, Settings, SettingsMap};

/// All mutable per-session state plus the settings file location
pub struct SessionStore {
    settings: SettingsMap,
    flow: HashMap<String, FlowStep>,
    cache: HashMap<String, SessionCache>,
    rendered: HashMap<String, Vec<MessageId>>,
    storage_path: PathBuf,
}

impl SessionStore {
    pub fn new(settings: SettingsMap, storage_path: PathBuf) -> Self {
        Self {
            settings,
            flow: HashMap::new(),
            cache: HashMap::new(),
            rendered: HashMap::new(),
            storage_path,
        }
    }

    /// Settings for the session, created lazily with defaults
    pub fn settings_mut(&mut self, session_id: &str) -> &mut Settings {
        self.settings
            .entry(session_id.to_string())
            .or_insert_with(Settings::default)
    }

    /// Snapshot of the session's settings (defaults when absent)
    pub fn settings(&self, session_id: &str) -> Settings {
        self.settings.get(session_id).cloned().unwrap_or_default()
    }

    /// Session ids with an enabled subscription, for the polling sweep
    pub fn subscribed_sessions(&self) -> Vec<String> {
        self.settings
            .iter()
            .filter(|(_, s)| s.subscribed)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn flow_step(&self, session_id: &str) -> Option<FlowStep> {
        self.flow.get(session_id).copied()
    }

    pub fn set_flow_step(&mut self, session_id: &str, step: FlowStep) {
        self.flow.insert(session_id.to_string(), step);
    }

    /// Reset the session to "no active flow"
    pub fn clear_flow(&mut self, session_id: &str) {
        self.flow.remove(session_id);
    }

    pub fn cache_mut(&mut self, session_id: &str) -> &mut SessionCache {
        self.cache
            .entry(session_id.to_string())
            .or_insert_with(SessionCache::default)
    }

    /// Take the message ids of the previous render, leaving it empty
    pub fn take_rendered(&mut self, session_id: &str) -> Vec<MessageId> {
        self.rendered.remove(session_id).unwrap_or_default()
    }

    pub fn set_rendered(&mut self, session_id: &str, ids: Vec<MessageId>) {
        self.rendered.insert(session_id.to_string(), ids);
    }

    /// Rewrite the settings file; failures are logged, memory stays authoritative
    pub async fn persist(&self) {
        persist_or_log(&self.storage_path, &self.settings).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(SettingsMap::new(), PathBuf::from("filters.json"))
    }

    #[test]
    fn test_settings_created_lazily_with_defaults() {
        let mut store = store();
        let settings = store.settings_mut("100");
        assert!(settings.department_ids.is_empty());
        assert_eq!(settings.page_size, "5");

        settings.department_ids.push("d1".to_string());
        assert_eq!(store.settings("100").department_ids, vec!["d1"]);
    }

    #[test]
    fn test_flow_cursor_lifecycle() {
        let mut store = store();
        assert!(store.flow_step("100").is_none());

        store.set_flow_step("100", FlowStep::Dates);
        assert_eq!(store.flow_step("100"), Some(FlowStep::Dates));

        store.clear_flow("100");
        assert!(store.flow_step("100").is_none());
    }

    #[test]
    fn test_subscribed_sessions_filtered() {
        let mut store = store();
        store.settings_mut("100").subscribed = true;
        store.settings_mut("200");
        store.settings_mut("300").subscribed = true;

        let mut subscribed = store.subscribed_sessions();
        subscribed.sort();
        assert_eq!(subscribed, vec!["100", "300"]);
    }

    #[test]
    fn test_rendered_ids_taken_once() {
        let mut store = store();
        store.set_rendered("100", vec![MessageId(1), MessageId(2)]);
        assert_eq!(store.take_rendered("100").len(), 2);
        assert!(store.take_rendered("100").is_empty());
    }
}
