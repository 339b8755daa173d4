//! # Review Radar Telegram Bot
//!
//! A Telegram bot for browsing paginated restaurant-review comments from an
//! upstream REST API. Users configure multi-field filters through a
//! step-by-step flow and can subscribe to periodic notifications about new
//! reviews matching their filters.

pub mod api;
pub mod bot;
pub mod cache;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod flow;
pub mod poller;
pub mod session;
pub mod settings;
