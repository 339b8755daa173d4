//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules for better organization:
//! - `message_handler`: Handles commands and free-text flow input
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `flow_manager`: Renders flow steps and drives cursor transitions
//! - `ui_builder`: Creates keyboards and formats messages

pub mod callback_handler;
pub mod flow_manager;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;
