//! SmartChat - conversational help-desk widget
//!
//! The interaction core of a help-desk chat box:
//! - Renders an append-only message thread
//! - Forwards typed questions to a remote answer service, one at a time
//! - Answers shortcut-menu topics locally without touching the network
//! - Keeps a single satisfaction prompt attached to the latest answer

pub mod backend;
pub mod chat;
pub mod config;
pub mod protocol;
pub mod tui;

pub use backend::{AnswerService, FeedbackReporter, HttpAnswerService, LegacyQaProcess};
pub use chat::{ChatWidget, FeedbackController, MenuRouter, RenderSink, RequestGate, ThreadStore};
pub use config::{BackendKind, LegacyConfig, SmartChatConfig};

/// Result type for SmartChat operations
pub type Result<T> = std::result::Result<T, SmartChatError>;

/// Errors that can occur in SmartChat
#[derive(Debug, thiserror::Error)]
pub enum SmartChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to reach answer service: {0}")]
    Transport(String),

    #[error("Answer service returned {status}")]
    Status { status: u16 },

    #[error("Legacy QA process failed: {0}")]
    LegacyProcess(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
