//! Alerting System
//!
//! Cooldown-gated dispatch of driver alerts and fire-and-forget spoken
//! notifications.

mod dispatcher;
mod notifier;

pub use dispatcher::{AlertConfig, AlertDispatcher, AlertState};
pub use notifier::{CommandSpeaker, LogSpeaker, Notifier, Speaker, SpeechNotifier};

use thiserror::Error;

/// Errors during alert delivery
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Speech failed: {0}")]
    Speech(String),
    #[error("No async runtime available for notifications")]
    NoRuntime,
}
