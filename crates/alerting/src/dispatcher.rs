//! Alert Dispatcher Implementation

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::Notifier;

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Cooldown period between spoken alerts (seconds)
    pub cooldown_seconds: u64,
    /// External text-to-speech program; alerts are only logged when unset
    pub speech_command: Option<String>,
    /// Arguments passed before the message
    pub speech_args: Vec<String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 7,
            speech_command: None,
            speech_args: Vec::new(),
        }
    }
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

/// Dispatch timestamp, owned by the caller and threaded through every call
#[derive(Debug, Clone, Default)]
pub struct AlertState {
    /// Last time an alert was handed to the notifier
    pub last_dispatch: Option<Instant>,
    /// Number of dispatched alerts
    pub dispatch_count: usize,
}

/// Cooldown gate in front of a [`Notifier`]
pub struct AlertDispatcher {
    config: AlertConfig,
    notifier: Arc<dyn Notifier>,
}

impl AlertDispatcher {
    /// Create a new alert dispatcher
    pub fn new(config: AlertConfig, notifier: Arc<dyn Notifier>) -> Self {
        info!("Creating alert dispatcher with config: {:?}", config);
        Self { config, notifier }
    }

    /// Whether the cooldown has elapsed at `now`
    pub fn should_fire(&self, state: &AlertState, now: Instant) -> bool {
        match state.last_dispatch {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.config.cooldown(),
        }
    }

    /// Hand `message` to the notifier unless still cooling down.
    ///
    /// The timestamp is updated before the notifier runs; returns whether the
    /// message was dispatched.
    pub fn dispatch(&self, state: &mut AlertState, message: &str, now: Instant) -> bool {
        if !self.should_fire(state, now) {
            debug!("Alert suppressed: in cooldown period");
            return false;
        }

        state.last_dispatch = Some(now);
        state.dispatch_count += 1;
        info!("Alert dispatched: {} (count: {})", message, state.dispatch_count);
        self.notifier.notify(message.to_string());
        true
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }
}
