//! Feature Entitlements
//!
//! Resolves which paid features are active for a session from two
//! subscription documents:
//! - `subscription_config.json` gates speed-sign assistance
//! - `ins_subscription_config.json` gates session recording
//!
//! Documents are read once and never written. A missing or malformed
//! document means "not entitled".

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Entitlement error types
#[derive(Error, Debug)]
pub enum EntitlementError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Malformed subscription document {path}: {source}")]
    Malformed {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid expiry time: {0}")]
    InvalidExpiry(String),
}

/// Subscription record; the recording document suffixes every key with `_ins`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(alias = "subscription_status_ins")]
    pub subscription_status: bool,
    #[serde(default, alias = "purchase_time_ins")]
    pub purchase_time: Option<String>,
    #[serde(default, alias = "expiry_time_ins")]
    pub expiry_time: Option<String>,
}

impl Subscription {
    /// Parse a subscription document
    pub fn from_json(text: &str, path: &str) -> Result<Self, EntitlementError> {
        serde_json::from_str(text).map_err(|source| EntitlementError::Malformed {
            path: path.to_string(),
            source,
        })
    }

    /// Load a subscription document
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EntitlementError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EntitlementError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text, &path.display().to_string())
    }

    /// Active iff the status flag is set and the expiry, if any, lies after `now`
    pub fn is_active_at(&self, now: NaiveDateTime) -> Result<bool, EntitlementError> {
        if !self.subscription_status {
            return Ok(false);
        }
        match &self.expiry_time {
            None => Ok(true),
            Some(expiry) => Ok(now < parse_expiry(expiry)?),
        }
    }
}

/// Parse an ISO-8601 timestamp; naive timestamps are local time
fn parse_expiry(text: &str) -> Result<NaiveDateTime, EntitlementError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Local).naive_local());
    }
    text.parse::<NaiveDateTime>()
        .map_err(|e| EntitlementError::InvalidExpiry(format!("{}: {}", text, e)))
}

/// Locations of the subscription documents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementConfig {
    /// Speed-sign assistance subscription
    pub speed_assist_path: PathBuf,
    /// Recording (insurance companion) subscription
    pub recording_path: PathBuf,
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            speed_assist_path: PathBuf::from("subscription_config.json"),
            recording_path: PathBuf::from("ins_subscription_config.json"),
        }
    }
}

/// Resolved entitlements for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlements {
    /// Speed-sign assistance
    pub speed_assist: bool,
    /// Session recording
    pub recording: bool,
}

impl Entitlements {
    /// Resolve both entitlements at the current local time
    pub fn resolve(config: &EntitlementConfig) -> Self {
        Self::resolve_at(config, Local::now().naive_local())
    }

    /// Resolve both entitlements at `now`
    pub fn resolve_at(config: &EntitlementConfig, now: NaiveDateTime) -> Self {
        let entitlements = Self {
            speed_assist: resolve_one(&config.speed_assist_path, now),
            recording: resolve_one(&config.recording_path, now),
        };
        info!(
            "Entitlements: speed assist {}, recording {}",
            entitlements.speed_assist, entitlements.recording
        );
        entitlements
    }
}

fn resolve_one(path: &Path, now: NaiveDateTime) -> bool {
    match Subscription::load(path).and_then(|s| s.is_active_at(now)) {
        Ok(active) => active,
        Err(e) => {
            warn!("Treating subscription as inactive: {}", e);
            false
        }
    }
}
