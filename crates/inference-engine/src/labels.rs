//! Class Label Table

use std::path::Path;

use tracing::info;

use crate::InferenceError;

/// Display names of the stock classifier; index 0 is "no/invalid detection",
/// the last index catches everything unrecognised
pub const DEFAULT_SIGN_LABELS: [&str; 9] = [
    "ERROR",
    "STOP",
    "TURN LEFT",
    "Stay Left",
    "Bump Ahead",
    "Speed Limit 50",
    "ONE WAY",
    "SPEED LIMIT",
    "OTHER",
];

/// Mapping from class index to display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    /// Load a line-delimited label file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| InferenceError::LabelFile(format!("{}: {}", path.display(), e)))?;
        let labels = Self::parse(&text)?;
        info!("Loaded {} sign labels from {}", labels.len(), path.display());
        Ok(labels)
    }

    /// Parse label names, one per line; trailing blank lines are ignored
    pub fn parse(text: &str) -> Result<Self, InferenceError> {
        let mut names: Vec<String> = text.lines().map(|l| l.trim().to_string()).collect();
        while names.last().map_or(false, |n| n.is_empty()) {
            names.pop();
        }
        if names.len() < 2 {
            return Err(InferenceError::LabelFile(format!(
                "expected at least 2 labels, found {}",
                names.len()
            )));
        }
        Ok(Self { names })
    }

    /// Number of known labels
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false; a label set holds at least two names
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Highest known index (the catch-all "OTHER" label)
    pub fn max_label(&self) -> u32 {
        (self.names.len() - 1) as u32
    }

    /// Clamp a raw model output into the known range; negatives map to 0
    pub fn clamp(&self, raw: i64) -> u32 {
        if raw <= 0 {
            0
        } else {
            raw.min(i64::from(self.max_label())) as u32
        }
    }

    /// Display name for a label (out-of-range labels are clamped)
    pub fn name(&self, label: u32) -> &str {
        &self.names[self.clamp(i64::from(label)) as usize]
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            names: DEFAULT_SIGN_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}
