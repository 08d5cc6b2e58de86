//! Per-marker status reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::message::MarkerId;

/// Severity of a marker status entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    #[default]
    Ok,
    Warn,
    Error,
}

impl std::fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatusLevel::Ok => "ok",
            StatusLevel::Warn => "warn",
            StatusLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Receiver for user-visible marker diagnostics
pub trait StatusSink {
    fn set_marker_status(&mut self, id: &MarkerId, level: StatusLevel, text: &str);

    fn clear_marker_status(&mut self, id: &MarkerId);
}

/// Latest status of one marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStatus {
    pub level: StatusLevel,
    pub text: String,
    pub updated_at: DateTime<Utc>,
}

/// In-memory status table keyed by marker identity
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    entries: BTreeMap<MarkerId, MarkerStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &MarkerId) -> Option<&MarkerStatus> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MarkerId, &MarkerStatus)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most severe level across all markers
    pub fn worst_level(&self) -> StatusLevel {
        self.entries
            .values()
            .map(|status| status.level)
            .max()
            .unwrap_or_default()
    }
}

impl StatusSink for StatusBoard {
    fn set_marker_status(&mut self, id: &MarkerId, level: StatusLevel, text: &str) {
        self.entries.insert(
            id.clone(),
            MarkerStatus {
                level,
                text: text.to_string(),
                updated_at: Utc::now(),
            },
        );
    }

    fn clear_marker_status(&mut self, id: &MarkerId) {
        self.entries.remove(id);
    }
}
