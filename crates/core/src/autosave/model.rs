//! Auto-save domain model and tunables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Table name draft auto-saves persist into.
pub const AUTO_SAVES_TABLE: &str = "auto_saves";

/// One persisted draft. At most one row exists per `(owner_id, form_type)`
/// pair; the upsert conflict target enforces it. Rows are mutated in place
/// and never deleted by this subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoSaveRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub owner_id: String,
    pub form_type: String,
    pub form_data: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Tunables for the debounced save controller.
#[derive(Debug, Clone, Copy)]
pub struct AutoSaveConfig {
    /// Quiet period a key must stay idle before its pending payload persists.
    pub quiet_period: Duration,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(750),
        }
    }
}
