//! Notification domain models and the change-feed event shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::toast::ToastVariant;

/// Table name the notification store mirrors.
pub const NOTIFICATIONS_TABLE: &str = "notifications";

/// Severity of a notification, mapped onto toast variants for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
    Info,
}

impl NotificationKind {
    pub fn toast_variant(self) -> ToastVariant {
        match self {
            Self::Success => ToastVariant::Success,
            Self::Warning => ToastVariant::Warning,
            Self::Error => ToastVariant::Destructive,
            Self::Info => ToastVariant::Default,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
}

/// Read state. Transitions only `Unread -> Read`, never back, and only via
/// an explicit mark-as-read action (local optimistic or remote-confirmed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Unread,
    Read,
}

/// One row of the server-side notification table, mirrored client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub reference_type: String,
    pub reference_id: String,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.status == NotificationStatus::Unread
    }
}

/// A change-feed event for the notification table, in backend send order.
#[derive(Debug, Clone, PartialEq)]
pub enum RowEvent {
    Inserted(Notification),
    Updated(Notification),
    Deleted { id: String },
}
