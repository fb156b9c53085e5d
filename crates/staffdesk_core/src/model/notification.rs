//! In-app notification model.

use crate::model::identity::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    TaskAssignment,
    TaskUpdate,
    StatusChange,
    General,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskAssignment => "TASK_ASSIGNMENT",
            Self::TaskUpdate => "TASK_UPDATE",
            Self::StatusChange => "STATUS_CHANGE",
            Self::General => "GENERAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TASK_ASSIGNMENT" => Some(Self::TaskAssignment),
            "TASK_UPDATE" => Some(Self::TaskUpdate),
            "STATUS_CHANGE" => Some(Self::StatusChange),
            "GENERAL" => Some(Self::General),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub link: String,
    pub is_read: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Notification content before it is persisted; always starts unread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub link: String,
}

/// Recipient inbox page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationInbox {
    pub notifications: Vec<Notification>,
    pub unread_count: u32,
}
