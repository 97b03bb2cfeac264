use chrono::{DateTime, Utc};
use qrmenu_db::models::{Notification, NotificationKind};
use serde::{Deserialize, Serialize};

/// The shape a notification takes on the wire, both in REST responses and in
/// live pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationView {
    pub id: String,
    pub recipient_id: String,
    pub topic_id: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationView {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.map(|id| id.to_hex()).unwrap_or_default(),
            recipient_id: n.recipient_id.to_hex(),
            topic_id: n.topic_id.map(|id| id.to_hex()),
            kind: n.kind,
            title: n.title.clone(),
            body: n.body.clone(),
            payload: n.payload.clone(),
            is_read: n.is_read,
            read_at: n.read_at.map(|t| t.to_chrono()),
            created_at: n.created_at.to_chrono(),
        }
    }
}

impl From<Notification> for NotificationView {
    fn from(n: Notification) -> Self {
        Self::from(&n)
    }
}
