use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A notification as the server sends it, over REST or in a live push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteNotification {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub recipient_id: String,
    #[serde(default)]
    pub topic_id: Option<String>,
    pub kind: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// Local mirror entry. `id` is the store id once known; `client_temp_id`
/// only lives until a refresh brings the stored record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedNotification {
    pub id: Option<String>,
    pub client_temp_id: Option<String>,
    pub recipient_id: String,
    pub topic_id: Option<String>,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CachedNotification {
    pub fn from_remote(remote: RemoteNotification, client_temp_id: Option<String>) -> Self {
        Self {
            id: remote.id.filter(|id| !id.is_empty()),
            client_temp_id,
            recipient_id: remote.recipient_id,
            topic_id: remote.topic_id,
            kind: remote.kind,
            title: remote.title,
            body: remote.body,
            payload: remote.payload,
            is_read: remote.is_read,
            read_at: remote.read_at,
            created_at: remote.created_at,
        }
    }

    pub fn order_id(&self) -> Option<&str> {
        self.payload.get("orderId").and_then(|v| v.as_str())
    }

    /// Matches either the store id or the temporary one.
    pub fn has_id(&self, id: &str) -> bool {
        self.id.as_deref() == Some(id) || self.client_temp_id.as_deref() == Some(id)
    }
}
