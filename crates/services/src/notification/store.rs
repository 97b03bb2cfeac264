use async_trait::async_trait;
use bson::oid::ObjectId;
use qrmenu_db::models::{Notification, NotificationKind};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::dao::base::{DaoError, DaoResult, PaginatedResult, PaginationParams};

/// Input to `NotificationStore::create`. Everything the store does not assign
/// itself (id, read state, creation time).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NotificationDraft {
    pub recipient_id: ObjectId,
    pub topic_id: Option<ObjectId>,
    pub kind: NotificationKind,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 1000))]
    pub body: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl NotificationDraft {
    /// Builds a draft from the string ids producers carry around. A malformed
    /// recipient is the one way creation can be refused up front.
    pub fn from_raw_ids(
        kind: NotificationKind,
        recipient_id: &str,
        topic_id: Option<&str>,
        title: impl Into<String>,
        body: impl Into<String>,
        payload: serde_json::Value,
    ) -> DaoResult<Self> {
        let recipient_id = ObjectId::parse_str(recipient_id)
            .map_err(|_| DaoError::InvalidRecipient(recipient_id.to_string()))?;
        let topic_id = topic_id
            .map(ObjectId::parse_str)
            .transpose()
            .map_err(|e| DaoError::Validation(format!("Invalid topic_id: {e}")))?;

        Ok(Self {
            recipient_id,
            topic_id,
            kind,
            title: title.into(),
            body: body.into(),
            payload,
        })
    }

    pub fn into_notification(self) -> Notification {
        Notification::new(
            self.recipient_id,
            self.topic_id,
            self.kind,
            self.title,
            self.body,
            self.payload,
        )
    }
}

/// Durable per-recipient notification record.
///
/// Every operation is scoped to a recipient: a notification that exists but
/// belongs to someone else is reported as `DaoError::NotFound`.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persists a new unread notification, then trims the recipient's set to
    /// the configured retention cap. Eviction has converged by the time this
    /// returns.
    async fn create(&self, draft: NotificationDraft) -> DaoResult<Notification>;

    /// Newest first. `params` are clamped by the store.
    async fn list(
        &self,
        recipient_id: ObjectId,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Notification>>;

    async fn unread_count(&self, recipient_id: ObjectId) -> DaoResult<u64>;

    /// Idempotent: an already-read notification is left untouched.
    async fn mark_read(&self, recipient_id: ObjectId, notification_id: ObjectId)
    -> DaoResult<()>;

    /// Returns how many notifications flipped to read.
    async fn mark_all_read(&self, recipient_id: ObjectId) -> DaoResult<u64>;

    async fn delete(&self, recipient_id: ObjectId, notification_id: ObjectId) -> DaoResult<()>;

    /// Keeps the `keep` most recent by `created_at`, returns how many were
    /// removed.
    async fn evict_oldest(&self, recipient_id: ObjectId, keep: u64) -> DaoResult<u64>;
}
