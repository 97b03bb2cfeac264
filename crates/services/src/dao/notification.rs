use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime};
use mongodb::Database;
use qrmenu_db::models::Notification;
use tracing::{debug, warn};

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};
use crate::notification::store::{NotificationDraft, NotificationStore};

/// MongoDB-backed `NotificationStore`.
pub struct NotificationDao {
    pub base: BaseDao<Notification>,
    retention_keep: u64,
    max_per_page: u64,
}

impl NotificationDao {
    pub fn new(db: &Database, retention_keep: u64, max_per_page: u64) -> Self {
        Self {
            base: BaseDao::new(db, Notification::COLLECTION),
            retention_keep,
            max_per_page,
        }
    }

    fn newest_first() -> bson::Document {
        doc! { "created_at": -1, "_id": -1 }
    }
}

#[async_trait]
impl NotificationStore for NotificationDao {
    async fn create(&self, draft: NotificationDraft) -> DaoResult<Notification> {
        let recipient_id = draft.recipient_id;
        let mut notification = draft.into_notification();

        let id = self.base.insert_one(&notification).await?;
        notification.id = Some(id);

        // The record is already durable; a failed trim only delays retention.
        if let Err(e) = self.evict_oldest(recipient_id, self.retention_keep).await {
            warn!(%recipient_id, %e, "Retention eviction failed");
        }

        Ok(notification)
    }

    async fn list(
        &self,
        recipient_id: ObjectId,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Notification>> {
        let params = params.clamped(self.max_per_page);
        self.base
            .find_paginated(
                doc! { "recipient_id": recipient_id },
                Self::newest_first(),
                &params,
            )
            .await
    }

    async fn unread_count(&self, recipient_id: ObjectId) -> DaoResult<u64> {
        self.base
            .count(doc! { "recipient_id": recipient_id, "is_read": false })
            .await
    }

    async fn mark_read(
        &self,
        recipient_id: ObjectId,
        notification_id: ObjectId,
    ) -> DaoResult<()> {
        let modified = self
            .base
            .update_one(
                doc! { "_id": notification_id, "recipient_id": recipient_id, "is_read": false },
                doc! { "$set": { "is_read": true, "read_at": DateTime::now() } },
            )
            .await?;

        if modified {
            return Ok(());
        }

        // Nothing flipped: either already read (fine) or not ours (404).
        let owned = self
            .base
            .count(doc! { "_id": notification_id, "recipient_id": recipient_id })
            .await?;
        if owned == 0 {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }

    async fn mark_all_read(&self, recipient_id: ObjectId) -> DaoResult<u64> {
        self.base
            .update_many(
                doc! { "recipient_id": recipient_id, "is_read": false },
                doc! { "$set": { "is_read": true, "read_at": DateTime::now() } },
            )
            .await
    }

    async fn delete(&self, recipient_id: ObjectId, notification_id: ObjectId) -> DaoResult<()> {
        let deleted = self
            .base
            .hard_delete(doc! { "_id": notification_id, "recipient_id": recipient_id })
            .await?;
        if deleted == 0 {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }

    async fn evict_oldest(&self, recipient_id: ObjectId, keep: u64) -> DaoResult<u64> {
        let stale = self
            .base
            .find_ids(
                doc! { "recipient_id": recipient_id },
                Self::newest_first(),
                keep,
            )
            .await?;

        if stale.is_empty() {
            return Ok(0);
        }

        let removed = self
            .base
            .hard_delete(doc! { "_id": { "$in": stale }, "recipient_id": recipient_id })
            .await?;
        debug!(%recipient_id, removed, keep, "Evicted oldest notifications");
        Ok(removed)
    }
}
