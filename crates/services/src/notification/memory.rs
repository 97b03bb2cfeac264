use std::collections::HashMap;

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use parking_lot::RwLock;
use qrmenu_db::models::Notification;
use tracing::debug;

use super::store::{NotificationDraft, NotificationStore};
use crate::dao::base::{DaoError, DaoResult, MAX_PER_PAGE, PaginatedResult, PaginationParams};

/// Process-local `NotificationStore` for development and tests.
///
/// Each recipient's notifications are kept newest first, so listing is a
/// slice and retention is a truncate.
pub struct InMemoryNotificationStore {
    by_recipient: RwLock<HashMap<ObjectId, Vec<Notification>>>,
    retention_keep: u64,
    max_per_page: u64,
}

impl InMemoryNotificationStore {
    pub fn new(retention_keep: u64) -> Self {
        Self::with_page_limit(retention_keep, MAX_PER_PAGE)
    }

    pub fn with_page_limit(retention_keep: u64, max_per_page: u64) -> Self {
        Self {
            by_recipient: RwLock::new(HashMap::new()),
            retention_keep,
            max_per_page,
        }
    }

    fn newest_first(a: &Notification, b: &Notification) -> std::cmp::Ordering {
        (b.created_at, b.id).cmp(&(a.created_at, a.id))
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, draft: NotificationDraft) -> DaoResult<Notification> {
        let recipient_id = draft.recipient_id;
        let mut notification = draft.into_notification();
        notification.id = Some(ObjectId::new());

        {
            let mut map = self.by_recipient.write();
            let items = map.entry(recipient_id).or_default();
            items.push(notification.clone());
            items.sort_by(Self::newest_first);
        }

        self.evict_oldest(recipient_id, self.retention_keep).await?;
        Ok(notification)
    }

    async fn list(
        &self,
        recipient_id: ObjectId,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Notification>> {
        let params = params.clamped(self.max_per_page);
        let map = self.by_recipient.read();
        let all = map.get(&recipient_id).map(Vec::as_slice).unwrap_or_default();

        let items = all
            .iter()
            .skip(usize::try_from(params.skip()).unwrap_or(usize::MAX))
            .take(params.per_page as usize)
            .cloned()
            .collect();

        Ok(PaginatedResult::new(items, all.len() as u64, &params))
    }

    async fn unread_count(&self, recipient_id: ObjectId) -> DaoResult<u64> {
        let map = self.by_recipient.read();
        Ok(map
            .get(&recipient_id)
            .map(|items| items.iter().filter(|n| !n.is_read).count() as u64)
            .unwrap_or(0))
    }

    async fn mark_read(
        &self,
        recipient_id: ObjectId,
        notification_id: ObjectId,
    ) -> DaoResult<()> {
        let mut map = self.by_recipient.write();
        let notification = map
            .get_mut(&recipient_id)
            .and_then(|items| items.iter_mut().find(|n| n.id == Some(notification_id)))
            .ok_or(DaoError::NotFound)?;

        notification.mark_read(DateTime::now());
        Ok(())
    }

    async fn mark_all_read(&self, recipient_id: ObjectId) -> DaoResult<u64> {
        let mut map = self.by_recipient.write();
        let Some(items) = map.get_mut(&recipient_id) else {
            return Ok(0);
        };

        let now = DateTime::now();
        let mut modified = 0;
        for n in items.iter_mut().filter(|n| !n.is_read) {
            n.mark_read(now);
            modified += 1;
        }
        Ok(modified)
    }

    async fn delete(&self, recipient_id: ObjectId, notification_id: ObjectId) -> DaoResult<()> {
        let mut map = self.by_recipient.write();
        let items = map.get_mut(&recipient_id).ok_or(DaoError::NotFound)?;
        let before = items.len();
        items.retain(|n| n.id != Some(notification_id));
        if items.len() == before {
            return Err(DaoError::NotFound);
        }
        Ok(())
    }

    async fn evict_oldest(&self, recipient_id: ObjectId, keep: u64) -> DaoResult<u64> {
        let mut map = self.by_recipient.write();
        let Some(items) = map.get_mut(&recipient_id) else {
            return Ok(0);
        };

        let keep = usize::try_from(keep).unwrap_or(usize::MAX);
        if items.len() <= keep {
            return Ok(0);
        }
        let removed = (items.len() - keep) as u64;
        items.truncate(keep);
        debug!(%recipient_id, removed, "Evicted oldest notifications");
        Ok(removed)
    }
}
