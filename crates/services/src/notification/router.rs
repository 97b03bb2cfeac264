use std::sync::Arc;

use bson::oid::ObjectId;
use qrmenu_db::models::{Notification, NotificationKind};
use tracing::{debug, error, info};
use validator::Validate;

use super::order::OrderSummary;
use super::store::{NotificationDraft, NotificationStore};
use super::view::NotificationView;
use crate::dao::base::{DaoError, DaoResult};
use crate::realtime::registry::ConnectionRegistry;

/// Outcome of one routed event.
#[derive(Debug, Clone)]
pub struct RoutedEvent {
    pub notification: Notification,
    /// Distinct live channels the push was addressed to.
    pub targets: usize,
    /// How many of those accepted the frame.
    pub delivered: usize,
}

/// Turns a domain event into a stored notification plus a live push.
///
/// The store write is the durability boundary: if it fails nothing is pushed
/// and the error goes back to the producer. Delivery problems never do.
#[derive(Clone)]
pub struct EventRouter {
    store: Arc<dyn NotificationStore>,
    registry: Arc<ConnectionRegistry>,
}

impl EventRouter {
    pub fn new(store: Arc<dyn NotificationStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, registry }
    }

    pub async fn route_event(&self, draft: NotificationDraft) -> DaoResult<RoutedEvent> {
        draft
            .validate()
            .map_err(|e| DaoError::Validation(e.to_string()))?;

        let recipient_id = draft.recipient_id;
        let topic_id = draft.topic_id;
        let kind = draft.kind;

        let notification = match self.store.create(draft).await {
            Ok(n) => n,
            Err(e) => {
                error!(%recipient_id, kind = kind.as_str(), %e, "Notification not persisted, skipping push");
                return Err(e);
            }
        };

        let view = NotificationView::from(&notification);
        let data = serde_json::to_value(&view).unwrap_or_default();

        let targets = self.registry.targets(&recipient_id, topic_id.as_ref());
        let target_count = targets.len();
        let delivered = if targets.is_empty() {
            debug!(%recipient_id, "Recipient offline, stored only");
            0
        } else {
            self.registry.send_many(targets, kind.event_name(), &data)
        };

        info!(
            notification_id = %view.id,
            %recipient_id,
            topic_id = ?topic_id,
            kind = kind.as_str(),
            targets = target_count,
            delivered,
            "Notification routed"
        );

        Ok(RoutedEvent {
            notification,
            targets: target_count,
            delivered,
        })
    }

    /// Entry point for producers that carry ids as strings. A recipient that
    /// is not a valid id fails with `InvalidRecipient` before anything is
    /// stored.
    pub async fn route_raw_event(
        &self,
        kind: NotificationKind,
        recipient_id: &str,
        topic_id: Option<&str>,
        title: impl Into<String>,
        body: impl Into<String>,
        payload: serde_json::Value,
    ) -> DaoResult<RoutedEvent> {
        let draft = NotificationDraft::from_raw_ids(kind, recipient_id, topic_id, title, body, payload)?;
        self.route_event(draft).await
    }

    pub async fn route_new_order(
        &self,
        owner_id: ObjectId,
        restaurant_id: ObjectId,
        order: &OrderSummary,
    ) -> DaoResult<RoutedEvent> {
        let (title, body) = order.new_order_text();
        self.route_order(NotificationKind::NewOrder, owner_id, restaurant_id, order, title, body)
            .await
    }

    pub async fn route_order_status(
        &self,
        owner_id: ObjectId,
        restaurant_id: ObjectId,
        order: &OrderSummary,
    ) -> DaoResult<RoutedEvent> {
        let (title, body) = order.status_text();
        self.route_order(NotificationKind::OrderStatus, owner_id, restaurant_id, order, title, body)
            .await
    }

    async fn route_order(
        &self,
        kind: NotificationKind,
        owner_id: ObjectId,
        restaurant_id: ObjectId,
        order: &OrderSummary,
        title: String,
        body: String,
    ) -> DaoResult<RoutedEvent> {
        self.route_event(NotificationDraft {
            recipient_id: owner_id,
            topic_id: Some(restaurant_id),
            kind,
            title,
            body,
            payload: order.payload(),
        })
        .await
    }
}
