use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub recipient_id: ObjectId,
    #[serde(default)]
    pub topic_id: Option<ObjectId>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    /// Opaque navigation data (order id, table number, status, ...).
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub is_read: bool,
    pub read_at: Option<DateTime>,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewOrder,
    OrderStatus,
    MenuUpdate,
    System,
    Review,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewOrder => "new_order",
            NotificationKind::OrderStatus => "order_status",
            NotificationKind::MenuUpdate => "menu_update",
            NotificationKind::System => "system",
            NotificationKind::Review => "review",
        }
    }

    /// Live event name used when this kind is pushed to a channel.
    pub fn event_name(&self) -> &'static str {
        match self {
            NotificationKind::NewOrder => "order:new",
            NotificationKind::OrderStatus => "order:updated",
            _ => "notification:new",
        }
    }
}

impl Notification {
    pub const COLLECTION: &'static str = "notifications";

    /// A fresh, unread record. The id is left for the store to assign.
    pub fn new(
        recipient_id: ObjectId,
        topic_id: Option<ObjectId>,
        kind: NotificationKind,
        title: String,
        body: String,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: None,
            recipient_id,
            topic_id,
            kind,
            title,
            body,
            payload,
            is_read: false,
            read_at: None,
            created_at: DateTime::now(),
        }
    }

    pub fn mark_read(&mut self, at: DateTime) {
        if !self.is_read {
            self.is_read = true;
            self.read_at = Some(at);
        }
    }
}
