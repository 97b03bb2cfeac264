use serde::{Deserialize, Serialize};
use serde_json::json;

/// What the order service hands over once its own order write has committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: String,
    pub order_number: Option<String>,
    pub table_number: String,
    pub total: f64,
    pub item_count: u32,
    pub status: String,
}

impl OrderSummary {
    pub fn payload(&self) -> serde_json::Value {
        json!({
            "orderId": self.order_id,
            "orderNumber": self.order_number,
            "tableNumber": self.table_number,
            "total": self.total,
            "itemCount": self.item_count,
            "status": self.status,
        })
    }

    pub fn display_number(&self) -> &str {
        self.order_number.as_deref().unwrap_or(&self.order_id)
    }

    pub fn new_order_text(&self) -> (String, String) {
        (
            "New Order Received".to_string(),
            format!("Table {} placed an order", self.table_number),
        )
    }

    pub fn status_text(&self) -> (String, String) {
        (
            "Order Status Updated".to_string(),
            format!("Order #{} is now {}", self.display_number(), self.status),
        )
    }
}
