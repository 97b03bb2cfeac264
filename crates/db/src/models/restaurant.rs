use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// Read-only projection of a restaurant document. The collection is written
/// by the menu/CRUD service; here it only answers "who owns what".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub owner_id: ObjectId,
    pub name: String,
    pub slug: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub created_at: DateTime,
}

fn default_active() -> bool {
    true
}

impl Restaurant {
    pub const COLLECTION: &'static str = "restaurants";
}
