use async_trait::async_trait;
use bson::{doc, oid::ObjectId};
use mongodb::Database;
use qrmenu_db::models::Restaurant;

use super::base::{BaseDao, DaoResult};
use crate::realtime::membership::TopicMembership;

/// Read-only view over the restaurants collection, used to auto-join an
/// owner's live channels to the restaurants they own.
pub struct RestaurantDao {
    pub base: BaseDao<Restaurant>,
}

impl RestaurantDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Restaurant::COLLECTION),
        }
    }

    pub async fn find_owned(&self, owner_id: ObjectId) -> DaoResult<Vec<Restaurant>> {
        self.base
            .find_many(
                doc! { "owner_id": owner_id, "is_active": true },
                Some(doc! { "created_at": 1 }),
            )
            .await
    }
}

#[async_trait]
impl TopicMembership for RestaurantDao {
    async fn topics_for_owner(&self, owner_id: ObjectId) -> DaoResult<Vec<ObjectId>> {
        Ok(self
            .find_owned(owner_id)
            .await?
            .into_iter()
            .filter_map(|r| r.id)
            .collect())
    }
}
