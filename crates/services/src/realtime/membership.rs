use async_trait::async_trait;
use bson::oid::ObjectId;
use dashmap::DashMap;

use crate::dao::base::DaoResult;

/// Which topics (restaurants) an owner may watch. Answered by the restaurant
/// service; the delivery core only asks.
#[async_trait]
pub trait TopicMembership: Send + Sync {
    async fn topics_for_owner(&self, owner_id: ObjectId) -> DaoResult<Vec<ObjectId>>;
}

/// Membership held in memory, for the memory backend and tests.
#[derive(Default)]
pub struct StaticMembership {
    owned: DashMap<ObjectId, Vec<ObjectId>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, owner_id: ObjectId, topic_id: ObjectId) {
        let mut topics = self.owned.entry(owner_id).or_default();
        if !topics.contains(&topic_id) {
            topics.push(topic_id);
        }
    }
}

#[async_trait]
impl TopicMembership for StaticMembership {
    async fn topics_for_owner(&self, owner_id: ObjectId) -> DaoResult<Vec<ObjectId>> {
        Ok(self
            .owned
            .get(&owner_id)
            .map(|topics| topics.clone())
            .unwrap_or_default())
    }
}
