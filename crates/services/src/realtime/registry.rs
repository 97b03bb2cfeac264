use std::collections::{HashMap, HashSet};

use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::protocol::{self, CloseReason, Outbound};

pub type ChannelId = Uuid;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Channel {0} is already registered")]
    DuplicateChannel(ChannelId),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Channel {0} is not registered")]
    UnknownChannel(ChannelId),
    #[error("Channel {0} is closed")]
    ChannelClosed(ChannelId),
    #[error("Channel {0} outbound buffer is full")]
    Backpressure(ChannelId),
}

struct ChannelEntry {
    owner_id: ObjectId,
    topics: HashSet<ObjectId>,
    sender: mpsc::Sender<Outbound>,
    connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub channel_id: ChannelId,
    pub owner_id: ObjectId,
    pub topics: Vec<ObjectId>,
    pub connected_at: DateTime<Utc>,
}

/// Forward map plus both reverse indexes. Kept behind one lock so a reader
/// never sees a channel in one index and not the other.
#[derive(Default)]
struct Index {
    channels: HashMap<ChannelId, ChannelEntry>,
    by_owner: HashMap<ObjectId, HashSet<ChannelId>>,
    by_topic: HashMap<ObjectId, HashSet<ChannelId>>,
}

impl Index {
    fn detach(set_map: &mut HashMap<ObjectId, HashSet<ChannelId>>, key: &ObjectId, id: &ChannelId) {
        if let Some(set) = set_map.get_mut(key) {
            set.remove(id);
            if set.is_empty() {
                set_map.remove(key);
            }
        }
    }
}

/// Tracks every live channel by owner and by topic.
///
/// Channels belong to exactly one owner and any number of topics. The same
/// owner may hold several channels (tabs, devices).
#[derive(Default)]
pub struct ConnectionRegistry {
    index: RwLock<Index>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        channel_id: ChannelId,
        owner_id: ObjectId,
        sender: mpsc::Sender<Outbound>,
    ) -> Result<(), RegistryError> {
        let mut index = self.index.write();
        if index.channels.contains_key(&channel_id) {
            return Err(RegistryError::DuplicateChannel(channel_id));
        }

        index.channels.insert(
            channel_id,
            ChannelEntry {
                owner_id,
                topics: HashSet::new(),
                sender,
                connected_at: Utc::now(),
            },
        );
        index.by_owner.entry(owner_id).or_default().insert(channel_id);

        debug!(%channel_id, %owner_id, "Channel registered");
        Ok(())
    }

    /// Returns false when the channel is unknown or already in the topic.
    pub fn join_topic(&self, channel_id: ChannelId, topic_id: ObjectId) -> bool {
        let mut index = self.index.write();
        let Some(entry) = index.channels.get_mut(&channel_id) else {
            return false;
        };
        if !entry.topics.insert(topic_id) {
            return false;
        }
        index.by_topic.entry(topic_id).or_default().insert(channel_id);
        true
    }

    pub fn leave_topic(&self, channel_id: ChannelId, topic_id: ObjectId) -> bool {
        let mut index = self.index.write();
        let Some(entry) = index.channels.get_mut(&channel_id) else {
            return false;
        };
        if !entry.topics.remove(&topic_id) {
            return false;
        }
        Index::detach(&mut index.by_topic, &topic_id, &channel_id);
        true
    }

    /// Drops the channel from every index. Safe to call more than once.
    pub fn unregister(&self, channel_id: ChannelId) -> Option<ChannelInfo> {
        let mut index = self.index.write();
        let entry = index.channels.remove(&channel_id)?;

        Index::detach(&mut index.by_owner, &entry.owner_id, &channel_id);
        for topic in &entry.topics {
            Index::detach(&mut index.by_topic, topic, &channel_id);
        }

        debug!(%channel_id, owner_id = %entry.owner_id, "Channel unregistered");
        Some(ChannelInfo {
            channel_id,
            owner_id: entry.owner_id,
            topics: entry.topics.into_iter().collect(),
            connected_at: entry.connected_at,
        })
    }

    pub fn channels_for_owner(&self, owner_id: &ObjectId) -> HashSet<ChannelId> {
        self.index
            .read()
            .by_owner
            .get(owner_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn channels_for_topic(&self, topic_id: &ObjectId) -> HashSet<ChannelId> {
        self.index
            .read()
            .by_topic
            .get(topic_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Union of the owner's channels and the topic's channels, read under a
    /// single lock. A channel in both appears once.
    pub fn targets(&self, owner_id: &ObjectId, topic_id: Option<&ObjectId>) -> HashSet<ChannelId> {
        let index = self.index.read();
        let mut targets = index.by_owner.get(owner_id).cloned().unwrap_or_default();
        if let Some(set) = topic_id.and_then(|t| index.by_topic.get(t)) {
            targets.extend(set.iter().copied());
        }
        targets
    }

    pub fn topics_of(&self, channel_id: &ChannelId) -> Vec<ObjectId> {
        self.index
            .read()
            .channels
            .get(channel_id)
            .map(|e| e.topics.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn info(&self, channel_id: &ChannelId) -> Option<ChannelInfo> {
        let index = self.index.read();
        index.channels.get(channel_id).map(|e| ChannelInfo {
            channel_id: *channel_id,
            owner_id: e.owner_id,
            topics: e.topics.iter().copied().collect(),
            connected_at: e.connected_at,
        })
    }

    /// Queues one event frame for a channel. Never blocks: a full buffer drops
    /// the frame, a closed one evicts the channel.
    pub fn send(&self, channel_id: ChannelId, event: &str, data: &serde_json::Value) -> bool {
        let text = protocol::frame(event, data);
        self.deliver(channel_id, Outbound::Event(text))
    }

    /// Serializes once and fans out. Returns how many channels accepted it.
    pub fn send_many<I>(&self, channel_ids: I, event: &str, data: &serde_json::Value) -> usize
    where
        I: IntoIterator<Item = ChannelId>,
    {
        let text = protocol::frame(event, data);
        channel_ids
            .into_iter()
            .filter(|id| self.deliver(*id, Outbound::Event(text.clone())))
            .count()
    }

    /// Asks every channel's writer to close. Sessions unregister themselves
    /// as their writers stop; a channel whose queue can't take the request
    /// is unregistered here, which ends its writer once the queue drains.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let senders: Vec<(ChannelId, mpsc::Sender<Outbound>)> = self
            .index
            .read()
            .channels
            .iter()
            .map(|(id, e)| (*id, e.sender.clone()))
            .collect();

        let count = senders.len();
        for (channel_id, sender) in senders {
            if let Err(e) = sender.try_send(Outbound::Close(reason)) {
                warn!(%channel_id, %e, "Close request not queued, unregistering");
                self.unregister(channel_id);
            }
        }
        info!(count, %reason, "Closing all channels");
        count
    }

    pub fn connection_count(&self) -> usize {
        self.index.read().channels.len()
    }

    pub fn owner_count(&self) -> usize {
        self.index.read().by_owner.len()
    }

    fn deliver(&self, channel_id: ChannelId, outbound: Outbound) -> bool {
        match self.try_deliver(channel_id, outbound) {
            Ok(()) => true,
            Err(e) => {
                self.on_delivery_failure(e);
                false
            }
        }
    }

    fn try_deliver(&self, channel_id: ChannelId, outbound: Outbound) -> Result<(), DeliveryError> {
        let sender = self
            .index
            .read()
            .channels
            .get(&channel_id)
            .map(|e| e.sender.clone())
            .ok_or(DeliveryError::UnknownChannel(channel_id))?;

        sender.try_send(outbound).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Backpressure(channel_id),
            TrySendError::Closed(_) => DeliveryError::ChannelClosed(channel_id),
        })
    }

    fn on_delivery_failure(&self, err: DeliveryError) {
        match err {
            DeliveryError::ChannelClosed(channel_id) => {
                warn!(%channel_id, "Channel writer gone, unregistering");
                self.unregister(channel_id);
            }
            DeliveryError::Backpressure(channel_id) => {
                warn!(%channel_id, "Outbound buffer full, frame dropped");
            }
            DeliveryError::UnknownChannel(channel_id) => {
                debug!(%channel_id, "Send to unknown channel ignored");
            }
        }
    }
}
