use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use bson::oid::ObjectId;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::heartbeat::{Heartbeat, HeartbeatConfig, HeartbeatStatus};
use super::membership::TopicMembership;
use super::protocol::{ClientMessage, CloseReason, Outbound, events};
use super::registry::{ChannelId, ConnectionRegistry, RegistryError};
use crate::auth::{AuthError, CredentialVerifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Authenticated,
    Active,
    Closing,
    Closed,
    Rejected,
}

impl SessionState {
    fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Authenticated)
                | (Connecting, Rejected)
                | (Connecting, Closed)
                | (Authenticated, Active)
                | (Authenticated, Closing)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Rejected)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Handshake rejected: {0}")]
    Rejected(#[from] AuthError),
    #[error("Invalid session transition {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// What the transport should do after a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Send a ping and keep going.
    Ping,
    /// The peer went quiet for too long.
    Expire,
    /// The session is no longer active; stop ticking.
    Stop,
}

/// One connection attempt, from handshake to close.
///
/// The session owns the channel id and is the only thing that registers or
/// unregisters it. A closed session is never reused: reconnecting means a new
/// `DeliverySession` with a new channel id.
pub struct DeliverySession {
    channel_id: ChannelId,
    state: SessionState,
    owner_id: Option<ObjectId>,
    registry: Arc<ConnectionRegistry>,
    heartbeat: Heartbeat,
    allowed_topics: HashSet<ObjectId>,
    registered: bool,
    close_reason: Option<CloseReason>,
}

impl DeliverySession {
    pub fn new(registry: Arc<ConnectionRegistry>, heartbeat: HeartbeatConfig) -> Self {
        Self {
            channel_id: Uuid::new_v4(),
            state: SessionState::Connecting,
            owner_id: None,
            registry,
            heartbeat: Heartbeat::new(heartbeat, Instant::now()),
            allowed_topics: HashSet::new(),
            registered: false,
            close_reason: None,
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn owner_id(&self) -> Option<ObjectId> {
        self.owner_id
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    pub fn heartbeat_config(&self) -> HeartbeatConfig {
        self.heartbeat.config()
    }

    fn transition(&mut self, next: SessionState) -> Result<(), SessionError> {
        if !self.state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(channel_id = %self.channel_id, from = ?self.state, to = ?next, "Session transition");
        self.state = next;
        Ok(())
    }

    /// Resolves the handshake credential. On failure the session is
    /// `Rejected` and nothing was registered.
    pub fn authenticate(
        &mut self,
        credential: Option<&str>,
        verifier: &dyn CredentialVerifier,
    ) -> Result<ObjectId, SessionError> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                to: SessionState::Authenticated,
            });
        }

        let resolved = credential
            .ok_or(AuthError::MissingCredential)
            .and_then(|c| verifier.resolve_identity(c));

        match resolved {
            Ok(owner_id) => {
                self.owner_id = Some(owner_id);
                self.transition(SessionState::Authenticated)?;
                Ok(owner_id)
            }
            Err(e) => {
                info!(channel_id = %self.channel_id, %e, "Handshake rejected");
                self.transition(SessionState::Rejected)?;
                Err(SessionError::Rejected(e))
            }
        }
    }

    /// Registers the channel, auto-joins the owner's topics and queues the
    /// `connected` frame. Returns the joined topics.
    ///
    /// A failed membership lookup is not fatal: the channel still receives
    /// everything addressed to its owner.
    pub async fn activate(
        &mut self,
        sender: mpsc::Sender<Outbound>,
        membership: &dyn TopicMembership,
    ) -> Result<Vec<ObjectId>, SessionError> {
        let owner_id = match (self.state, self.owner_id) {
            (SessionState::Authenticated, Some(owner_id)) => owner_id,
            (from, _) => {
                return Err(SessionError::InvalidTransition {
                    from,
                    to: SessionState::Active,
                });
            }
        };

        self.registry.register(self.channel_id, owner_id, sender)?;
        self.registered = true;
        self.transition(SessionState::Active)?;
        self.heartbeat.record(Instant::now());

        match membership.topics_for_owner(owner_id).await {
            Ok(topics) => self.allowed_topics = topics.into_iter().collect(),
            Err(e) => warn!(channel_id = %self.channel_id, %owner_id, %e, "Membership lookup failed"),
        }

        let mut joined: Vec<ObjectId> = Vec::with_capacity(self.allowed_topics.len());
        for topic_id in &self.allowed_topics {
            if self.registry.join_topic(self.channel_id, *topic_id) {
                joined.push(*topic_id);
            }
        }

        info!(channel_id = %self.channel_id, %owner_id, topics = joined.len(), "Channel active");
        self.registry.send(
            self.channel_id,
            events::CONNECTED,
            &json!({
                "channel_id": self.channel_id.to_string(),
                "user_id": owner_id.to_hex(),
                "topics": joined.iter().map(|t| t.to_hex()).collect::<Vec<_>>(),
            }),
        );

        Ok(joined)
    }

    /// Any inbound frame proves the peer is alive.
    pub fn record_activity(&mut self, now: Instant) {
        self.heartbeat.record(now);
    }

    /// Handles one client text frame. Replies go out through the registry.
    pub async fn handle_text(&mut self, text: &str, membership: &dyn TopicMembership) {
        if self.state != SessionState::Active {
            return;
        }
        self.record_activity(Instant::now());

        let message = match ClientMessage::parse(text) {
            Ok(m) => m,
            Err(e) => {
                debug!(channel_id = %self.channel_id, %e, "Bad client frame");
                self.send_error(e.code(), &e.to_string());
                return;
            }
        };

        match message {
            ClientMessage::JoinTopic(topic_id) => self.join(topic_id, membership).await,
            ClientMessage::LeaveTopic(topic_id) => {
                self.registry.leave_topic(self.channel_id, topic_id);
                self.registry.send(
                    self.channel_id,
                    events::TOPIC_LEFT,
                    &json!({ "topic_id": topic_id.to_hex() }),
                );
            }
            ClientMessage::Ping => {
                self.registry.send(
                    self.channel_id,
                    events::PONG,
                    &json!({ "ts": chrono::Utc::now().timestamp_millis() }),
                );
            }
            ClientMessage::Pong => {}
        }
    }

    async fn join(&mut self, topic_id: ObjectId, membership: &dyn TopicMembership) {
        if !self.allowed_topics.contains(&topic_id) {
            // Ownership may have changed since activation.
            if let Some(owner_id) = self.owner_id {
                match membership.topics_for_owner(owner_id).await {
                    Ok(topics) => self.allowed_topics = topics.into_iter().collect(),
                    Err(e) => warn!(channel_id = %self.channel_id, %e, "Membership lookup failed"),
                }
            }
        }

        if !self.allowed_topics.contains(&topic_id) {
            debug!(channel_id = %self.channel_id, %topic_id, "Topic join refused");
            self.send_error("FORBIDDEN", "Not a member of this topic");
            return;
        }

        self.registry.join_topic(self.channel_id, topic_id);
        self.registry.send(
            self.channel_id,
            events::TOPIC_JOINED,
            &json!({ "topic_id": topic_id.to_hex() }),
        );
    }

    fn send_error(&self, code: &str, message: &str) {
        self.registry.send(
            self.channel_id,
            events::ERROR,
            &json!({ "code": code, "message": message }),
        );
    }

    pub fn on_tick(&mut self, now: Instant) -> TickAction {
        if self.state != SessionState::Active {
            return TickAction::Stop;
        }
        match self.heartbeat.check(now) {
            HeartbeatStatus::Alive => {
                self.registry.send(
                    self.channel_id,
                    events::PING,
                    &json!({ "ts": chrono::Utc::now().timestamp_millis() }),
                );
                TickAction::Ping
            }
            HeartbeatStatus::Expired { silent_for } => {
                info!(
                    channel_id = %self.channel_id,
                    silent_secs = silent_for.as_secs(),
                    "Heartbeat timeout"
                );
                TickAction::Expire
            }
        }
    }

    /// Moves to `Closed`, unregistering the channel if it was registered.
    /// Returns true only for the call that actually closed the session.
    pub fn close(&mut self, reason: CloseReason) -> bool {
        match self.state {
            SessionState::Connecting => {
                self.state = SessionState::Closed;
                self.close_reason = Some(reason);
                true
            }
            SessionState::Authenticated | SessionState::Active => {
                self.state = SessionState::Closing;
                self.close_reason = Some(reason);
                if self.registered {
                    self.registry.unregister(self.channel_id);
                    self.registered = false;
                }
                self.state = SessionState::Closed;
                info!(
                    channel_id = %self.channel_id,
                    owner_id = ?self.owner_id,
                    %reason,
                    "Channel closed"
                );
                true
            }
            SessionState::Closing | SessionState::Closed | SessionState::Rejected => false,
        }
    }
}

impl Drop for DeliverySession {
    fn drop(&mut self) {
        if self.registered {
            self.close(CloseReason::TransportError);
        }
    }
}
