use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};

use crate::api::NotificationApi;
use crate::cache::NotificationCache;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::model::{CachedNotification, RemoteNotification};
use crate::reconnect::{Backoff, ConnectionStatus};

/// What the read loop should do with one server frame.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FrameAction {
    Nothing,
    Reply(String),
    ScheduleRefresh,
    Disconnect(String),
}

/// A consumer of live notifications: keeps the local cache in step with the
/// store and the live channel, reconnecting as needed.
pub struct NotificationClient {
    config: ClientConfig,
    api: Arc<dyn NotificationApi>,
    cache: Arc<Mutex<NotificationCache>>,
    status: watch::Sender<ConnectionStatus>,
    pushes: broadcast::Sender<CachedNotification>,
}

impl NotificationClient {
    pub fn new(config: ClientConfig, api: Arc<dyn NotificationApi>) -> Self {
        let cache = NotificationCache::new(config.capacity, config.reconcile_window);
        let (status, _) = watch::channel(ConnectionStatus::Idle);
        let (pushes, _) = broadcast::channel(64);
        Self {
            config,
            api,
            cache: Arc::new(Mutex::new(cache)),
            status,
            pushes,
        }
    }

    pub fn cache(&self) -> Arc<Mutex<NotificationCache>> {
        self.cache.clone()
    }

    pub fn snapshot(&self) -> Vec<CachedNotification> {
        self.cache.lock().items().to_vec()
    }

    pub fn unread_count(&self) -> u64 {
        self.cache.lock().unread_count()
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Every live push, as cached.
    pub fn subscribe(&self) -> broadcast::Receiver<CachedNotification> {
        self.pushes.subscribe()
    }

    fn set_status(&self, status: ConnectionStatus) {
        debug!(?status, "Connection status");
        self.status.send_replace(status);
    }

    /// Authoritative reload: unread count plus the first page, replacing the
    /// cache.
    pub async fn hydrate(&self) -> Result<(), ClientError> {
        let count = self.api.unread_count().await?;
        let page = self.api.list(1, self.config.capacity as u64).await?;
        self.cache.lock().hydrate(count, page.items);
        Ok(())
    }

    /// Like `hydrate`, but merges so pushed entries pick up their stored ids.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let count = self.api.unread_count().await?;
        let page = self.api.list(1, self.config.capacity as u64).await?;
        self.cache.lock().reconcile(count, page.items);
        Ok(())
    }

    /// Flips the entry locally first. A failed server call is reported but
    /// not rolled back; the next refresh brings the stored state.
    pub async fn mark_read(&self, id: &str) -> Result<(), ClientError> {
        let mut stored_id = self.flip_read(id);
        if stored_id.is_none() {
            // Pushed entry without a stored id yet.
            self.refresh().await?;
            stored_id = self.flip_read(id);
        }

        let Some(stored_id) = stored_id else {
            return Err(ClientError::Status {
                status: 404,
                message: format!("Notification {id} is not cached"),
            });
        };

        if let Err(e) = self.api.mark_read(&stored_id).await {
            warn!(id = %stored_id, %e, "Couldn't mark as read, will refresh");
            return Err(e);
        }
        Ok(())
    }

    fn flip_read(&self, id: &str) -> Option<String> {
        let mut cache = self.cache.lock();
        cache.mark_read_local(id);
        cache.get(id).and_then(|e| e.id.clone())
    }

    pub async fn mark_all_read(&self) -> Result<u64, ClientError> {
        self.cache.lock().mark_all_read_local();
        self.api.mark_all_read().await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let stored_id = self.cache.lock().get(id).and_then(|e| e.id.clone());
        self.api.delete(stored_id.as_deref().unwrap_or(id)).await?;
        self.cache.lock().remove_local(id);
        Ok(())
    }

    /// Keeps a live channel open until retries run out. Every attempt is a
    /// fresh connection, hydrated from the store once it is up.
    pub async fn run(&self) -> Result<(), ClientError> {
        let mut backoff = Backoff::from(&self.config);
        loop {
            self.set_status(ConnectionStatus::Connecting {
                attempt: backoff.attempt() + 1,
            });

            match self.run_once(&mut backoff).await {
                Ok(reason) => {
                    info!(%reason, "Live channel closed");
                    self.set_status(ConnectionStatus::Disconnected { reason });
                }
                Err(ClientError::Rejected) => {
                    warn!("Handshake rejected, credential may have expired");
                    self.set_status(ConnectionStatus::Rejected);
                }
                Err(e) => {
                    warn!(%e, "Live channel failed");
                    self.set_status(ConnectionStatus::Disconnected {
                        reason: e.to_string(),
                    });
                }
            }

            let Some(delay) = backoff.next_delay() else {
                self.set_status(ConnectionStatus::GaveUp);
                return Err(ClientError::RetriesExhausted(backoff.attempt()));
            };
            info!(attempt = backoff.attempt(), ?delay, "Reconnecting");
            self.set_status(ConnectionStatus::Reconnecting {
                attempt: backoff.attempt(),
                delay_ms: delay.as_millis() as u64,
            });
            tokio::time::sleep(delay).await;
        }
    }

    async fn run_once(&self, backoff: &mut Backoff) -> Result<String, ClientError> {
        let (ws, _) = tokio_tungstenite::connect_async(self.config.ws_url())
            .await
            .map_err(|e| match e {
                tungstenite::Error::Http(ref resp) if resp.status().as_u16() == 401 => {
                    ClientError::Rejected
                }
                other => ClientError::WebSocket(other.to_string()),
            })?;
        backoff.reset();

        if let Err(e) = self.hydrate().await {
            warn!(%e, "Hydrate after connect failed");
        }

        let (mut write, mut read) = ws.split();
        let mut refresh_at: Option<Instant> = None;

        loop {
            let pending_refresh = refresh_at;
            let refresh_due = async move {
                match pending_refresh {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => match self.handle_frame(text.as_str()) {
                        FrameAction::Reply(reply) => {
                            write
                                .send(Message::text(reply))
                                .await
                                .map_err(|e| ClientError::WebSocket(e.to_string()))?;
                        }
                        FrameAction::ScheduleRefresh => {
                            refresh_at.get_or_insert_with(|| Instant::now() + self.config.refresh_delay);
                        }
                        FrameAction::Disconnect(reason) => return Ok(reason),
                        FrameAction::Nothing => {}
                    },
                    Some(Ok(Message::Close(_))) | None => return Ok("server_closed".to_string()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(ClientError::WebSocket(e.to_string())),
                },
                _ = refresh_due => {
                    refresh_at = None;
                    if let Err(e) = self.refresh().await {
                        warn!(%e, "Refresh after push failed");
                    }
                }
            }
        }
    }

    fn handle_frame(&self, text: &str) -> FrameAction {
        let parsed: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                debug!(%e, "Unparseable frame");
                return FrameAction::Nothing;
            }
        };
        let msg_type = parsed.get("type").and_then(|t| t.as_str()).unwrap_or("");
        let data = parsed.get("data").cloned().unwrap_or_default();

        match msg_type {
            "connected" => {
                let channel_id = data["channel_id"].as_str().unwrap_or_default().to_string();
                info!(%channel_id, "Live channel connected");
                self.set_status(ConnectionStatus::Connected { channel_id });
                FrameAction::Nothing
            }
            "order:new" | "order:updated" | "notification:new" => {
                match serde_json::from_value::<RemoteNotification>(data) {
                    Ok(push) => {
                        let applied = {
                            let mut cache = self.cache.lock();
                            cache
                                .apply_push(push)
                                .and_then(|temp| cache.get(&temp).cloned())
                        };
                        match applied {
                            Some(entry) => {
                                let _ = self.pushes.send(entry);
                                FrameAction::ScheduleRefresh
                            }
                            None => FrameAction::Nothing,
                        }
                    }
                    Err(e) => {
                        warn!(msg_type, %e, "Malformed push");
                        FrameAction::Nothing
                    }
                }
            }
            "ping" => FrameAction::Reply(
                serde_json::json!({
                    "type": "pong",
                    "data": { "ts": data.get("ts").cloned().unwrap_or_default() },
                })
                .to_string(),
            ),
            "disconnect" => FrameAction::Disconnect(
                data["reason"].as_str().unwrap_or("unknown").to_string(),
            ),
            "error" => {
                warn!(code = ?data.get("code"), message = ?data.get("message"), "Server error frame");
                FrameAction::Nothing
            }
            other => {
                debug!(msg_type = other, "Frame ignored");
                FrameAction::Nothing
            }
        }
    }
}
