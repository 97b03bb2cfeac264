use std::time::Duration;

use bson::oid::ObjectId;
use futures::StreamExt;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

use super::test_app::TestApp;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An owner with a valid access token and the restaurants they own.
pub struct SeededOwner {
    pub id: ObjectId,
    pub access_token: String,
    pub restaurants: Vec<ObjectId>,
}

impl TestApp {
    /// Mint a token for a fresh user owning `restaurants` new restaurants.
    pub fn seed_owner(&self, restaurants: usize) -> SeededOwner {
        let id = ObjectId::new();
        let access_token = self
            .state
            .auth
            .generate_access_token(id)
            .expect("Failed to mint access token");

        let restaurants: Vec<ObjectId> = (0..restaurants).map(|_| ObjectId::new()).collect();
        for restaurant in &restaurants {
            self.membership.grant(id, *restaurant);
        }

        SeededOwner {
            id,
            access_token,
            restaurants,
        }
    }

    /// Create an authenticated request with the given token.
    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub async fn unread_count(&self, token: &str) -> u64 {
        let body: Value = self
            .auth_get("/api/notification/unread-count", token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["count"].as_u64().unwrap()
    }

    /// Open a live channel and consume the `connected` frame.
    pub async fn connect_ws(&self, token: &str) -> (WsClient, Value) {
        let (mut ws, _) = tokio_tungstenite::connect_async(self.ws_url(token))
            .await
            .expect("WS connect failed");
        let connected = next_frame(&mut ws).await;
        assert_eq!(connected["type"], "connected");
        (ws, connected)
    }

    /// Wait until the registry holds exactly `expected` channels.
    pub async fn wait_for_connections(&self, expected: usize) {
        for _ in 0..100 {
            if self.state.registry.connection_count() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "expected {expected} connections, registry has {}",
            self.state.registry.connection_count()
        );
    }
}

/// Next JSON text frame, failing the test after five seconds.
pub async fn next_frame(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Stream ended")
            .expect("WS error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Asserts nothing arrives within `wait`.
pub async fn assert_silent(ws: &mut WsClient, wait: Duration) {
    if let Ok(Some(Ok(Message::Text(text)))) = tokio::time::timeout(wait, ws.next()).await {
        panic!("unexpected frame: {}", text.as_str());
    }
}
