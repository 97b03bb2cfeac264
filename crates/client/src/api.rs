use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::model::{Page, RemoteNotification};

/// The notification REST surface, as the client sees it.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn list(&self, page: u64, per_page: u64) -> Result<Page<RemoteNotification>, ClientError>;
    async fn unread_count(&self) -> Result<u64, ClientError>;
    async fn mark_read(&self, id: &str) -> Result<(), ClientError>;
    async fn mark_all_read(&self) -> Result<u64, ClientError>;
    async fn delete(&self, id: &str) -> Result<(), ClientError>;
}

pub struct HttpNotificationApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpNotificationApi {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/notification{}", self.base_url, path)
    }

    async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: error_message(&bytes),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn list(&self, page: u64, per_page: u64) -> Result<Page<RemoteNotification>, ClientError> {
        let resp = self
            .http
            .get(self.url(""))
            .bearer_auth(&self.token)
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await?;
        Self::read_json(resp).await
    }

    async fn unread_count(&self) -> Result<u64, ClientError> {
        let resp = self
            .http
            .get(self.url("/unread-count"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let body: serde_json::Value = Self::read_json(resp).await?;
        Ok(body["count"].as_u64().unwrap_or(0))
    }

    async fn mark_read(&self, id: &str) -> Result<(), ClientError> {
        let resp = self
            .http
            .put(self.url(&format!("/{id}/read")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let _: serde_json::Value = Self::read_json(resp).await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<u64, ClientError> {
        let resp = self
            .http
            .put(self.url("/read-all"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let body: serde_json::Value = Self::read_json(resp).await?;
        Ok(body["modified"].as_u64().unwrap_or(0))
    }

    async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let resp = self
            .http
            .delete(self.url(&format!("/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let _: serde_json::Value = Self::read_json(resp).await?;
        Ok(())
    }
}
