use std::time::Duration;

/// Connection and cache settings for one consumer.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `http(s)://host:port` of the API; the WebSocket URL is derived from it.
    pub base_url: String,
    pub token: String,
    /// Most recent notifications kept locally.
    pub capacity: usize,
    /// How far apart a push and its stored record may be and still be
    /// treated as the same event.
    pub reconcile_window: Duration,
    /// Delay between a live push and the follow-up refresh.
    pub refresh_delay: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub max_retries: u32,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            capacity: 50,
            reconcile_window: Duration::from_secs(30),
            refresh_delay: Duration::from_millis(500),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            max_retries: 10,
        }
    }

    pub fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base_url.clone()
        };
        format!("{base}/ws?token={}", self.token)
    }
}
