pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod reconnect;
pub mod session;

pub use api::{HttpNotificationApi, NotificationApi};
pub use cache::NotificationCache;
pub use config::ClientConfig;
pub use error::ClientError;
pub use model::{CachedNotification, Page, RemoteNotification};
pub use reconnect::{Backoff, ConnectionStatus};
pub use session::NotificationClient;
