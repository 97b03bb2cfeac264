pub mod auth;
pub mod dao;
pub mod notification;
pub mod realtime;

pub use auth::{AuthService, CredentialVerifier};
pub use dao::*;
pub use notification::{EventRouter, InMemoryNotificationStore, NotificationStore};
pub use realtime::{ConnectionRegistry, DeliverySession};
