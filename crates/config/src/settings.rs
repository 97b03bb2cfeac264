use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    pub notifications: NotificationSettings,
    pub realtime: RealtimeSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Which `NotificationStore` implementation backs the server.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub backend: StoreBackend,
    pub url: String,
    pub name: String,
    pub max_pool_size: Option<u32>,
    pub min_pool_size: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_ttl_secs: u64,
    pub issuer: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationSettings {
    /// Per-recipient cap; older notifications are evicted on create.
    pub retention_keep: u64,
    pub default_page_size: u64,
    pub max_page_size: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeSettings {
    pub ping_interval_secs: u64,
    pub ping_timeout_secs: u64,
    /// Outbound frames queued per channel before sends start failing.
    pub channel_buffer: usize,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("QRMENU"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("database.backend", "mongo")?
            .set_default("database.url", "mongodb://localhost:27017")?
            .set_default("database.name", "qrmenu")?
            .set_default("jwt.secret", "change-me-in-production")?
            .set_default("jwt.access_token_ttl_secs", 3600)?
            .set_default("jwt.issuer", "qrmenu")?
            .set_default("notifications.retention_keep", 100)?
            .set_default("notifications.default_page_size", 20)?
            .set_default("notifications.max_page_size", 100)?
            .set_default("realtime.ping_interval_secs", 25)?
            .set_default("realtime.ping_timeout_secs", 60)?
            .set_default("realtime.channel_buffer", 64)?
            .build()?;

        config.try_deserialize()
    }

    /// Defaults with the in-memory store, independent of files and env.
    pub fn for_tests() -> Self {
        Self {
            app: AppSettings {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec![],
            },
            database: DatabaseSettings {
                backend: StoreBackend::Memory,
                url: "mongodb://localhost:27017".to_string(),
                name: "qrmenu_test".to_string(),
                max_pool_size: Some(5),
                min_pool_size: Some(1),
            },
            jwt: JwtSettings {
                secret: "test-secret-key-for-jwt-signing-minimum-32-chars".to_string(),
                access_token_ttl_secs: 3600,
                issuer: "qrmenu".to_string(),
            },
            notifications: NotificationSettings {
                retention_keep: 100,
                default_page_size: 20,
                max_page_size: 100,
            },
            realtime: RealtimeSettings {
                ping_interval_secs: 25,
                ping_timeout_secs: 60,
                channel_buffer: 64,
            },
        }
    }
}
