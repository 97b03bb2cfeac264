use mongodb::Database;
use qrmenu_config::Settings;
use qrmenu_services::{
    AuthService, ConnectionRegistry, EventRouter, InMemoryNotificationStore, NotificationStore,
    dao::{notification::NotificationDao, restaurant::RestaurantDao},
    realtime::{StaticMembership, TopicMembership},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub notifications: Arc<dyn NotificationStore>,
    pub membership: Arc<dyn TopicMembership>,
    pub registry: Arc<ConnectionRegistry>,
    pub router: EventRouter,
}

impl AppState {
    /// MongoDB-backed state: notifications in `notifications`, topic
    /// membership from `restaurants`.
    pub fn new(db: Database, settings: Settings) -> Self {
        let notifications = Arc::new(NotificationDao::new(
            &db,
            settings.notifications.retention_keep,
            settings.notifications.max_page_size,
        ));
        let membership = Arc::new(RestaurantDao::new(&db));
        Self::assemble(settings, notifications, membership)
    }

    /// Process-local state. Nothing survives a restart.
    pub fn in_memory(settings: Settings, membership: Arc<StaticMembership>) -> Self {
        let notifications = Arc::new(InMemoryNotificationStore::with_page_limit(
            settings.notifications.retention_keep,
            settings.notifications.max_page_size,
        ));
        Self::assemble(settings, notifications, membership)
    }

    /// Wires any store and membership source into a state.
    pub fn assemble(
        settings: Settings,
        notifications: Arc<dyn NotificationStore>,
        membership: Arc<dyn TopicMembership>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(settings.jwt.clone()));
        let registry = Arc::new(ConnectionRegistry::new());
        let router = EventRouter::new(notifications.clone(), registry.clone());

        Self {
            settings,
            auth,
            notifications,
            membership,
            registry,
            router,
        }
    }
}
