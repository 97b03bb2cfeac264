use mongodb::{Client, Database, options::ClientOptions};
use qrmenu_api::{build_router, state::AppState};
use qrmenu_config::Settings;
use qrmenu_db::indexes::ensure_indexes;
use qrmenu_services::dao::notification::NotificationDao;
use qrmenu_services::realtime::StaticMembership;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// A running test application backed by the in-memory store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub settings: Settings,
    pub state: AppState,
    pub membership: Arc<StaticMembership>,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a new test server on a random local port.
    ///
    /// Each call gets its own store and registry, so tests are isolated
    /// without any external services.
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    ///
    /// The `mutator` closure receives a `&mut Settings` after defaults are applied,
    /// allowing tests to tweak specific fields (e.g., retention or heartbeat).
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = Settings::for_tests();
        mutator(&mut settings);

        let membership = Arc::new(StaticMembership::new());
        let state = AppState::in_memory(settings.clone(), membership.clone());
        Self::serve(settings, state, membership).await
    }

    /// Spawn a server whose notifications live in a fresh MongoDB database.
    ///
    /// Requires a running MongoDB at localhost:27017.
    /// Set QRMENU__DATABASE__URL to override the connection string.
    /// Topic membership stays in memory so tests can grant restaurants.
    pub async fn spawn_mongo() -> Self {
        let mut settings = Settings::for_tests();
        let db = mongo_test_db(&mut settings).await;

        let membership = Arc::new(StaticMembership::new());
        let notifications = Arc::new(NotificationDao::new(
            &db,
            settings.notifications.retention_keep,
            settings.notifications.max_page_size,
        ));
        let state = AppState::assemble(settings.clone(), notifications, membership.clone());
        Self::serve(settings, state, membership).await
    }

    async fn serve(settings: Settings, state: AppState, membership: Arc<StaticMembership>) -> Self {
        let app = build_router(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            base_url,
            settings,
            state,
            membership,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }
}

/// A uniquely named, indexed database for one test.
pub async fn mongo_test_db(settings: &mut Settings) -> Database {
    if let Ok(url) = std::env::var("QRMENU__DATABASE__URL") {
        settings.database.url = url;
    }
    settings.database.name = format!("qrmenu_test_{}", uuid::Uuid::new_v4().simple());

    let client_options = ClientOptions::parse(&settings.database.url)
        .await
        .expect("Failed to parse MongoDB URL");
    let mongo_client =
        Client::with_options(client_options).expect("Failed to create MongoDB client");
    let db = mongo_client.database(&settings.database.name);

    ensure_indexes(&db).await.expect("Failed to create indexes");
    db
}
