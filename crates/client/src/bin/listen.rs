use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use qrmenu_client::{ClientConfig, HttpNotificationApi, NotificationClient};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Connects to the notification API, prints live notifications and keeps
/// reconnecting with backoff.
#[derive(Debug, Parser)]
#[command(name = "qrmenu-listen", version)]
struct Args {
    /// API base URL.
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    /// Access token for the listening owner.
    #[arg(long)]
    token: String,

    /// Give up after this many consecutive failed attempts.
    #[arg(long, default_value_t = 10)]
    max_retries: u32,

    /// Upper bound for the reconnect delay, in seconds.
    #[arg(long, default_value_t = 30)]
    max_backoff_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qrmenu_client=info,qrmenu_listen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::new(args.url, args.token);
    config.max_retries = args.max_retries;
    config.backoff_max = Duration::from_secs(args.max_backoff_secs);

    let api = Arc::new(HttpNotificationApi::new(&config));
    let client = Arc::new(NotificationClient::new(config, api));

    let mut pushes = client.subscribe();
    tokio::spawn(async move {
        while let Ok(n) = pushes.recv().await {
            println!("[{}] {}: {}", n.kind, n.title, n.body);
        }
    });

    let mut status = client.status();
    let watcher = client.clone();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            info!(?current, unread = watcher.unread_count(), "Status");
        }
    });

    tokio::select! {
        result = client.run() => {
            if let Err(e) = result {
                warn!(%e, "Listener stopped");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    Ok(())
}
