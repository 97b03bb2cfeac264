use std::sync::Arc;
use std::time::Duration;

use qrmenu_client::{ClientConfig, ConnectionStatus, HttpNotificationApi, NotificationClient};
use qrmenu_services::notification::OrderSummary;

use crate::fixtures::test_app::TestApp;

fn client_for(app: &TestApp, token: &str) -> Arc<NotificationClient> {
    let mut config = ClientConfig::new(app.base_url.clone(), token);
    config.refresh_delay = Duration::from_millis(50);
    config.backoff_base = Duration::from_millis(10);
    config.backoff_max = Duration::from_millis(50);
    config.max_retries = 2;
    let api = Arc::new(HttpNotificationApi::new(&config));
    Arc::new(NotificationClient::new(config, api))
}

async fn wait_connected(client: &NotificationClient) {
    let mut status = client.status();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if matches!(*status.borrow_and_update(), ConnectionStatus::Connected { .. }) {
                return;
            }
            status.changed().await.unwrap();
        }
    })
    .await
    .expect("client never connected");
}

#[tokio::test]
async fn client_receives_push_and_marks_it_read() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);
    let client = client_for(&app, &owner.access_token);
    let mut pushes = client.subscribe();

    let runner = client.clone();
    let task = tokio::spawn(async move { runner.run().await });
    wait_connected(&client).await;
    app.wait_for_connections(1).await;

    let order = OrderSummary {
        order_id: "O1".to_string(),
        order_number: Some("1042".to_string()),
        table_number: "5".to_string(),
        total: 45.99,
        item_count: 3,
        status: "pending".to_string(),
    };
    let routed = app
        .state
        .router
        .route_new_order(owner.id, owner.restaurants[0], &order)
        .await
        .unwrap();
    let stored_id = routed.notification.id.unwrap().to_hex();

    let pushed = tokio::time::timeout(Duration::from_secs(5), pushes.recv())
        .await
        .expect("no push")
        .unwrap();
    assert_eq!(pushed.order_id(), Some("O1"));
    assert_eq!(pushed.id.as_deref(), Some(stored_id.as_str()));
    assert_eq!(client.unread_count(), 1);

    client.mark_read(&stored_id).await.unwrap();
    assert_eq!(client.unread_count(), 0);
    assert_eq!(app.unread_count(&owner.access_token).await, 0);

    // The scheduled refresh settles on the same single entry.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let snapshot = client.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[0].is_read);

    task.abort();
}

#[tokio::test]
async fn client_hydrates_backlog_on_connect() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);
    for n in 0..3 {
        let order = OrderSummary {
            order_id: format!("O{n}"),
            order_number: None,
            table_number: "2".to_string(),
            total: 10.0,
            item_count: 1,
            status: "pending".to_string(),
        };
        app.state
            .router
            .route_new_order(owner.id, owner.restaurants[0], &order)
            .await
            .unwrap();
    }

    let client = client_for(&app, &owner.access_token);
    let runner = client.clone();
    let task = tokio::spawn(async move { runner.run().await });
    wait_connected(&client).await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while client.snapshot().len() < 3 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("backlog never hydrated");
    assert_eq!(client.unread_count(), 3);
    assert_eq!(client.snapshot()[0].order_id(), Some("O2"));

    assert_eq!(client.mark_all_read().await.unwrap(), 3);
    assert_eq!(app.unread_count(&owner.access_token).await, 0);

    task.abort();
}

#[tokio::test]
async fn rejected_token_gives_up_after_retries() {
    let app = TestApp::spawn().await;
    let client = client_for(&app, "expired.or.forged");

    let result = tokio::time::timeout(Duration::from_secs(5), client.run())
        .await
        .expect("run did not give up");
    assert!(matches!(result, Err(qrmenu_client::ClientError::RetriesExhausted(_))));
    assert_eq!(*client.status().borrow(), ConnectionStatus::GaveUp);
}
