use std::time::Duration;

use bson::oid::ObjectId;
use futures::SinkExt;
use qrmenu_services::notification::OrderSummary;
use qrmenu_services::realtime::CloseReason;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::{self, Message};

use crate::fixtures::seed::{WsClient, assert_silent, next_frame};
use crate::fixtures::test_app::TestApp;

fn order(id: &str) -> OrderSummary {
    OrderSummary {
        order_id: id.to_string(),
        order_number: None,
        table_number: "5".to_string(),
        total: 45.99,
        item_count: 3,
        status: "pending".to_string(),
    }
}

async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

#[tokio::test]
async fn new_order_reaches_connected_owner_and_settles_on_read_all() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);
    let r1 = owner.restaurants[0];

    let (mut ws, connected) = app.connect_ws(&owner.access_token).await;
    assert_eq!(connected["data"]["user_id"], owner.id.to_hex());
    assert_eq!(connected["data"]["topics"], json!([r1.to_hex()]));
    assert_eq!(app.unread_count(&owner.access_token).await, 0);

    let routed = app
        .state
        .router
        .route_new_order(owner.id, r1, &order("O1"))
        .await
        .unwrap();
    assert_eq!(routed.delivered, 1);

    let push = next_frame(&mut ws).await;
    assert_eq!(push["type"], "order:new");
    assert_eq!(push["data"]["payload"]["orderId"], "O1");
    assert_eq!(push["data"]["topic_id"], r1.to_hex());
    assert_silent(&mut ws, Duration::from_millis(200)).await;

    // The pushed id is already listable.
    let page: Value = app
        .auth_get("/api/notification", &owner.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["items"][0]["id"], push["data"]["id"]);
    assert_eq!(app.unread_count(&owner.access_token).await, 1);

    app.auth_put("/api/notification/read-all", &owner.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(app.unread_count(&owner.access_token).await, 0);

    let page: Value = app
        .auth_get("/api/notification", &owner.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["items"][0]["is_read"], true);
    assert!(page["items"][0]["read_at"].is_string());
}

#[tokio::test]
async fn topic_members_get_one_copy_and_strangers_none() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);
    let restaurant = owner.restaurants[0];
    let staff = app.seed_owner(0);
    let stranger = app.seed_owner(1);

    let (mut c1, _) = app.connect_ws(&owner.access_token).await;
    let (mut c2, _) = app.connect_ws(&staff.access_token).await;
    let (mut c3, _) = app.connect_ws(&stranger.access_token).await;

    // Staff gains access after connecting; the join re-checks membership.
    app.membership.grant(staff.id, restaurant);
    send_json(
        &mut c2,
        json!({ "type": "topic:join", "data": { "topic_id": restaurant.to_hex() } }),
    )
    .await;
    let joined = next_frame(&mut c2).await;
    assert_eq!(joined["type"], "topic:joined");
    assert_eq!(joined["data"]["topic_id"], restaurant.to_hex());

    app.state
        .router
        .route_order_status(owner.id, restaurant, &order("O7"))
        .await
        .unwrap();

    for ws in [&mut c1, &mut c2] {
        let frame = next_frame(ws).await;
        assert_eq!(frame["type"], "order:updated");
        assert_eq!(frame["data"]["payload"]["orderId"], "O7");
        assert_silent(ws, Duration::from_millis(200)).await;
    }
    assert_silent(&mut c3, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn joining_a_foreign_topic_is_refused() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(0);
    let (mut ws, _) = app.connect_ws(&owner.access_token).await;

    let foreign = ObjectId::new();
    send_json(
        &mut ws,
        json!({ "type": "topic:join", "data": { "topic_id": foreign.to_hex() } }),
    )
    .await;
    let reply = next_frame(&mut ws).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["code"], "FORBIDDEN");
    assert!(app.state.registry.channels_for_topic(&foreign).is_empty());

    send_json(&mut ws, json!({ "type": "topic:join" })).await;
    assert_eq!(next_frame(&mut ws).await["data"]["code"], "INVALID_TOPIC");
}

#[tokio::test]
async fn ping_gets_pong() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(0);
    let (mut ws, _) = app.connect_ws(&owner.access_token).await;

    send_json(&mut ws, json!({ "type": "ping" })).await;
    let reply = next_frame(&mut ws).await;
    assert_eq!(reply["type"], "pong");
    assert!(reply["data"]["ts"].is_i64());
}

#[tokio::test]
async fn handshake_without_valid_token_is_rejected() {
    let app = TestApp::spawn().await;

    for url in [
        format!("ws://{}/ws", app.addr),
        app.ws_url("not-a-real-token"),
    ] {
        match tokio_tungstenite::connect_async(url).await {
            Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status().as_u16(), 401),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("handshake should have been refused"),
        }
    }
    assert_eq!(app.state.registry.connection_count(), 0);
}

#[tokio::test]
async fn closing_the_socket_unregisters_the_channel() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);

    let (mut first, _) = app.connect_ws(&owner.access_token).await;
    let (_second, _) = app.connect_ws(&owner.access_token).await;
    app.wait_for_connections(2).await;
    assert_eq!(app.state.registry.owner_count(), 1);

    first.close(None).await.unwrap();
    app.wait_for_connections(1).await;

    // The surviving channel still receives pushes for the owner.
    let routed = app
        .state
        .router
        .route_new_order(owner.id, owner.restaurants[0], &order("O2"))
        .await
        .unwrap();
    assert_eq!((routed.targets, routed.delivered), (1, 1));
}

#[tokio::test]
async fn shutdown_tells_every_channel_why() {
    let app = TestApp::spawn().await;
    let a = app.seed_owner(0);
    let b = app.seed_owner(0);
    let (mut wa, _) = app.connect_ws(&a.access_token).await;
    let (mut wb, _) = app.connect_ws(&b.access_token).await;
    app.wait_for_connections(2).await;

    assert_eq!(app.state.registry.close_all(CloseReason::ServerShutdown), 2);

    for ws in [&mut wa, &mut wb] {
        let frame = next_frame(ws).await;
        assert_eq!(frame["type"], "disconnect");
        assert_eq!(frame["data"]["reason"], "server_shutdown");
    }
    app.wait_for_connections(0).await;
}

#[tokio::test]
async fn offline_owner_catches_up_over_rest() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);

    let routed = app
        .state
        .router
        .route_new_order(owner.id, owner.restaurants[0], &order("O3"))
        .await
        .unwrap();
    assert_eq!(routed.targets, 0);

    let (mut ws, _) = app.connect_ws(&owner.access_token).await;
    assert_silent(&mut ws, Duration::from_millis(200)).await;
    assert_eq!(app.unread_count(&owner.access_token).await, 1);
}

#[tokio::test]
async fn leaving_a_topic_stops_topic_pushes() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);
    let restaurant = owner.restaurants[0];
    let staff = app.seed_owner(0);
    app.membership.grant(staff.id, restaurant);

    // Granted before connecting, so the topic is auto-joined.
    let (mut ws, connected) = app.connect_ws(&staff.access_token).await;
    assert_eq!(connected["data"]["topics"], json!([restaurant.to_hex()]));

    send_json(
        &mut ws,
        json!({ "type": "topic:leave", "data": { "topic_id": restaurant.to_hex() } }),
    )
    .await;
    let left = next_frame(&mut ws).await;
    assert_eq!(left["type"], "topic:left");
    assert!(app.state.registry.channels_for_topic(&restaurant).is_empty());

    app.state
        .router
        .route_new_order(owner.id, restaurant, &order("O9"))
        .await
        .unwrap();
    assert_silent(&mut ws, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn silent_peer_is_dropped_on_heartbeat_timeout() {
    let app = TestApp::spawn_with_settings(|s| {
        s.realtime.ping_interval_secs = 1;
        s.realtime.ping_timeout_secs = 1;
    })
    .await;
    let owner = app.seed_owner(1);
    let (mut ws, _) = app.connect_ws(&owner.access_token).await;
    app.wait_for_connections(1).await;

    // Read but never answer: server pings go unanswered until it gives up.
    let mut pings = 0;
    let goodbye = loop {
        let frame = next_frame(&mut ws).await;
        match frame["type"].as_str() {
            Some("ping") => pings += 1,
            Some("disconnect") => break frame,
            other => panic!("unexpected frame type {other:?}"),
        }
    };
    assert!(pings <= 2);
    assert_eq!(goodbye["data"]["reason"], "heartbeat_timeout");
    app.wait_for_connections(0).await;

    // The owner is offline now: events are stored, nothing is addressed.
    let routed = app
        .state
        .router
        .route_new_order(owner.id, owner.restaurants[0], &order("O5"))
        .await
        .unwrap();
    assert_eq!(routed.targets, 0);
}
