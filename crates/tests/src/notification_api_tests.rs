use bson::oid::ObjectId;
use qrmenu_db::models::NotificationKind;
use qrmenu_services::notification::{NotificationDraft, OrderSummary};
use serde_json::{Value, json};

use crate::fixtures::test_app::TestApp;

fn order(n: usize) -> OrderSummary {
    OrderSummary {
        order_id: format!("O{n}"),
        order_number: Some(format!("{}", 1000 + n)),
        table_number: "5".to_string(),
        total: 45.99,
        item_count: 3,
        status: "pending".to_string(),
    }
}

async fn seed_orders(app: &TestApp, owner: ObjectId, restaurant: ObjectId, count: usize) -> Vec<String> {
    let mut ids = Vec::new();
    for n in 0..count {
        let routed = app
            .state
            .router
            .route_new_order(owner, restaurant, &order(n))
            .await
            .unwrap();
        ids.push(routed.notification.id.unwrap().to_hex());
    }
    ids
}

#[tokio::test]
async fn list_returns_newest_first_with_pagination() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);
    let ids = seed_orders(&app, owner.id, owner.restaurants[0], 5).await;

    let resp = app
        .auth_get("/api/notification?page=1&per_page=2", &owner.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let page: Value = resp.json().await.unwrap();
    assert_eq!(page["total"], 5);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["items"][0]["id"], ids[4]);
    assert_eq!(page["items"][1]["id"], ids[3]);
    assert_eq!(page["items"][0]["kind"], "new_order");
    assert_eq!(page["items"][0]["topic_id"], owner.restaurants[0].to_hex());
    assert_eq!(page["items"][0]["is_read"], false);
    assert!(page["items"][0]["read_at"].is_null());
}

#[tokio::test]
async fn page_parameters_are_clamped() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);
    seed_orders(&app, owner.id, owner.restaurants[0], 3).await;

    let page: Value = app
        .auth_get("/api/notification?page=0&per_page=500", &owner.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["page"], 1);
    assert_eq!(page["per_page"], 100);
    assert_eq!(page["items"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn page_far_past_the_end_is_empty() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);
    seed_orders(&app, owner.id, owner.restaurants[0], 2).await;

    let resp = app
        .auth_get(
            &format!("/api/notification?page={}&per_page=100", u64::MAX),
            &owner.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let page: Value = resp.json().await.unwrap();
    assert_eq!(page["total"], 2);
    assert!(page["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn mark_read_is_idempotent_and_counts_follow() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);
    let ids = seed_orders(&app, owner.id, owner.restaurants[0], 2).await;
    assert_eq!(app.unread_count(&owner.access_token).await, 2);

    for _ in 0..2 {
        let resp = tokio_test::assert_ok!(
            app.auth_put(&format!("/api/notification/{}/read", ids[0]), &owner.access_token)
                .send()
                .await
        );
        assert_eq!(resp.status().as_u16(), 200);
    }
    assert_eq!(app.unread_count(&owner.access_token).await, 1);

    let resp = app
        .auth_put("/api/notification/read-all", &owner.access_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["modified"], 1);
    assert_eq!(app.unread_count(&owner.access_token).await, 0);

    let page: Value = app
        .auth_get("/api/notification", &owner.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    for item in page["items"].as_array().unwrap() {
        assert_eq!(item["is_read"], true);
        assert!(item["read_at"].is_string());
    }
}

#[tokio::test]
async fn foreign_and_missing_notifications_are_404() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);
    let stranger = app.seed_owner(0);
    let ids = seed_orders(&app, owner.id, owner.restaurants[0], 1).await;

    let resp = app
        .auth_put(&format!("/api/notification/{}/read", ids[0]), &stranger.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "not_found");

    let resp = app
        .auth_delete(&format!("/api/notification/{}", ids[0]), &stranger.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app
        .auth_delete(
            &format!("/api/notification/{}", ObjectId::new().to_hex()),
            &owner.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    // Still there, still unread for the real owner.
    assert_eq!(app.unread_count(&owner.access_token).await, 1);
}

#[tokio::test]
async fn delete_removes_notification() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(1);
    let ids = seed_orders(&app, owner.id, owner.restaurants[0], 2).await;

    let resp = app
        .auth_delete(&format!("/api/notification/{}", ids[1]), &owner.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .auth_delete(&format!("/api/notification/{}", ids[1]), &owner.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let page: Value = app
        .auth_get("/api/notification", &owner.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], ids[0]);
}

#[tokio::test]
async fn malformed_id_is_400() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(0);

    let resp = app
        .auth_put("/api/notification/not-an-id/read", &owner.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn missing_or_bad_token_is_401() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .get(app.url("/api/notification/unread-count"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app
        .auth_get("/api/notification", "forged.token.value")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn retention_keeps_most_recent() {
    let app = TestApp::spawn_with_settings(|s| s.notifications.retention_keep = 3).await;
    let owner = app.seed_owner(1);
    let ids = seed_orders(&app, owner.id, owner.restaurants[0], 5).await;

    let page: Value = app
        .auth_get("/api/notification", &owner.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let kept: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(kept, vec![ids[4].as_str(), ids[3].as_str(), ids[2].as_str()]);
}

#[tokio::test]
async fn system_notification_without_topic() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(0);

    app.state
        .router
        .route_event(NotificationDraft {
            recipient_id: owner.id,
            topic_id: None,
            kind: NotificationKind::System,
            title: "Welcome".to_string(),
            body: "Your menu is live".to_string(),
            payload: json!({ "link": "/dashboard" }),
        })
        .await
        .unwrap();

    let page: Value = app
        .auth_get("/api/notification", &owner.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["items"][0]["kind"], "system");
    assert!(page["items"][0]["topic_id"].is_null());
    assert_eq!(page["items"][0]["payload"]["link"], "/dashboard");
}

#[tokio::test]
async fn health_reports_live_channels() {
    let app = TestApp::spawn().await;
    let owner = app.seed_owner(0);
    let (_ws, _) = app.connect_ws(&owner.access_token).await;

    let body: Value = app
        .client
        .get(app.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 1);
    assert_eq!(body["owners"], 1);
}
