//! Request/response endpoints driven through a polling Room and raw HTTP.

use std::time::Duration;

use room::{Room, RoomConfig, Term};
use room_gateway::{build_router, GatewayState};
use tokio::net::TcpListener;

async fn spawn_gateway() -> String {
    let state = GatewayState::new();
    let router = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .expect("gateway server");
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn assigns_session_id_on_first_call_and_echoes_it() {
    let url = spawn_gateway().await;
    let client = reqwest::Client::new();

    let first: serde_json::Value = client
        .post(format!("{}/facts", url))
        .json(&serde_json::json!({ "id": null }))
        .send()
        .await
        .expect("first facts call")
        .json()
        .await
        .expect("first facts body");
    let id = first
        .get("id")
        .and_then(|v| v.as_str())
        .expect("assigned id")
        .to_string();

    let second: serde_json::Value = client
        .post(format!("{}/assert", url))
        .json(&serde_json::json!({ "id": id, "fact": "point at (1, 2)" }))
        .send()
        .await
        .expect("assert call")
        .json()
        .await
        .expect("assert body");
    assert_eq!(second.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
}

#[tokio::test]
async fn polling_room_round_trip() {
    let url = spawn_gateway().await;
    let room = Room::polling(&url);

    room.assert("point at (1, 2)").await.expect("assert");
    let selection = room.select(&["point at ($x, $y)"]).await.expect("select");
    assert_eq!(selection.len(), 1);
    assert_eq!(selection.solutions()[0].get("x"), Some(&Term::number(1.0)));
    assert_eq!(selection.solutions()[0].get("y"), Some(&Term::number(2.0)));

    room.retract("point at (1, 2)").await.expect("retract");
    let selection = room.select(&["point at ($x, $y)"]).await.expect("select");
    assert!(selection.is_empty());
}

#[tokio::test]
async fn fresh_rooms_get_isolated_sessions() {
    let url = spawn_gateway().await;
    let room_a = Room::polling(&url);
    let room_b = Room::polling(&url);

    room_a.assert("point at (1, 2)").await.expect("assert");
    assert_eq!(room_a.facts().await.expect("facts a").len(), 1);
    assert!(room_b.facts().await.expect("facts b").is_empty());
}

#[tokio::test]
async fn polling_subscription_redelivers_after_mutation() {
    let url = spawn_gateway().await;
    let room = Room::polling_with(
        &url,
        RoomConfig {
            base_interval: Duration::from_millis(50),
            max_interval: Some(Duration::from_secs(1)),
        },
    );

    let sub = room.subscribe().await.expect("subscribe");
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    sub.add_listener(move |selection: &room::Selection| {
        let _ = tx.send(selection.len());
    })
    .expect("add listener");
    sub.select(&["point at ($x, $y)"]).await.expect("sub select");

    room.assert("point at (3, 4)").await.expect("assert");

    let saw_solution = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(len) = rx.recv().await {
            if len == 1 {
                return true;
            }
        }
        false
    })
    .await
    .expect("listener delivery before timeout");
    assert!(saw_solution);

    sub.unsubscribe().await;
}

#[tokio::test]
async fn refresh_failures_flip_the_connected_flag() {
    // Nothing is listening on this port.
    let room = Room::polling_with(
        "http://127.0.0.1:1",
        RoomConfig {
            base_interval: Duration::from_millis(20),
            max_interval: Some(Duration::from_millis(200)),
        },
    );
    assert!(room.connected());

    let sub = room.subscribe().await.expect("subscribe");
    sub.select(&["point at ($x, $y)"]).await.expect("sub select");

    let disconnected = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if !room.connected() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("disconnect before timeout");
    assert!(disconnected);
    assert!(room.retry_interval() > Duration::from_millis(20));

    sub.unsubscribe().await;
}
