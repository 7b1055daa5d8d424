//! HTTP routes driven without a socket.

use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use tagplay::server::AppState;

use crate::common::fixtures::TestEnv;
use crate::common::init_test_logging;

const BODY_LIMIT: usize = 1024 * 1024;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    (status, headers, body.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(app: &Router, uri: &str, payload: &Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn env_with_cards() -> TestEnv {
    let env = TestEnv::new();
    env.asset("v1.mp4", 1000).asset("i1.jpg", 200).asset("notes.txt", 10);
    env.mapping("[cards]\nA1 = [\"v1.mp4\", \"i1.jpg\"]\nS1 = \"v1.mp4\"\n");
    env
}

#[tokio::test]
async fn ping_and_empty_current_asset() {
    init_test_logging();
    let env = env_with_cards();
    let app = env.router();

    let (status, body) = get_json(&app, "/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (_, body) = get_json(&app, "/current-asset").await;
    assert_eq!(body, json!({ "asset_file": null }));
}

#[tokio::test]
async fn play_navigate_remove_over_http() {
    let env = env_with_cards();
    let app = env.router();

    let (status, body) = post_json(&app, "/play", &json!({ "card_id": "A1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["asset_file"], "v1.mp4");
    assert_eq!(body["asset_type"], "video");
    assert_eq!(body["total_assets"], 2);

    let (status, body) = post_json(
        &app,
        "/navigate",
        &json!({ "card_id": "A1", "direction": "next" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["asset_file"], "i1.jpg");
    assert_eq!(body["asset_index"], 1);

    let (_, current) = get_json(&app, "/current-asset").await;
    assert_eq!(current["action"], "navigated");
    assert_eq!(current["asset_file"], "i1.jpg");

    let (status, body) = post_json(&app, "/card-removed", &json!({ "card_id": "A1" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "card_removed");

    let (_, current) = get_json(&app, "/current-asset").await;
    assert_eq!(current["action"], "card_removed");

    let (_, status) = get_json(&app, "/status").await;
    assert_eq!(status["status"], "running");
    assert_eq!(status["assets_played"], 1);
    assert!(status["current_card"].is_null());
}

#[tokio::test]
async fn request_errors_map_to_status_codes() {
    let env = env_with_cards();
    let app = env.router();

    let (status, body) = post_json(&app, "/play", &json!({ "card_id": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");

    let (status, _) = post_json(
        &app,
        "/navigate",
        &json!({ "card_id": "A1", "direction": "sideways" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/navigate",
        &json!({ "card_id": "A1", "direction": "next" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    post_json(&app, "/play", &json!({ "card_id": "S1" })).await;
    let (status, body) = post_json(
        &app,
        "/navigate",
        &json!({ "card_id": "S1", "direction": "prev" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, _) = post_json(
        &app,
        "/play",
        &json!({ "card_id": "A1", "asset_index": 7 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_bodies_are_invalid_arguments() {
    let env = env_with_cards();
    let app = env.router();

    let (status, body) = post_json(
        &app,
        "/play",
        &json!({ "card_id": "A1", "asset_index": -1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "invalid_argument");

    let (status, body) = post_json(&app, "/card-removed", &json!({ "card_id": 5 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");

    let request = Request::post("/navigate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"card_id\": "))
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "invalid_argument");

    // Nothing was played by the rejected requests.
    let (_, current) = get_json(&app, "/current-asset").await;
    assert!(current["asset_file"].is_null());
}

#[tokio::test]
async fn blocking_work_leaves_runtime_free() {
    let env = env_with_cards();
    let state = AppState::new(env.orchestrator());

    let slow = state.blocking(|_| std::thread::sleep(Duration::from_millis(300)));
    tokio::pin!(slow);
    tokio::select! {
        _ = &mut slow => panic!("blocking call finished before the timer"),
        () = tokio::time::sleep(Duration::from_millis(20)) => {}
    }
    slow.await.unwrap();
}

#[tokio::test]
async fn play_reaches_open_event_stream() {
    let env = env_with_cards();
    let app = env.router();

    let request = Request::get("/events").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let mut body = response.into_body().into_data_stream();
    let first = futures_util::StreamExt::next(&mut body).await.unwrap().unwrap();
    assert!(String::from_utf8_lossy(&first).contains("event: connection"));

    let (status, _) = post_json(&app, "/play", &json!({ "card_id": "A1" })).await;
    assert_eq!(status, StatusCode::OK);

    let next = futures_util::StreamExt::next(&mut body).await.unwrap().unwrap();
    let text = String::from_utf8(next.to_vec()).unwrap();
    assert!(text.contains("event: asset_play"));
    assert!(text.contains("\"asset_file\":\"v1.mp4\""));
}

#[tokio::test]
async fn unmapped_play_is_soft_failure() {
    let env = env_with_cards();
    let app = env.router();

    let (status, body) = post_json(&app, "/play", &json!({ "card_id": "ZZ" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);

    let (_, body) = get_json(&app, "/unknown-cards").await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["unknown_cards"]["ZZ"]["mapped"], false);
}

#[tokio::test]
async fn explicit_asset_files_bypass_mapping() {
    let env = env_with_cards();
    let app = env.router();

    let (status, body) = post_json(
        &app,
        "/play",
        &json!({ "card_id": "X9", "asset_files": ["i1.jpg", "v1.mp4"], "asset_index": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["asset_file"], "v1.mp4");

    let (status, _) = post_json(
        &app,
        "/play",
        &json!({ "card_id": "X9", "asset_files": ["missing.mp4"] }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_card_then_refresh() {
    let env = env_with_cards();
    let app = env.router();

    let (status, body) = post_json(&app, "/unknown-card", &json!({ "card_id": "B2" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    env.mapping("[cards]\nA1 = [\"v1.mp4\", \"i1.jpg\"]\nB2 = \"i1.jpg\"\n");
    let request = Request::post("/refresh-mapping").body(Body::empty()).unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["newly_mapped"], json!(["B2"]));

    let (_, history) = get_json(&app, "/scanned-cards").await;
    assert_eq!(history["total_unknown"], 0);
    assert_eq!(history["scanned_cards"]["B2"]["mapped"], true);
    assert_eq!(history["scanned_cards"]["B2"]["scan_count"], 1);
}

#[tokio::test]
async fn asset_listing_and_mapping() {
    let env = env_with_cards();
    let app = env.router();

    let (_, body) = get_json(&app, "/assets").await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["assets"][0]["filename"], "i1.jpg");
    assert_eq!(body["assets"][0]["type"], "image");
    assert_eq!(body["assets"][1]["filename"], "v1.mp4");

    let (_, body) = get_json(&app, "/card-assets").await;
    assert_eq!(body["cards"]["S1"], json!(["v1.mp4"]));
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn media_range_over_http() {
    let env = env_with_cards();
    let app = env.router();

    let request = Request::get("/assets/v1.mp4")
        .header(header::RANGE, "bytes=100-199")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers[header::CONTENT_RANGE], "bytes 100-199/1000");
    assert_eq!(headers[header::CONTENT_LENGTH], "100");
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(body.len(), 100);
    assert_eq!(body[0], 100);

    let request = Request::get("/assets/v1.mp4").body(Body::empty()).unwrap();
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
    assert_eq!(body.len(), 1000);

    let request = Request::get("/assets/i1.jpg")
        .header(header::RANGE, "bytes=0-9")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::ACCEPT_RANGES).is_none());
    assert_eq!(body.len(), 200);

    let request = Request::get("/assets/ghost.mp4").body(Body::empty()).unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_is_permissive() {
    let env = env_with_cards();
    let app = env.router();

    let request = Request::get("/ping")
        .header(header::ORIGIN, "http://kiosk.local")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(&app, request).await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn event_stream_opens_with_connection_frame() {
    let env = env_with_cards();
    let app = env.router();

    let request = Request::get("/events").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let mut body = response.into_body().into_data_stream();
    let first = futures_util::StreamExt::next(&mut body).await.unwrap().unwrap();
    let text = String::from_utf8(first.to_vec()).unwrap();
    assert!(text.contains("event: connection"));
    assert!(text.contains("\"type\":\"connection\""));
}
