mod common;

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use voicelink::{
  configs::VoiceConfig,
  server::{AppState, Session},
  voice::NullTransport,
};

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let request = Request::builder()
    .method(method)
    .uri(uri)
    .header("content-type", "application/json")
    .body(match body {
      Some(body) => Body::from(body.to_string()),
      None => Body::empty(),
    })
    .unwrap();

  let response = app.clone().oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = response.into_body().collect().await.unwrap().to_bytes();
  let body = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, body)
}

fn app_with_client() -> (Arc<AppState>, Router, flume::Receiver<axum::extract::ws::Message>) {
  let state = common::state();
  let (tx, rx) = flume::unbounded();
  state.registry.register(Session::new(
    "99".into(),
    tx,
    Arc::new(NullTransport),
    VoiceConfig::default(),
  ));
  let app = voicelink::transport::router(state.clone());
  (state, app, rx)
}

#[tokio::test]
async fn test_root() {
  let (_, app, _rx) = app_with_client();
  let (status, body) = call(&app, Method::GET, "/", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "root": true }));
}

#[tokio::test]
async fn test_subscription_lifecycle() {
  let (state, app, _rx) = app_with_client();

  let (status, _) = call(&app, Method::POST, "/99/42/subscription", Some(json!({ "channelId": "7" }))).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  // Reused, not recreated.
  let (status, _) = call(&app, Method::POST, "/99/42/subscription", Some(json!({ "channelId": "7" }))).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  assert_eq!(state.registry.get(&"99".into()).unwrap().subscription_count(), 1);

  let (status, _) = call(&app, Method::DELETE, "/99/42/subscription", None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, body) = call(&app, Method::DELETE, "/99/42/subscription", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["path"], "/99/42/subscription");
}

#[tokio::test]
async fn test_create_rejections() {
  let (_, app, _rx) = app_with_client();

  let (status, body) = call(&app, Method::POST, "/99/42/subscription", Some(json!({}))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["message"], "Missing channelId");

  let (status, _) = call(&app, Method::POST, "/99/42/subscription", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = call(&app, Method::POST, "/1/42/subscription", Some(json!({ "channelId": "7" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["status"], 400);
  assert_eq!(body["error"], "Bad Request");
}

#[tokio::test]
async fn test_controls_without_subscription() {
  let (_, app, _rx) = app_with_client();

  for action in ["skip", "pause", "resume"] {
    let (status, _) = call(&app, Method::POST, &format!("/99/42/subscription/{}", action), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", action);
    let (status, _) = call(&app, Method::POST, &format!("/1/42/subscription/{}", action), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", action);
  }

  let (status, _) = call(&app, Method::POST, "/99/42/subscription/queue", Some(json!({ "track": "lofi" }))).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_queue_and_controls() {
  let (_, app, _rx) = app_with_client();
  call(&app, Method::POST, "/99/42/subscription", Some(json!({ "channelId": "7" }))).await;

  let (status, body) = call(&app, Method::POST, "/99/42/subscription/queue", Some(json!({ "track": "lofi" }))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["title"], "lofi");
  assert_eq!(body["streamUrl"], "https://cdn.example.com/lofi");

  let descriptor = json!({
    "track": {
      "title": "Already resolved",
      "url": "https://example.com/resolved",
      "streamUrl": "https://cdn.example.com/resolved",
    }
  });
  let (status, body) = call(&app, Method::POST, "/99/42/subscription/queue", Some(descriptor)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["title"], "Already resolved");

  for action in ["pause", "resume", "skip"] {
    let (status, _) = call(&app, Method::POST, &format!("/99/42/subscription/{}", action), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT, "{}", action);
  }
}

#[tokio::test]
async fn test_queue_failures() {
  let (_, app, _rx) = app_with_client();
  call(&app, Method::POST, "/99/42/subscription", Some(json!({ "channelId": "7" }))).await;

  let (status, body) = call(&app, Method::POST, "/99/42/subscription/queue", Some(json!({}))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["message"], "Missing track");

  let (status, _) = call(&app, Method::POST, "/99/42/subscription/queue", Some(json!({ "track": "missing" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = call(&app, Method::POST, "/99/42/subscription/queue", Some(json!({ "track": "broken" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_load_track_and_search() {
  let (_, app, _rx) = app_with_client();

  let (status, body) = call(&app, Method::POST, "/load_track", Some(json!({ "track": "lofi" }))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["url"], "https://example.com/lofi");

  let (status, _) = call(&app, Method::POST, "/load_track", Some(json!({ "track": "missing" }))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  let (status, _) = call(&app, Method::POST, "/load_track", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = call(&app, Method::POST, "/search", Some(json!({ "search": "lofi" }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["search"][0]["title"], "lofi");
  assert_eq!(body["search"][0]["description"], "No description.");

  let (status, _) = call(&app, Method::POST, "/search", Some(json!({}))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  let (status, _) = call(&app, Method::POST, "/search", Some(json!({ "search": "down" }))).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
