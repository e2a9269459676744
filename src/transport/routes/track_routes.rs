use std::sync::Arc;

use axum::{
  body::Bytes,
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::{
  common::VoiceLinkError, protocol::tracks::TrackSource, server::AppState,
  transport::routes::parse_body,
};

#[derive(Debug, Deserialize)]
struct LoadTrack {
  track: Option<TrackSource>,
}

#[derive(Debug, Deserialize)]
struct Search {
  search: Option<String>,
}

/// GET /
pub async fn root() -> impl IntoResponse {
  Json(json!({ "root": true }))
}

/// POST /load_track
pub async fn load_track(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
  info!("POST /load_track");
  let body: LoadTrack = match parse_body(&body, "/load_track") {
    Ok(body) => body,
    Err(e) => return e.into_response(),
  };
  let Some(source) = body.track else {
    return VoiceLinkError::bad_request("Missing track", "/load_track").into_response();
  };

  match state.load_track(source).await {
    Ok(track) => (StatusCode::CREATED, Json(track)).into_response(),
    Err(e) => VoiceLinkError::bad_request(e.to_string(), "/load_track").into_response(),
  }
}

/// POST /search
pub async fn search(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
  info!("POST /search");
  let body: Search = match parse_body(&body, "/search") {
    Ok(body) => body,
    Err(e) => return e.into_response(),
  };
  let Some(query) = body.search.filter(|q| !q.trim().is_empty()) else {
    return VoiceLinkError::bad_request("Missing search", "/search").into_response();
  };

  match state.search(query.trim()).await {
    Ok(entries) => Json(json!({ "search": entries })).into_response(),
    Err(e) => {
      error!("search for '{}' failed: {}", query, e);
      VoiceLinkError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), "/search").into_response()
    }
  }
}
