use std::sync::Arc;

use axum::{
  body::Bytes,
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::{
  common::{
    VoiceLinkError,
    types::{ChannelId, ClientId, GuildId},
  },
  protocol::tracks::TrackSource,
  server::AppState,
  transport::routes::parse_body,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSubscription {
  channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueTrack {
  track: Option<TrackSource>,
}

fn path_of(client_id: &str, guild_id: &str, action: &str) -> String {
  format!("/{}/{}/subscription{}", client_id, guild_id, action)
}

/// POST /{clientId}/{guildId}/subscription
pub async fn create_subscription(
  Path((client_id, guild_id)): Path<(String, String)>,
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> Response {
  let path = path_of(&client_id, &guild_id, "");
  info!("POST {}", path);

  let body: CreateSubscription = match parse_body(&body, &path) {
    Ok(body) => body,
    Err(e) => return e.into_response(),
  };
  let Some(channel_id) = body.channel_id.filter(|c| !c.is_empty()) else {
    return VoiceLinkError::bad_request("Missing channelId", path).into_response();
  };

  match state.create_subscription(
    &ClientId::from(client_id),
    GuildId::from(guild_id),
    ChannelId::from(channel_id),
  ) {
    Ok(_) => StatusCode::NO_CONTENT.into_response(),
    Err(e) => e.into_error(path).into_response(),
  }
}

/// DELETE /{clientId}/{guildId}/subscription
pub async fn delete_subscription(
  Path((client_id, guild_id)): Path<(String, String)>,
  State(state): State<Arc<AppState>>,
) -> Response {
  let path = path_of(&client_id, &guild_id, "");
  info!("DELETE {}", path);

  match state.delete_subscription(&client_id.into(), &guild_id.into()) {
    Ok(()) => StatusCode::NO_CONTENT.into_response(),
    // A missing subscription is a plain bad request here, not a 401.
    Err(e) => VoiceLinkError::bad_request(e.to_string(), path).into_response(),
  }
}

/// POST /{clientId}/{guildId}/subscription/queue
pub async fn queue_track(
  Path((client_id, guild_id)): Path<(String, String)>,
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> Response {
  let path = path_of(&client_id, &guild_id, "/queue");
  info!("POST {}", path);

  let body: QueueTrack = match parse_body(&body, &path) {
    Ok(body) => body,
    Err(e) => return e.into_response(),
  };
  let Some(source) = body.track else {
    return VoiceLinkError::bad_request("Missing track", path).into_response();
  };

  match state
    .enqueue_track(&client_id.into(), &guild_id.into(), source)
    .await
  {
    Ok(track) => (StatusCode::CREATED, Json(track)).into_response(),
    Err(e) => e.into_error(path).into_response(),
  }
}

/// POST /{clientId}/{guildId}/subscription/skip
pub async fn skip(
  Path((client_id, guild_id)): Path<(String, String)>,
  State(state): State<Arc<AppState>>,
) -> Response {
  let path = path_of(&client_id, &guild_id, "/skip");
  info!("POST {}", path);
  no_content(state.skip(&client_id.into(), &guild_id.into()), path)
}

/// POST /{clientId}/{guildId}/subscription/pause
pub async fn pause(
  Path((client_id, guild_id)): Path<(String, String)>,
  State(state): State<Arc<AppState>>,
) -> Response {
  let path = path_of(&client_id, &guild_id, "/pause");
  info!("POST {}", path);
  no_content(state.pause(&client_id.into(), &guild_id.into()), path)
}

/// POST /{clientId}/{guildId}/subscription/resume
pub async fn resume(
  Path((client_id, guild_id)): Path<(String, String)>,
  State(state): State<Arc<AppState>>,
) -> Response {
  let path = path_of(&client_id, &guild_id, "/resume");
  info!("POST {}", path);
  no_content(state.resume(&client_id.into(), &guild_id.into()), path)
}

fn no_content(result: Result<(), crate::server::ControlError>, path: String) -> Response {
  match result {
    Ok(()) => StatusCode::NO_CONTENT.into_response(),
    Err(e) => e.into_error(path).into_response(),
  }
}
