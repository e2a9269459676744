use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
  server::AppState,
  transport::{
    routes::{subscription_routes as subscription, track_routes as tracks},
    websocket_server::websocket_handler,
  },
};

const SUBSCRIPTION: &str = "/{client_id}/{guild_id}/subscription";

pub fn router(state: Arc<AppState>) -> Router {
  Router::new()
    .route("/", get(tracks::root))
    .route("/ws", get(websocket_handler))
    .route("/load_track", post(tracks::load_track))
    .route("/search", post(tracks::search))
    .route(
      SUBSCRIPTION,
      post(subscription::create_subscription).delete(subscription::delete_subscription),
    )
    .route(&format!("{}/queue", SUBSCRIPTION), post(subscription::queue_track))
    .route(&format!("{}/skip", SUBSCRIPTION), post(subscription::skip))
    .route(&format!("{}/pause", SUBSCRIPTION), post(subscription::pause))
    .route(&format!("{}/resume", SUBSCRIPTION), post(subscription::resume))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}
