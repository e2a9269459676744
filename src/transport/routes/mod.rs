pub mod subscription_routes;
pub mod track_routes;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::{common::VoiceLinkError, server::ControlError};

/// Parses an optional JSON body. An empty body reads as `{}` so handlers can
/// report the missing field themselves.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes, path: &str) -> Result<T, VoiceLinkError> {
  let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
    b"{}"
  } else {
    &body[..]
  };
  serde_json::from_slice(raw)
    .map_err(|e| VoiceLinkError::bad_request(format!("Invalid request body: {}", e), path))
}

impl ControlError {
  pub(crate) fn into_error(self, path: impl Into<String>) -> VoiceLinkError {
    match self {
      Self::NoSuchSubscription { .. } => VoiceLinkError::unauthorized(self.to_string(), path),
      _ => VoiceLinkError::bad_request(self.to_string(), path),
    }
  }
}
