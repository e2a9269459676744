use serde::{Deserialize, Serialize};

/// An immutable, playable item.
///
/// Lifecycle notifications for a track travel as [`super::events::TrackEvent`]s,
/// so the value itself carries no behaviour and serializes as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub artist: Option<String>,
  /// Length in seconds.
  #[serde(default)]
  pub duration: f64,
  #[serde(default)]
  pub description: String,
  pub title: String,
  #[serde(default)]
  pub thumbnail: String,
  /// Canonical page url.
  pub url: String,
  /// Directly streamable media url.
  pub stream_url: String,
}

/// What a client may submit for playback: something to resolve, or a track it
/// already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackSource {
  Resolved(Track),
  Query(String),
}

impl TrackSource {
  /// Human readable form for logs.
  pub fn describe(&self) -> &str {
    match self {
      Self::Resolved(track) => &track.url,
      Self::Query(query) => query,
    }
  }
}

/// A search hit; not playable until resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
  pub artist: String,
  pub duration: f64,
  pub description: String,
  pub title: String,
  pub thumbnail: String,
  pub url: String,
}
