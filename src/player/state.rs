use std::{fmt, sync::Arc};

use crate::protocol::tracks::Track;

/// Status of a guild's audio player. Every non-idle status carries the track
/// it refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerStatus {
  Idle,
  /// A resource was handed over and its first frame has not been sent yet.
  Buffering(Arc<Track>),
  Playing(Arc<Track>),
  Paused(Arc<Track>),
  /// Frames are held because no voice link is ready.
  AutoPaused(Arc<Track>),
}

impl PlayerStatus {
  pub fn track(&self) -> Option<&Arc<Track>> {
    match self {
      Self::Idle => None,
      Self::Buffering(t) | Self::Playing(t) | Self::Paused(t) | Self::AutoPaused(t) => Some(t),
    }
  }

  pub fn is_idle(&self) -> bool {
    matches!(self, Self::Idle)
  }
}

impl fmt::Display for PlayerStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Idle => "idle",
      Self::Buffering(_) => "buffering",
      Self::Playing(_) => "playing",
      Self::Paused(_) => "paused",
      Self::AutoPaused(_) => "autopaused",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackSignal {
  Start(Arc<Track>),
  Finish(Arc<Track>),
}

/// Lifecycle signal implied by a player transition.
///
/// Leaving a non-idle status for `Idle` finishes the old track; going from
/// `Buffering` to `Playing` starts the new one. Resuming from a pause is not a
/// start, and `Idle -> Idle` is nothing.
pub fn track_signal(old: &PlayerStatus, new: &PlayerStatus) -> Option<TrackSignal> {
  match (old, new) {
    (PlayerStatus::Idle, _) if new.is_idle() => None,
    (old, PlayerStatus::Idle) => old.track().cloned().map(TrackSignal::Finish),
    (PlayerStatus::Buffering(_), PlayerStatus::Playing(track)) => Some(TrackSignal::Start(track.clone())),
    _ => None,
  }
}
