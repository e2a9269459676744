use std::sync::Arc;

use crate::{common::types::GuildId, protocol::tracks::Track};

/// Lifecycle notification raised by a guild's player.
#[derive(Debug, Clone)]
pub struct TrackEvent {
  pub guild_id: GuildId,
  pub track: Arc<Track>,
  pub kind: TrackEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackEventKind {
  Start,
  Finish,
  Error(String),
}

impl TrackEvent {
  pub fn new(guild_id: GuildId, track: Arc<Track>, kind: TrackEventKind) -> Self {
    Self {
      guild_id,
      track,
      kind,
    }
  }
}

/// Sender half every subscription of a session publishes track events to.
pub type TrackEventSender = flume::Sender<TrackEvent>;
