//! Operations the request layer exposes, keyed by client and guild.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::{
  common::types::{ChannelId, ClientId, GuildId},
  player::AudioResource,
  protocol::tracks::{SearchEntry, Track, TrackSource},
  server::{
    app_state::AppState,
    session::{Session, SubscriptionOutcome},
    subscription::Subscription,
  },
  sources::ResolveError,
};

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
  #[error("client {0} has no active relay channel")]
  NoSuchClient(ClientId),
  #[error("client {client_id} has no subscription in guild {guild_id}")]
  NoSuchSubscription { client_id: ClientId, guild_id: GuildId },
  #[error("could not resolve track: {0}")]
  ResolutionFailed(#[from] ResolveError),
  #[error("could not start playback: {0}")]
  PlaybackFailed(String),
}

impl AppState {
  fn session(&self, client_id: &ClientId) -> Result<Arc<Session>, ControlError> {
    self
      .registry
      .get(client_id)
      .ok_or_else(|| ControlError::NoSuchClient(client_id.clone()))
  }

  fn subscription(&self, client_id: &ClientId, guild_id: &GuildId) -> Result<Arc<Subscription>, ControlError> {
    self
      .session(client_id)?
      .subscription(guild_id)
      .ok_or_else(|| ControlError::NoSuchSubscription {
        client_id: client_id.clone(),
        guild_id: guild_id.clone(),
      })
  }

  fn gone(&self, client_id: &ClientId, guild_id: &GuildId) -> ControlError {
    info!(
      "[{}] subscription of client {} destroyed while its track was loading",
      guild_id, client_id
    );
    ControlError::NoSuchSubscription {
      client_id: client_id.clone(),
      guild_id: guild_id.clone(),
    }
  }

  pub fn create_subscription(
    &self,
    client_id: &ClientId,
    guild_id: GuildId,
    channel_id: ChannelId,
  ) -> Result<SubscriptionOutcome, ControlError> {
    let session = self.session(client_id)?;
    let (_, outcome) = session.create_subscription(guild_id.clone(), channel_id);
    if outcome == SubscriptionOutcome::AlreadyExists {
      debug!("[{}] client {} already subscribed", guild_id, client_id);
    }
    Ok(outcome)
  }

  pub fn delete_subscription(&self, client_id: &ClientId, guild_id: &GuildId) -> Result<(), ControlError> {
    let session = self.session(client_id)?;
    if !session.delete_subscription(guild_id) {
      return Err(ControlError::NoSuchSubscription {
        client_id: client_id.clone(),
        guild_id: guild_id.clone(),
      });
    }
    info!("[{}] client {} left voice", guild_id, client_id);
    Ok(())
  }

  /// Resolves `source` and plays it in place of whatever is playing.
  pub async fn enqueue_track(
    &self,
    client_id: &ClientId,
    guild_id: &GuildId,
    source: TrackSource,
  ) -> Result<Track, ControlError> {
    let subscription = self.subscription(client_id, guild_id)?;

    let track = self.resolver.load(source).await.map_err(|e| {
      error!("[{}] client {} submitted an unresolvable track: {}", guild_id, client_id, e);
      e
    })?;
    let track = Arc::new(track);
    // Resolution takes a while; the subscription may be gone by now.
    if subscription.is_destroyed() {
      return Err(self.gone(client_id, guild_id));
    }

    match self.opener.open(&track).await {
      Ok(audio) => {
        if !subscription.play_resource(AudioResource::new(track.clone(), audio)) {
          return Err(self.gone(client_id, guild_id));
        }
        Ok(Track::clone(&track))
      }
      Err(e) => {
        error!("[{}] failed to open '{}': {}", guild_id, track.title, e);
        subscription.report_error(track, e.to_string());
        Err(ControlError::PlaybackFailed(e.to_string()))
      }
    }
  }

  pub fn skip(&self, client_id: &ClientId, guild_id: &GuildId) -> Result<(), ControlError> {
    if !self.subscription(client_id, guild_id)?.stop() {
      debug!("[{}] skip with nothing playing", guild_id);
    }
    Ok(())
  }

  pub fn pause(&self, client_id: &ClientId, guild_id: &GuildId) -> Result<(), ControlError> {
    if !self.subscription(client_id, guild_id)?.pause() {
      debug!("[{}] pause ignored, player is not playing", guild_id);
    }
    Ok(())
  }

  pub fn resume(&self, client_id: &ClientId, guild_id: &GuildId) -> Result<(), ControlError> {
    if !self.subscription(client_id, guild_id)?.resume() {
      debug!("[{}] resume ignored, player is not paused", guild_id);
    }
    Ok(())
  }

  pub async fn load_track(&self, source: TrackSource) -> Result<Track, ResolveError> {
    self.resolver.load(source).await
  }

  pub async fn search(&self, query: &str) -> Result<Vec<SearchEntry>, ResolveError> {
    self.resolver.search(query).await
  }
}
