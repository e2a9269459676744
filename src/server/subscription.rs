use std::{
  sync::{
    Arc, Weak,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
  common::types::{ChannelId, ClientId, GuildId},
  configs::VoiceConfig,
  player::{AudioPlayer, AudioResource, PlayerStatus},
  protocol::{events::TrackEventSender, tracks::Track},
  server::policy::{self, PolicyAction},
  voice::{
    adapter::GatewayAdapter,
    connection::{ConnectionStatus, JoinOptions, StatusChange, VoiceConnection},
    transport::VoiceTransport,
  },
};

/// One client's voice presence in one guild: a connection, its player, and the
/// policy that keeps the connection alive or tears it down.
pub struct Subscription {
  client_id: ClientId,
  guild_id: GuildId,
  connection: Arc<VoiceConnection>,
  player: AudioPlayer,
  /// Held while a ready deadline is pending.
  ready_lock: AtomicBool,
  cancel: CancellationToken,
  /// Cancels the pending rejoin or recovery wait; replaced on every
  /// transition that supersedes it.
  pending: Mutex<CancellationToken>,
  config: VoiceConfig,
  supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Subscription {
  pub fn new(
    client_id: ClientId,
    guild_id: GuildId,
    channel_id: ChannelId,
    adapter: Arc<dyn GatewayAdapter>,
    transport: Arc<dyn VoiceTransport>,
    events: TrackEventSender,
    config: VoiceConfig,
  ) -> Arc<Self> {
    let (connection, changes) = VoiceConnection::join(
      JoinOptions {
        guild_id: guild_id.clone(),
        channel_id,
        user_id: client_id.clone(),
        self_deaf: config.self_deaf,
        self_mute: config.self_mute,
      },
      adapter,
      transport,
    );
    let player = AudioPlayer::new(guild_id.clone(), events, connection.frame_sink());
    let cancel = CancellationToken::new();
    let pending = Mutex::new(cancel.child_token());

    let subscription = Arc::new(Self {
      client_id,
      guild_id,
      connection,
      player,
      ready_lock: AtomicBool::new(false),
      cancel,
      pending,
      config,
      supervisor: Mutex::new(None),
    });

    let task = tokio::spawn(supervise(
      Arc::downgrade(&subscription),
      changes,
      subscription.cancel.clone(),
    ));
    *subscription.supervisor.lock() = Some(task);

    info!(
      "[{}] subscription created for client {}",
      subscription.guild_id, subscription.client_id
    );
    subscription
  }

  pub fn guild_id(&self) -> &GuildId {
    &self.guild_id
  }

  pub fn connection(&self) -> &Arc<VoiceConnection> {
    &self.connection
  }

  pub fn status(&self) -> ConnectionStatus {
    self.connection.status()
  }

  pub fn player_status(&self) -> PlayerStatus {
    self.player.status()
  }

  pub fn is_destroyed(&self) -> bool {
    self.connection.is_destroyed()
  }

  /// Replaces current playback with `resource`. Refused once the
  /// subscription is torn down.
  pub fn play_resource(&self, resource: AudioResource) -> bool {
    if self.cancel.is_cancelled() || self.is_destroyed() {
      warn!(
        "[{}] not playing '{}', subscription is destroyed",
        self.guild_id,
        resource.track().title
      );
      return false;
    }
    info!("[{}] playing '{}'", self.guild_id, resource.track().title);
    self.player.play(resource);
    true
  }

  /// Stops playback; the current track finishes.
  pub fn stop(&self) -> bool {
    self.player.stop()
  }

  pub fn pause(&self) -> bool {
    self.player.pause()
  }

  pub fn resume(&self) -> bool {
    self.player.resume()
  }

  /// Publishes an error for a track that never made it to the player.
  pub fn report_error(&self, track: Arc<Track>, message: impl Into<String>) {
    self.player.report_error(track, message);
  }

  /// Tears the subscription down. Safe to call more than once.
  pub fn destroy(&self) -> bool {
    let destroyed = self.connection.destroy();
    self.teardown();
    destroyed
  }

  fn teardown(&self) {
    self.player.stop();
    self.cancel.cancel();
  }

  fn on_status_change(self: &Arc<Self>, change: StatusChange) {
    let action = policy::on_status(
      &change.new,
      self.ready_lock.load(Ordering::Acquire),
      self.connection.rejoin_attempts(),
      &self.config,
    );
    debug!("[{}] {} -> {}: {:?}", self.guild_id, change.old, change.new, action);

    if matches!(
      change.new,
      ConnectionStatus::Ready | ConnectionStatus::Disconnected(_)
    ) {
      self.supersede_pending();
    }

    match action {
      PolicyAction::None => {}
      PolicyAction::ArmReadyDeadline(deadline) => {
        if self
          .ready_lock
          .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
          .is_ok()
        {
          self.spawn_ready_deadline(deadline);
        }
      }
      PolicyAction::AwaitRecovery(grace) => self.spawn_recovery_window(grace),
      PolicyAction::Rejoin { attempt, delay } => {
        self.connection.set_rejoin_attempts(attempt);
        self.spawn_rejoin(attempt, delay);
      }
      PolicyAction::Destroy => {
        warn!(
          "[{}] rejoin attempts exhausted, destroying connection",
          self.guild_id
        );
        self.connection.destroy();
      }
      PolicyAction::StopPlayer => self.teardown(),
    }
  }

  /// Cancels the outstanding rejoin or recovery wait, if any.
  fn supersede_pending(&self) {
    let fresh = self.cancel.child_token();
    let stale = std::mem::replace(&mut *self.pending.lock(), fresh);
    stale.cancel();
  }

  fn pending_token(&self) -> CancellationToken {
    self.pending.lock().clone()
  }

  fn spawn_ready_deadline(self: &Arc<Self>, deadline: Duration) {
    let this = self.clone();
    tokio::spawn(async move {
      let reached = tokio::select! {
        _ = this.cancel.cancelled() => None,
        status = this.connection.wait_for(deadline, |s| {
          matches!(s, ConnectionStatus::Ready | ConnectionStatus::Destroyed)
        }) => Some(status),
      };
      this.ready_lock.store(false, Ordering::Release);

      if let Some(None) = reached
        && !this.connection.is_destroyed()
      {
        warn!(
          "[{}] connection not ready after {:?}, destroying",
          this.guild_id, deadline
        );
        this.connection.destroy();
      }
    });
  }

  fn spawn_recovery_window(self: &Arc<Self>, grace: Duration) {
    let this = self.clone();
    let pending = self.pending_token();
    tokio::spawn(async move {
      let recovered = tokio::select! {
        _ = pending.cancelled() => return,
        status = this.connection.wait_for(grace, |s| !matches!(s, ConnectionStatus::Disconnected(_))) => status,
      };

      if recovered.is_none() {
        info!(
          "[{}] disconnected and no recovery within {:?}, destroying",
          this.guild_id, grace
        );
        this.connection.destroy();
      }
    });
  }

  fn spawn_rejoin(self: &Arc<Self>, attempt: u32, delay: Duration) {
    let this = self.clone();
    let pending = self.pending_token();
    tokio::spawn(async move {
      tokio::select! {
        _ = pending.cancelled() => {
          debug!("[{}] rejoin attempt {} superseded", this.guild_id, attempt);
          return;
        }
        _ = tokio::time::sleep(delay) => {}
      }
      debug!("[{}] rejoin attempt {} after {:?}", this.guild_id, attempt, delay);
      this.connection.rejoin();
    });
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.cancel.cancel();
    if let Some(task) = self.supervisor.lock().take() {
      task.abort();
    }
  }
}

async fn supervise(
  subscription: Weak<Subscription>,
  mut changes: mpsc::UnboundedReceiver<StatusChange>,
  cancel: CancellationToken,
) {
  loop {
    let change = tokio::select! {
      biased;
      change = changes.recv() => change,
      _ = cancel.cancelled() => None,
    };
    let Some(change) = change else {
      break;
    };
    let Some(subscription) = subscription.upgrade() else {
      break;
    };
    subscription.on_status_change(change);
  }
}
