use std::sync::{
  Arc, Weak,
  atomic::{AtomicBool, Ordering},
};

use axum::extract::ws::Message;
use dashmap::{DashMap, mapref::entry::Entry};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
  common::types::{ChannelId, ClientId, GuildId, SessionId},
  configs::VoiceConfig,
  protocol::{
    events::{TrackEvent, TrackEventSender},
    frames::{GatewayDispatch, RelayFrame},
    opcodes::RelayCloseCode,
  },
  server::subscription::Subscription,
  voice::{GatewayAdapter, VoiceConnection, VoiceTransport},
};

/// Whether `create_subscription` made a new subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionOutcome {
  Created,
  AlreadyExists,
}

/// One client process and everything it holds through its relay channel.
pub struct Session {
  pub client_id: ClientId,
  pub session_id: SessionId,
  subscriptions: DashMap<GuildId, Arc<Subscription>>,
  /// Signaling targets per guild, fed by inbound voice updates.
  adapters: DashMap<GuildId, Arc<VoiceConnection>>,
  sender: flume::Sender<Message>,
  events: TrackEventSender,
  closed: AtomicBool,
  transport: Arc<dyn VoiceTransport>,
  config: VoiceConfig,
  forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
  pub fn new(
    client_id: ClientId,
    sender: flume::Sender<Message>,
    transport: Arc<dyn VoiceTransport>,
    config: VoiceConfig,
  ) -> Arc<Self> {
    let (events, events_rx) = flume::unbounded::<TrackEvent>();
    let session = Arc::new(Self {
      client_id,
      session_id: SessionId::generate(),
      subscriptions: DashMap::new(),
      adapters: DashMap::new(),
      sender: sender.clone(),
      events,
      closed: AtomicBool::new(false),
      transport,
      config,
      forwarder: Mutex::new(None),
    });

    let client_id = session.client_id.clone();
    let task = tokio::spawn(async move {
      while let Ok(event) = events_rx.recv_async().await {
        debug!(
          "[{}] {:?} for '{}' -> client {}",
          event.guild_id, event.kind, event.track.title, client_id
        );
        let frame = RelayFrame::track_event(&event);
        if sender.send(Message::Text(frame.to_json().into())).is_err() {
          break;
        }
      }
    });
    *session.forwarder.lock() = Some(task);
    session
  }

  pub fn is_closed(&self) -> bool {
    self.closed.load(Ordering::Acquire)
  }

  pub fn send_frame(&self, frame: &RelayFrame) -> bool {
    if self.is_closed() {
      return false;
    }
    self.sender.send(Message::Text(frame.to_json().into())).is_ok()
  }

  /// Creates the subscription for `guild_id`, or returns the existing one.
  pub fn create_subscription(
    self: &Arc<Self>,
    guild_id: GuildId,
    channel_id: ChannelId,
  ) -> (Arc<Subscription>, SubscriptionOutcome) {
    match self.subscriptions.entry(guild_id.clone()) {
      Entry::Occupied(entry) => (entry.get().clone(), SubscriptionOutcome::AlreadyExists),
      Entry::Vacant(entry) => {
        let adapter = Arc::new(RelayAdapter {
          guild_id: guild_id.clone(),
          session: Arc::downgrade(self),
        });
        let subscription = Subscription::new(
          self.client_id.clone(),
          guild_id.clone(),
          channel_id,
          adapter,
          self.transport.clone(),
          self.events.clone(),
          self.config.clone(),
        );
        self
          .adapters
          .insert(guild_id, subscription.connection().clone());
        entry.insert(subscription.clone());
        (subscription, SubscriptionOutcome::Created)
      }
    }
  }

  pub fn subscription(&self, guild_id: &GuildId) -> Option<Arc<Subscription>> {
    self.subscriptions.get(guild_id).map(|s| s.value().clone())
  }

  pub fn subscription_count(&self) -> usize {
    self.subscriptions.len()
  }

  /// Destroys the subscription for `guild_id`. Returns `false` if there was none.
  pub fn delete_subscription(&self, guild_id: &GuildId) -> bool {
    let Some((_, subscription)) = self.subscriptions.remove(guild_id) else {
      return false;
    };
    self.adapters.remove(guild_id);
    subscription.destroy();
    true
  }

  /// Routes one signaling dispatch from the client to its connection.
  ///
  /// A server update for a guild without an adapter means client and server
  /// disagree about what is connected, and the whole channel must close.
  pub fn handle_dispatch(&self, dispatch: GatewayDispatch) -> Result<(), RelayCloseCode> {
    match dispatch {
      GatewayDispatch::VoiceStateUpdate(state) => {
        let Some(guild_id) = state.guild_id.clone() else {
          return Ok(());
        };
        if state.session_id.is_none() || state.user_id != self.client_id {
          return Ok(());
        }
        let connection = self.adapters.get(&guild_id).map(|c| c.value().clone());
        match connection {
          Some(connection) => connection.on_voice_state_update(state),
          None => debug!("[{}] voice state update without adapter", guild_id),
        }
        Ok(())
      }
      GatewayDispatch::VoiceServerUpdate(server) => {
        let connection = self.adapters.get(&server.guild_id).map(|c| c.value().clone());
        let Some(connection) = connection else {
          warn!(
            "[{}] voice server update from client {} for a guild with no connection",
            server.guild_id, self.client_id
          );
          return Err(RelayCloseCode::NoConnectedGuild);
        };
        connection.on_voice_server_update(server);
        Ok(())
      }
    }
  }

  /// Destroys every subscription of this session. Returns how many were
  /// destroyed; later calls return 0.
  pub fn close(&self) -> usize {
    if self.closed.swap(true, Ordering::AcqRel) {
      return 0;
    }

    let subscriptions: Vec<Arc<Subscription>> = self
      .subscriptions
      .iter()
      .map(|s| s.value().clone())
      .collect();
    let destroyed = subscriptions.iter().filter(|s| s.destroy()).count();
    self.subscriptions.clear();
    self.adapters.clear();

    if let Some(task) = self.forwarder.lock().take() {
      task.abort();
    }
    info!(
      "session {} of client {} closed, {} subscription(s) destroyed",
      self.session_id, self.client_id, destroyed
    );
    destroyed
  }
}

impl Drop for Session {
  fn drop(&mut self) {
    if let Some(task) = self.forwarder.lock().take() {
      task.abort();
    }
  }
}

/// Carries a guild's outbound signaling over the owning session's relay channel.
struct RelayAdapter {
  guild_id: GuildId,
  session: Weak<Session>,
}

impl GatewayAdapter for RelayAdapter {
  fn send_payload(&self, payload: Value) -> bool {
    match self.session.upgrade() {
      Some(session) => session.send_frame(&RelayFrame::voice_state_update(payload)),
      None => false,
    }
  }

  fn destroy(&self) {
    let Some(session) = self.session.upgrade() else {
      return;
    };
    session
      .adapters
      .remove_if(&self.guild_id, |_, connection| connection.is_destroyed());
    session
      .subscriptions
      .remove_if(&self.guild_id, |_, subscription| subscription.is_destroyed());
  }
}
