use std::{
  fmt,
  sync::{
    Arc, Weak,
    atomic::{AtomicU32, AtomicU64, Ordering},
  },
  time::Duration,
};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::{
  sync::{mpsc, watch},
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
  common::types::{ChannelId, ClientId, GuildId},
  protocol::{
    frames::{VoiceServerData, VoiceStateData},
    opcodes::{VOICE_CLOSE_ABNORMAL, VOICE_CLOSE_DISCONNECTED},
  },
  voice::{
    adapter::{GatewayAdapter, voice_state_payload},
    transport::{VoiceTarget, VoiceTransport},
  },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
  /// The voice link closed with this code.
  WebSocketClose(u16),
  /// The gateway reported the voice server went away.
  EndpointRemoved,
  /// The transport failed to open a link.
  TransportError,
  /// The join payload could not be handed to the client.
  AdapterUnavailable,
}

impl DisconnectReason {
  /// A 4014 close is either a channel move or a kick; only time tells which.
  pub fn is_ambiguous_close(&self) -> bool {
    matches!(self, Self::WebSocketClose(VOICE_CLOSE_DISCONNECTED))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
  Signalling,
  Connecting,
  Ready,
  Disconnected(DisconnectReason),
  Destroyed,
}

impl fmt::Display for ConnectionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Signalling => write!(f, "signalling"),
      Self::Connecting => write!(f, "connecting"),
      Self::Ready => write!(f, "ready"),
      Self::Disconnected(reason) => write!(f, "disconnected ({:?})", reason),
      Self::Destroyed => write!(f, "destroyed"),
    }
  }
}

/// One status transition, delivered in order to the owner of the connection.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
  pub old: ConnectionStatus,
  pub new: ConnectionStatus,
}

pub struct JoinOptions {
  pub guild_id: GuildId,
  pub channel_id: ChannelId,
  pub user_id: ClientId,
  pub self_deaf: bool,
  pub self_mute: bool,
}

#[derive(Default)]
struct Signalling {
  session_id: Option<String>,
  server: Option<VoiceServerData>,
}

/// Frame sink shared with the player; `None` while no link is up.
pub type FrameSink = watch::Receiver<Option<flume::Sender<Bytes>>>;

/// A guild's voice connection handle.
///
/// Signaling (voice state and voice server updates) arrives through the
/// adapter map of the owning session; the link itself is opened by the
/// [`VoiceTransport`]. Every status change is published on the channel
/// returned by [`VoiceConnection::join`]. `Destroyed` is terminal.
pub struct VoiceConnection {
  guild_id: GuildId,
  user_id: ClientId,
  channel_id: Mutex<ChannelId>,
  self_deaf: bool,
  self_mute: bool,
  signalling: Mutex<Signalling>,
  adapter: Arc<dyn GatewayAdapter>,
  transport: Arc<dyn VoiceTransport>,
  status: watch::Sender<ConnectionStatus>,
  changes: mpsc::UnboundedSender<StatusChange>,
  frames: watch::Sender<Option<flume::Sender<Bytes>>>,
  link_task: Mutex<Option<JoinHandle<()>>>,
  link_generation: AtomicU64,
  rejoin_attempts: AtomicU32,
}

impl VoiceConnection {
  /// Creates the connection in `Signalling` and asks the client to join the channel.
  pub fn join(
    options: JoinOptions,
    adapter: Arc<dyn GatewayAdapter>,
    transport: Arc<dyn VoiceTransport>,
  ) -> (Arc<Self>, mpsc::UnboundedReceiver<StatusChange>) {
    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    let (status, _) = watch::channel(ConnectionStatus::Signalling);
    let (frames, _) = watch::channel(None);

    let connection = Arc::new(Self {
      guild_id: options.guild_id,
      user_id: options.user_id,
      channel_id: Mutex::new(options.channel_id),
      self_deaf: options.self_deaf,
      self_mute: options.self_mute,
      signalling: Mutex::new(Signalling::default()),
      adapter,
      transport,
      status,
      changes: changes_tx,
      frames,
      link_task: Mutex::new(None),
      link_generation: AtomicU64::new(0),
      rejoin_attempts: AtomicU32::new(0),
    });

    // The owner sees creation as entering Signalling.
    let _ = connection.changes.send(StatusChange {
      old: ConnectionStatus::Signalling,
      new: ConnectionStatus::Signalling,
    });

    if !connection.send_join_payload() {
      connection.set_status(ConnectionStatus::Disconnected(DisconnectReason::AdapterUnavailable));
    }

    (connection, changes_rx)
  }

  pub fn guild_id(&self) -> &GuildId {
    &self.guild_id
  }

  pub fn channel_id(&self) -> ChannelId {
    self.channel_id.lock().clone()
  }

  pub fn status(&self) -> ConnectionStatus {
    self.status.borrow().clone()
  }

  pub fn is_destroyed(&self) -> bool {
    *self.status.borrow() == ConnectionStatus::Destroyed
  }

  pub fn rejoin_attempts(&self) -> u32 {
    self.rejoin_attempts.load(Ordering::Acquire)
  }

  pub fn set_rejoin_attempts(&self, attempts: u32) {
    self.rejoin_attempts.store(attempts, Ordering::Release);
  }

  /// Where the player writes frames while a link is up.
  pub fn frame_sink(&self) -> FrameSink {
    self.frames.subscribe()
  }

  /// Waits up to `timeout` for a status matching `predicate`. The current
  /// status counts. Returns `None` on timeout.
  pub async fn wait_for(
    &self,
    timeout: Duration,
    predicate: impl FnMut(&ConnectionStatus) -> bool,
  ) -> Option<ConnectionStatus> {
    let mut rx = self.status.subscribe();
    match tokio::time::timeout(timeout, rx.wait_for(predicate)).await {
      Ok(Ok(status)) => Some(status.clone()),
      _ => None,
    }
  }

  /// Applies a voice state update relayed by the client.
  pub fn on_voice_state_update(self: &Arc<Self>, update: VoiceStateData) {
    if let Some(channel_id) = update.channel_id {
      *self.channel_id.lock() = channel_id;
    }
    self.signalling.lock().session_id = update.session_id;

    if self.status() == ConnectionStatus::Signalling {
      self.try_connect();
    }
  }

  /// Applies a voice server update relayed by the client. A server update
  /// always restarts the link; a null endpoint tears it down.
  pub fn on_voice_server_update(self: &Arc<Self>, update: VoiceServerData) {
    if self.is_destroyed() {
      return;
    }

    if update.endpoint.is_none() {
      self.signalling.lock().server = None;
      if matches!(self.status(), ConnectionStatus::Connecting | ConnectionStatus::Ready) {
        self.drop_link();
        self.set_status(ConnectionStatus::Disconnected(DisconnectReason::EndpointRemoved));
      }
      return;
    }

    self.signalling.lock().server = Some(update);
    self.try_connect();
  }

  /// Asks the client to join again and returns to `Signalling`. Only a
  /// disconnected connection rejoins; a live or pending link is left alone.
  pub fn rejoin(&self) -> bool {
    if !matches!(self.status(), ConnectionStatus::Disconnected(_)) {
      debug!("[{}] rejoin skipped, connection is {}", self.guild_id, self.status());
      return false;
    }

    self.drop_link();
    if !self.send_join_payload() {
      self.set_status(ConnectionStatus::Disconnected(DisconnectReason::AdapterUnavailable));
      return false;
    }

    info!(
      "[{}] rejoining voice (attempt {})",
      self.guild_id,
      self.rejoin_attempts()
    );
    self.set_status(ConnectionStatus::Signalling)
  }

  /// Leaves voice and releases the adapter. Returns `false` if already destroyed.
  pub fn destroy(&self) -> bool {
    if !self.set_status(ConnectionStatus::Destroyed) {
      return false;
    }

    self.drop_link();
    let leave = voice_state_payload(&self.guild_id, None, self.self_mute, self.self_deaf);
    if !self.adapter.send_payload(leave) {
      debug!("[{}] leave payload not delivered", self.guild_id);
    }
    self.adapter.destroy();
    info!("[{}] voice connection destroyed", self.guild_id);
    true
  }

  /// Moves to `new` and publishes the change. Refuses to leave `Destroyed`.
  fn set_status(&self, new: ConnectionStatus) -> bool {
    let mut applied = false;
    self.status.send_if_modified(|current| {
      if *current == ConnectionStatus::Destroyed {
        return false;
      }
      let old = std::mem::replace(current, new.clone());
      debug!("[{}] connection {} -> {}", self.guild_id, old, new);
      let _ = self.changes.send(StatusChange {
        old,
        new: new.clone(),
      });
      applied = true;
      true
    });
    applied
  }

  fn send_join_payload(&self) -> bool {
    let channel_id = self.channel_id();
    self.adapter.send_payload(voice_state_payload(
      &self.guild_id,
      Some(&channel_id),
      self.self_mute,
      self.self_deaf,
    ))
  }

  fn target(&self) -> Option<VoiceTarget> {
    let signalling = self.signalling.lock();
    let session_id = signalling.session_id.clone()?;
    let server = signalling.server.as_ref()?;
    Some(VoiceTarget {
      guild_id: self.guild_id.clone(),
      user_id: self.user_id.clone(),
      channel_id: self.channel_id(),
      session_id,
      token: server.token.clone(),
      endpoint: server.endpoint.clone()?,
    })
  }

  fn try_connect(self: &Arc<Self>) {
    let Some(target) = self.target() else {
      return;
    };

    self.drop_link();
    if !self.set_status(ConnectionStatus::Connecting) {
      return;
    }

    let generation = self.link_generation.load(Ordering::Acquire);
    let transport = self.transport.clone();
    let weak = Arc::downgrade(self);
    let task = tokio::spawn(async move {
      let result = transport.connect(target).await;
      run_link(weak, generation, result).await;
    });

    if let Some(stale) = self.link_task.lock().replace(task) {
      stale.abort();
    }
  }

  /// Invalidates the current link, if any.
  fn drop_link(&self) {
    self.link_generation.fetch_add(1, Ordering::AcqRel);
    if let Some(task) = self.link_task.lock().take() {
      task.abort();
    }
    self.frames.send_replace(None);
  }

  fn is_current_link(&self, generation: u64) -> bool {
    self.link_generation.load(Ordering::Acquire) == generation
  }
}

impl Drop for VoiceConnection {
  fn drop(&mut self) {
    if let Some(task) = self.link_task.lock().take() {
      task.abort();
    }
  }
}

async fn run_link(
  connection: Weak<VoiceConnection>,
  generation: u64,
  result: crate::common::types::AnyResult<crate::voice::transport::TransportLink>,
) {
  let link = {
    let Some(conn) = connection.upgrade() else {
      return;
    };
    if !conn.is_current_link(generation) {
      return;
    }

    match result {
      Ok(link) => {
        conn.frames.send_replace(Some(link.frames));
        conn.set_rejoin_attempts(0);
        conn.set_status(ConnectionStatus::Ready);
        link.closed
      }
      Err(e) => {
        warn!("[{}] voice transport failed to connect: {}", conn.guild_id, e);
        conn.set_status(ConnectionStatus::Disconnected(DisconnectReason::TransportError));
        return;
      }
    }
  };

  let code = link.await.unwrap_or(VOICE_CLOSE_ABNORMAL);

  let Some(conn) = connection.upgrade() else {
    return;
  };
  if !conn.is_current_link(generation) {
    return;
  }
  info!("[{}] voice link closed with code {}", conn.guild_id, code);
  conn.frames.send_replace(None);
  conn.set_status(ConnectionStatus::Disconnected(DisconnectReason::WebSocketClose(code)));
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::voice::testing::{MockTransport, RecordingGateway, server_update, state_update};

  fn options() -> JoinOptions {
    JoinOptions {
      guild_id: "42".into(),
      channel_id: "7".into(),
      user_id: "99".into(),
      self_deaf: true,
      self_mute: false,
    }
  }

  async fn settle() {
    for _ in 0..10 {
      tokio::task::yield_now().await;
    }
  }

  fn drain(rx: &mut mpsc::UnboundedReceiver<StatusChange>) -> Vec<ConnectionStatus> {
    let mut seen = Vec::new();
    while let Ok(change) = rx.try_recv() {
      seen.push(change.new);
    }
    seen
  }

  #[tokio::test]
  async fn test_join_sends_payload_and_starts_signalling() {
    let gateway = RecordingGateway::new();
    let (conn, mut rx) = VoiceConnection::join(options(), gateway.clone(), MockTransport::ready());

    assert_eq!(conn.status(), ConnectionStatus::Signalling);
    assert_eq!(drain(&mut rx), vec![ConnectionStatus::Signalling]);
    let payloads = gateway.payloads();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["d"]["channel_id"], "7");
  }

  #[tokio::test]
  async fn test_signaling_drives_connection_to_ready() {
    let gateway = RecordingGateway::new();
    let transport = MockTransport::ready();
    let (conn, mut rx) = VoiceConnection::join(options(), gateway.clone(), transport.clone());

    conn.on_voice_state_update(state_update("42", "99"));
    assert_eq!(conn.status(), ConnectionStatus::Signalling);

    conn.on_voice_server_update(server_update("42"));
    settle().await;

    assert_eq!(conn.status(), ConnectionStatus::Ready);
    assert!(conn.frame_sink().borrow().is_some());
    assert_eq!(
      drain(&mut rx),
      vec![ConnectionStatus::Signalling, ConnectionStatus::Connecting, ConnectionStatus::Ready]
    );
    assert_eq!(transport.targets()[0].session_id, "session-99");
  }

  #[tokio::test]
  async fn test_remote_close_disconnects_with_code() {
    let transport = MockTransport::ready();
    let (conn, _rx) = VoiceConnection::join(options(), RecordingGateway::new(), transport.clone());
    conn.on_voice_state_update(state_update("42", "99"));
    conn.on_voice_server_update(server_update("42"));
    settle().await;

    transport.close(4014);
    settle().await;

    assert_eq!(
      conn.status(),
      ConnectionStatus::Disconnected(DisconnectReason::WebSocketClose(4014))
    );
    assert!(conn.frame_sink().borrow().is_none());
  }

  #[tokio::test]
  async fn test_failed_transport_disconnects() {
    let (conn, _rx) = VoiceConnection::join(options(), RecordingGateway::new(), MockTransport::failing());
    conn.on_voice_state_update(state_update("42", "99"));
    conn.on_voice_server_update(server_update("42"));
    settle().await;

    assert_eq!(
      conn.status(),
      ConnectionStatus::Disconnected(DisconnectReason::TransportError)
    );
  }

  #[tokio::test]
  async fn test_null_endpoint_removes_link() {
    let (conn, _rx) = VoiceConnection::join(options(), RecordingGateway::new(), MockTransport::ready());
    conn.on_voice_state_update(state_update("42", "99"));
    conn.on_voice_server_update(server_update("42"));
    settle().await;

    let mut gone = server_update("42");
    gone.endpoint = None;
    conn.on_voice_server_update(gone);

    assert_eq!(
      conn.status(),
      ConnectionStatus::Disconnected(DisconnectReason::EndpointRemoved)
    );
  }

  #[tokio::test]
  async fn test_destroy_is_terminal_and_idempotent() {
    let gateway = RecordingGateway::new();
    let (conn, mut rx) = VoiceConnection::join(options(), gateway.clone(), MockTransport::ready());

    assert!(conn.destroy());
    assert!(!conn.destroy());
    assert!(!conn.rejoin());
    conn.on_voice_server_update(server_update("42"));

    assert_eq!(conn.status(), ConnectionStatus::Destroyed);
    assert_eq!(gateway.destroy_calls(), 1);
    let payloads = gateway.payloads();
    assert!(payloads.last().unwrap()["d"]["channel_id"].is_null());
    assert_eq!(
      drain(&mut rx),
      vec![ConnectionStatus::Signalling, ConnectionStatus::Destroyed]
    );
  }

  #[tokio::test]
  async fn test_rejoin_leaves_live_link_alone() {
    let gateway = RecordingGateway::new();
    let transport = MockTransport::ready();
    let (conn, _rx) = VoiceConnection::join(options(), gateway.clone(), transport.clone());
    conn.on_voice_state_update(state_update("42", "99"));
    conn.on_voice_server_update(server_update("42"));
    settle().await;
    assert_eq!(conn.status(), ConnectionStatus::Ready);

    assert!(!conn.rejoin());
    assert_eq!(conn.status(), ConnectionStatus::Ready);
    assert!(conn.frame_sink().borrow().is_some());
    assert_eq!(gateway.join_times().len(), 1);

    transport.close(4006);
    settle().await;
    assert!(conn.rejoin());
    assert_eq!(conn.status(), ConnectionStatus::Signalling);
    assert_eq!(gateway.join_times().len(), 2);
  }

  #[tokio::test]
  async fn test_join_without_adapter_disconnects() {
    let gateway = RecordingGateway::new();
    gateway.set_available(false);
    let (conn, _rx) = VoiceConnection::join(options(), gateway, MockTransport::ready());
    assert_eq!(
      conn.status(),
      ConnectionStatus::Disconnected(DisconnectReason::AdapterUnavailable)
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_wait_for_times_out() {
    let (conn, _rx) = VoiceConnection::join(options(), RecordingGateway::new(), MockTransport::ready());
    let start = tokio::time::Instant::now();
    let status = conn
      .wait_for(Duration::from_secs(3), |s| *s == ConnectionStatus::Ready)
      .await;
    assert_eq!(status, None);
    assert_eq!(start.elapsed(), Duration::from_secs(3));
  }
}
