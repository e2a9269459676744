use std::sync::Arc;

use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use crate::{
  client::{
    ClientError,
    queue::{PlaybackQueue, PlaybackSubmitter, QueueEvent},
  },
  common::types::{ClientId, GuildId},
  protocol::{
    frames::{GatewayDispatch, RelayFrame},
    opcodes::RelayOp,
    tracks::TrackSource,
  },
};

/// Builds the relay handshake url from a `ws://host:port` base.
pub fn relay_url(base_url: &str, client_id: &ClientId, auth: &str) -> String {
  format!(
    "{}/ws?clientId={}&auth={}",
    base_url.trim_end_matches('/'),
    urlencoding::encode(client_id),
    urlencoding::encode(auth)
  )
}

/// A bot's end of the relay channel. Owns one [`PlaybackQueue`] per guild and
/// drives them from the service's track notifications.
pub struct RelayClient {
  client_id: ClientId,
  submitter: Arc<dyn PlaybackSubmitter>,
  queues: DashMap<GuildId, Arc<PlaybackQueue>>,
  /// Frames for the service.
  outbound: flume::Sender<Message>,
  /// Gateway payloads the bot must send through its own shard.
  gateway: flume::Sender<Value>,
  events: Option<flume::Sender<QueueEvent>>,
}

impl RelayClient {
  pub fn new(
    client_id: ClientId,
    submitter: Arc<dyn PlaybackSubmitter>,
    outbound: flume::Sender<Message>,
    gateway: flume::Sender<Value>,
    events: Option<flume::Sender<QueueEvent>>,
  ) -> Arc<Self> {
    Arc::new(Self {
      client_id,
      submitter,
      queues: DashMap::new(),
      outbound,
      gateway,
      events,
    })
  }

  /// Opens the relay channel. The returned task ends with the channel and
  /// yields the close code the service sent, if any.
  pub async fn connect(
    base_url: &str,
    client_id: ClientId,
    auth: &str,
    submitter: Arc<dyn PlaybackSubmitter>,
    gateway: flume::Sender<Value>,
    events: Option<flume::Sender<QueueEvent>>,
  ) -> Result<(Arc<Self>, JoinHandle<Option<u16>>), ClientError> {
    let url = relay_url(base_url, &client_id, auth);
    debug!("connecting relay channel for client {}", client_id);

    let (ws_stream, _) = tokio_tungstenite::connect_async(url).await?;
    let (mut write, mut read) = ws_stream.split();

    let (tx, rx) = flume::unbounded::<Message>();
    let relay = Self::new(client_id, submitter, tx, gateway, events);

    tokio::spawn(async move {
      while let Ok(msg) = rx.recv_async().await {
        if let Err(e) = write.send(msg).await {
          warn!("relay write error: {}", e);
          break;
        }
      }
    });

    let reader = relay.clone();
    let handle = tokio::spawn(async move {
      while let Some(msg) = read.next().await {
        match msg {
          Ok(Message::Text(text)) => match serde_json::from_str::<RelayFrame>(text.as_str()) {
            Ok(frame) => reader.handle_frame(frame),
            Err(e) => warn!("malformed frame from the service: {}", e),
          },
          Ok(Message::Close(frame)) => {
            let code = frame.map(|f| u16::from(f.code)).unwrap_or(1005);
            info!("relay of client {} closed with code {}", reader.client_id, code);
            return Some(code);
          }
          Ok(_) => {}
          Err(e) => {
            warn!("relay read error for client {}: {}", reader.client_id, e);
            break;
          }
        }
      }
      None
    });

    Ok((relay, handle))
  }

  pub fn client_id(&self) -> &ClientId {
    &self.client_id
  }

  /// The guild's queue, created on first use.
  pub fn queue(&self, guild_id: &GuildId) -> Arc<PlaybackQueue> {
    self
      .queues
      .entry(guild_id.clone())
      .or_insert_with(|| {
        Arc::new(PlaybackQueue::new(
          guild_id.clone(),
          self.submitter.clone(),
          self.events.clone(),
        ))
      })
      .clone()
  }

  pub async fn enqueue(&self, guild_id: &GuildId, source: TrackSource) {
    self.queue(guild_id).enqueue(source).await;
  }

  /// Forgets the guild's queue, typically after leaving voice.
  pub fn remove_queue(&self, guild_id: &GuildId) -> bool {
    self.queues.remove(guild_id).is_some()
  }

  /// Relays a voice state or voice server update the bot's gateway received.
  pub fn forward_dispatch(&self, dispatch: &GatewayDispatch) -> bool {
    self
      .outbound
      .send(Message::Text(dispatch.to_value().to_string().into()))
      .is_ok()
  }

  pub fn close(&self) {
    let _ = self.outbound.send(Message::Close(None));
  }

  pub fn handle_frame(&self, frame: RelayFrame) {
    let Some(op) = frame.relay_op() else {
      debug!("ignoring relay frame with unknown op {}", frame.op);
      return;
    };

    match op {
      RelayOp::Hello => info!("relay of client {} ready: {}", self.client_id, frame.d),
      RelayOp::VoiceStateUpdate => {
        if self.gateway.send(frame.d).is_err() {
          warn!("gateway sink of client {} is gone", self.client_id);
        }
      }
      RelayOp::OnStart => {
        if let Some(guild_id) = frame.guild_id() {
          self.queue(&guild_id).lock(true);
        }
      }
      RelayOp::OnFinish | RelayOp::OnError => {
        if let Some(guild_id) = frame.guild_id() {
          let queue = self.queue(&guild_id);
          queue.lock(false);
          tokio::spawn(async move { queue.process().await });
        }
      }
    }
  }
}
