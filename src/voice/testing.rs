//! Test doubles for the voice layer.

use std::sync::{
  Arc,
  atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::{sync::oneshot, time::Instant};

use crate::{
  common::types::AnyResult,
  protocol::frames::{VoiceServerData, VoiceStateData},
  voice::{
    adapter::GatewayAdapter,
    transport::{TransportLink, VoiceTarget, VoiceTransport},
  },
};

pub fn state_update(guild: &str, user: &str) -> VoiceStateData {
  VoiceStateData {
    guild_id: Some(guild.into()),
    channel_id: Some("7".into()),
    user_id: user.into(),
    session_id: Some(format!("session-{}", user)),
  }
}

pub fn server_update(guild: &str) -> VoiceServerData {
  VoiceServerData {
    token: "token".into(),
    guild_id: guild.into(),
    endpoint: Some("voice.example:443".into()),
  }
}

#[derive(Default)]
pub struct MockTransport {
  fail: AtomicBool,
  targets: Mutex<Vec<VoiceTarget>>,
  closers: Mutex<Vec<oneshot::Sender<u16>>>,
  sinks: Mutex<Vec<flume::Receiver<Bytes>>>,
}

impl MockTransport {
  pub fn ready() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn failing() -> Arc<Self> {
    let transport = Self::default();
    transport.set_failing(true);
    Arc::new(transport)
  }

  /// Makes later connect attempts fail (or succeed again).
  pub fn set_failing(&self, fail: bool) {
    self.fail.store(fail, Ordering::SeqCst);
  }

  pub fn targets(&self) -> Vec<VoiceTarget> {
    self.targets.lock().clone()
  }

  pub fn connects(&self) -> usize {
    self.targets.lock().len()
  }

  /// Closes the most recent link from the remote side.
  pub fn close(&self, code: u16) {
    if let Some(tx) = self.closers.lock().pop() {
      let _ = tx.send(code);
    }
  }

  /// Frames written to the most recent link and not yet taken.
  pub fn take_frames(&self) -> Vec<Bytes> {
    self
      .sinks
      .lock()
      .last()
      .map(|rx| rx.drain().collect())
      .unwrap_or_default()
  }
}

#[async_trait]
impl VoiceTransport for MockTransport {
  async fn connect(&self, target: VoiceTarget) -> AnyResult<TransportLink> {
    self.targets.lock().push(target);
    if self.fail.load(Ordering::SeqCst) {
      return Err("voice server unreachable".into());
    }

    let (frames_tx, frames_rx) = flume::unbounded();
    let (closed_tx, closed_rx) = oneshot::channel();
    self.closers.lock().push(closed_tx);
    self.sinks.lock().push(frames_rx);
    Ok(TransportLink {
      frames: frames_tx,
      closed: closed_rx,
    })
  }
}

pub struct RecordingGateway {
  available: AtomicBool,
  payloads: Mutex<Vec<(Instant, Value)>>,
  destroyed: AtomicUsize,
}

impl RecordingGateway {
  pub fn new() -> Arc<Self> {
    Arc::new(Self {
      available: AtomicBool::new(true),
      payloads: Mutex::new(Vec::new()),
      destroyed: AtomicUsize::new(0),
    })
  }

  pub fn set_available(&self, available: bool) {
    self.available.store(available, Ordering::SeqCst);
  }

  pub fn payloads(&self) -> Vec<Value> {
    self.payloads.lock().iter().map(|(_, p)| p.clone()).collect()
  }

  /// When each join (non-null channel) payload was sent.
  pub fn join_times(&self) -> Vec<Instant> {
    self
      .payloads
      .lock()
      .iter()
      .filter(|(_, p)| !p["d"]["channel_id"].is_null())
      .map(|(at, _)| *at)
      .collect()
  }

  pub fn destroy_calls(&self) -> usize {
    self.destroyed.load(Ordering::SeqCst)
  }
}

impl GatewayAdapter for RecordingGateway {
  fn send_payload(&self, payload: Value) -> bool {
    if !self.available.load(Ordering::SeqCst) {
      return false;
    }
    self.payloads.lock().push((Instant::now(), payload));
    true
  }

  fn destroy(&self) {
    self.destroyed.fetch_add(1, Ordering::SeqCst);
  }
}
