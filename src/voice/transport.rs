use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::debug;

use crate::common::types::{AnyResult, ChannelId, ClientId, GuildId};

/// Everything a transport needs to open a voice link for one guild.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceTarget {
  pub guild_id: GuildId,
  pub user_id: ClientId,
  pub channel_id: ChannelId,
  pub session_id: String,
  pub token: String,
  pub endpoint: String,
}

/// An established voice link.
pub struct TransportLink {
  /// 20 ms frames of 48 kHz stereo s16le PCM.
  pub frames: flume::Sender<Bytes>,
  /// Resolves with the close code once the link drops.
  pub closed: oneshot::Receiver<u16>,
}

/// The voice server side of a connection: UDP/RTP, encryption and encoding all
/// live behind this trait.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
  /// Opens a link. Returning `Ok` means the link can carry audio right away.
  async fn connect(&self, target: VoiceTarget) -> AnyResult<TransportLink>;
}

/// Transport used when no voice backend is linked: every link is ready
/// immediately and frames are discarded.
pub struct NullTransport;

#[async_trait]
impl VoiceTransport for NullTransport {
  async fn connect(&self, target: VoiceTarget) -> AnyResult<TransportLink> {
    let (frames_tx, frames_rx) = flume::unbounded::<Bytes>();
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
      let mut discarded: u64 = 0;
      while frames_rx.recv_async().await.is_ok() {
        discarded += 1;
      }
      debug!("[{}] null link closed after {} frames", target.guild_id, discarded);
      drop(closed_tx);
    });

    Ok(TransportLink {
      frames: frames_tx,
      closed: closed_rx,
    })
  }
}
