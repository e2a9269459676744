//! Client side of VoiceLink, for bot processes that hand their voice
//! connections to the service.

pub mod api;
pub mod queue;
pub mod relay;

pub use api::VoiceLinkClient;
pub use queue::{PlaybackQueue, PlaybackSubmitter, QueueEvent};
pub use relay::RelayClient;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("service answered {status}: {message}")]
  Status { status: u16, message: String },
  #[error("relay channel failed: {0}")]
  Relay(#[from] tokio_tungstenite::tungstenite::Error),
}
