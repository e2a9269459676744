use async_trait::async_trait;

use crate::{
  common::types::AnyResult,
  player::AudioSource,
  protocol::tracks::{SearchEntry, Track, TrackSource},
};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
  #[error("failed to run {tool}: {source}")]
  Spawn {
    tool: String,
    #[source]
    source: std::io::Error,
  },
  #[error("{tool} exited with {status}: {stderr}")]
  Tool {
    tool: String,
    status: std::process::ExitStatus,
    stderr: String,
  },
  #[error("unexpected resolver output: {0}")]
  Malformed(#[from] serde_json::Error),
  #[error("no stream url for {0}")]
  NoStream(String),
  #[error("empty query")]
  EmptyQuery,
}

/// Turns a url or search query into a playable track descriptor.
///
/// Calls are atomic: a failure leaves nothing behind and is not retried.
#[async_trait]
pub trait TrackResolver: Send + Sync {
  async fn resolve(&self, query: &str) -> Result<Track, ResolveError>;

  async fn search(&self, query: &str) -> Result<Vec<SearchEntry>, ResolveError>;

  /// Resolves a submitted source. Descriptors a client already holds are used as-is.
  async fn load(&self, source: TrackSource) -> Result<Track, ResolveError> {
    match source {
      TrackSource::Resolved(track) => Ok(track),
      TrackSource::Query(query) if query.trim().is_empty() => Err(ResolveError::EmptyQuery),
      TrackSource::Query(query) => self.resolve(query.trim()).await,
    }
  }
}

/// Opens the decoded audio of a resolved track.
#[async_trait]
pub trait SourceOpener: Send + Sync {
  async fn open(&self, track: &Track) -> AnyResult<Box<dyn AudioSource>>;
}
