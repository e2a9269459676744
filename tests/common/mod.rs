#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use voicelink::{
  common::types::AnyResult,
  configs::Config,
  player::{AudioSource, MemorySource},
  protocol::tracks::{SearchEntry, Track},
  server::AppState,
  sources::{ResolveError, SourceOpener, TrackResolver},
  voice::NullTransport,
};

pub const PASSWORD: &str = "youshallnotpass";

/// Resolves any query except ones containing "missing"; search fails for "down".
pub struct FakeResolver;

#[async_trait]
impl TrackResolver for FakeResolver {
  async fn resolve(&self, query: &str) -> Result<Track, ResolveError> {
    if query.contains("missing") {
      return Err(ResolveError::NoStream(query.to_string()));
    }
    Ok(Track {
      title: query.to_string(),
      url: format!("https://example.com/{}", query),
      stream_url: format!("https://cdn.example.com/{}", query),
      ..Default::default()
    })
  }

  async fn search(&self, query: &str) -> Result<Vec<SearchEntry>, ResolveError> {
    if query == "down" {
      return Err(ResolveError::NoStream(query.to_string()));
    }
    Ok(vec![SearchEntry {
      artist: "Unknown".into(),
      duration: 0.0,
      description: "No description.".into(),
      title: query.to_string(),
      thumbnail: String::new(),
      url: format!("https://example.com/{}", query),
    }])
  }
}

/// Plays silence; refuses titles containing "broken".
pub struct FakeOpener;

#[async_trait]
impl SourceOpener for FakeOpener {
  async fn open(&self, track: &Track) -> AnyResult<Box<dyn AudioSource>> {
    if track.title.contains("broken") {
      return Err("decoder refused input".into());
    }
    // About a second of audio for "long" titles, 100 ms otherwise.
    let frames = if track.title.contains("long") { 50 } else { 5 };
    Ok(Box::new(MemorySource::silence(frames)))
  }
}

pub fn state() -> Arc<AppState> {
  let mut config = Config::default();
  config.server.password = PASSWORD.to_string();
  Arc::new(AppState::new(
    config,
    Arc::new(FakeResolver),
    Arc::new(FakeOpener),
    Arc::new(NullTransport),
  ))
}

/// Serves the full router on an ephemeral local port.
pub async fn spawn_server() -> (Arc<AppState>, SocketAddr) {
  let state = state();
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  let app = voicelink::transport::router(state.clone());
  tokio::spawn(async move {
    axum::serve(listener, app).await.unwrap();
  });
  (state, addr)
}
