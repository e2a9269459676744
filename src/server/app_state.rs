use std::sync::Arc;

use crate::{
  configs::Config,
  server::registry::SessionRegistry,
  sources::{SourceOpener, TrackResolver},
  voice::VoiceTransport,
};

/// Top-level application state.
pub struct AppState {
  pub registry: SessionRegistry,
  pub resolver: Arc<dyn TrackResolver>,
  pub opener: Arc<dyn SourceOpener>,
  pub transport: Arc<dyn VoiceTransport>,
  pub config: Config,
}

impl AppState {
  pub fn new(
    config: Config,
    resolver: Arc<dyn TrackResolver>,
    opener: Arc<dyn SourceOpener>,
    transport: Arc<dyn VoiceTransport>,
  ) -> Self {
    Self {
      registry: SessionRegistry::new(),
      resolver,
      opener,
      transport,
      config,
    }
  }
}
