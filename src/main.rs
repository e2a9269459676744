use std::sync::Arc;

use tracing::{info, warn};
use voicelink::{
  common::logger,
  configs::Config,
  server::AppState,
  sources::{FfmpegOpener, YtDlpResolver},
  transport,
  voice::NullTransport,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  let (config, loaded) = match Config::load() {
    Ok((config, path)) => (config, Ok(path)),
    Err(e) => (Config::default(), Err(e)),
  };

  logger::init(&config);

  match loaded {
    Ok(path) => info!("loaded configuration from {}", path),
    Err(e) => warn!("no usable configuration ({}), running with defaults", e),
  }

  let state = Arc::new(AppState::new(
    config.clone(),
    Arc::new(YtDlpResolver::new(&config.media)),
    Arc::new(FfmpegOpener::new(&config.media)),
    Arc::new(NullTransport),
  ));
  warn!("no voice transport linked, audio frames will be discarded");

  let listener =
    tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
  info!("VoiceLink listening on {}", listener.local_addr()?);

  axum::serve(listener, transport::router(state))
    .with_graceful_shutdown(async {
      if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
      }
      info!("shutting down");
    })
    .await?;

  Ok(())
}
