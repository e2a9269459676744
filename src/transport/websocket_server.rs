use std::sync::Arc;

use axum::{
  extract::{
    Query, State,
    ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
  },
  response::Response,
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::{
  common::types::ClientId,
  protocol::{
    frames::{RelayFrame, parse_inbound},
    opcodes::RelayCloseCode,
  },
  server::{AppState, Session},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayParams {
  pub client_id: Option<String>,
  pub auth: Option<String>,
}

/// GET /ws?clientId=<id>&auth=<secret>
///
/// Always upgrades; a bad handshake is answered with a close frame so the
/// client sees the close code.
pub async fn websocket_handler(
  ws: WebSocketUpgrade,
  Query(params): Query<RelayParams>,
  State(state): State<Arc<AppState>>,
) -> Response {
  ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn reject(mut socket: WebSocket, code: RelayCloseCode) {
  let frame = CloseFrame {
    code: code.code(),
    reason: code.reason().into(),
  };
  if let Err(e) = socket.send(Message::Close(Some(frame))).await {
    debug!("failed to send close frame {}: {}", code.code(), e);
  }
}

pub async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, params: RelayParams) {
  let Some(client_id) = params.client_id.filter(|id| !id.is_empty()).map(ClientId::from) else {
    warn!("relay handshake without clientId");
    return reject(socket, RelayCloseCode::NoClientId).await;
  };

  if params.auth.as_deref() != Some(state.config.server.password.as_str()) {
    warn!("relay handshake from client {} with invalid auth", client_id);
    return reject(socket, RelayCloseCode::NoAuth).await;
  }

  let (tx, rx) = flume::unbounded();
  let session = Session::new(
    client_id.clone(),
    tx,
    state.transport.clone(),
    state.config.voice.clone(),
  );
  state.registry.register(session.clone());
  info!(
    "client {} connected and authenticated: session={}",
    client_id, session.session_id
  );

  if let Err(e) = socket
    .send(Message::Text(RelayFrame::hello().to_json().into()))
    .await
  {
    error!("failed to greet client {}: {}", client_id, e);
  }

  loop {
    tokio::select! {
      Ok(msg) = rx.recv_async() => {
        if let Err(e) = socket.send(msg).await {
          error!("relay send error: client={} err={}", client_id, e);
          break;
        }
      }
      msg = socket.recv() => {
        let msg = match msg {
          Some(Ok(msg)) => msg,
          Some(Err(e)) => {
            warn!("relay error: client={} err={}", client_id, e);
            break;
          }
          None => break,
        };

        match msg {
          Message::Text(text) => match parse_inbound(text.as_str()) {
            Ok(Some(dispatch)) => {
              if let Err(code) = session.handle_dispatch(dispatch) {
                reject(socket, code).await;
                state.registry.on_channel_close(&session);
                return;
              }
            }
            Ok(None) => {}
            Err(e) => warn!("malformed relay frame from client {}: {}", client_id, e),
          },
          Message::Close(frame) => {
            let (code, reason) = frame
              .map(|f| (f.code, f.reason.as_str().to_string()))
              .unwrap_or((1005, String::new()));
            info!(
              "client {} closed the relay with code {} and reason '{}'",
              client_id, code, reason
            );
            break;
          }
          _ => {}
        }
      }
    }
  }

  let destroyed = state.registry.on_channel_close(&session);
  debug!(
    "relay of client {} cleaned up, {} subscription(s) destroyed",
    client_id, destroyed
  );
}
