use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  common::types::{ChannelId, ClientId, GuildId},
  protocol::{
    events::{TrackEvent, TrackEventKind},
    opcodes::RelayOp,
  },
};

pub const HELLO_MESSAGE: &str = "Welcome to VoiceLink.";

/// A frame on the relay channel: `{ "op": <int>, "d": <object> }`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RelayFrame {
  pub op: u8,
  pub d: Value,
}

impl RelayFrame {
  pub fn new(op: RelayOp, d: Value) -> Self {
    Self { op: op as u8, d }
  }

  pub fn hello() -> Self {
    Self::new(RelayOp::Hello, serde_json::json!({ "message": HELLO_MESSAGE }))
  }

  /// Wraps a gateway payload the client must forward to its own gateway shard.
  pub fn voice_state_update(payload: Value) -> Self {
    Self::new(RelayOp::VoiceStateUpdate, payload)
  }

  pub fn track_event(event: &TrackEvent) -> Self {
    let op = match event.kind {
      TrackEventKind::Start => RelayOp::OnStart,
      TrackEventKind::Finish => RelayOp::OnFinish,
      TrackEventKind::Error(_) => RelayOp::OnError,
    };
    Self::new(op, serde_json::json!({ "guildId": event.guild_id }))
  }

  pub fn relay_op(&self) -> Option<RelayOp> {
    RelayOp::from_u8(self.op)
  }

  /// Guild id carried by OnStart/OnFinish/OnError payloads.
  pub fn guild_id(&self) -> Option<GuildId> {
    self
      .d
      .get("guildId")
      .and_then(Value::as_str)
      .map(GuildId::from)
  }

  pub fn to_json(&self) -> String {
    serde_json::to_string(self).unwrap_or_default()
  }
}

/// Gateway dispatch name of a voice state update.
pub const VOICE_STATE_UPDATE: &str = "VOICE_STATE_UPDATE";
/// Gateway dispatch name of a voice server update.
pub const VOICE_SERVER_UPDATE: &str = "VOICE_SERVER_UPDATE";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct VoiceStateData {
  pub guild_id: Option<GuildId>,
  pub channel_id: Option<ChannelId>,
  pub user_id: ClientId,
  pub session_id: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct VoiceServerData {
  pub token: String,
  pub guild_id: GuildId,
  /// `None` when the voice server was deallocated.
  pub endpoint: Option<String>,
}

/// Signaling a client relays from its gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayDispatch {
  VoiceStateUpdate(VoiceStateData),
  VoiceServerUpdate(VoiceServerData),
}

impl GatewayDispatch {
  /// Encodes the dispatch the way a client sends it.
  pub fn to_value(&self) -> Value {
    match self {
      Self::VoiceStateUpdate(d) => serde_json::json!({ "t": VOICE_STATE_UPDATE, "d": d }),
      Self::VoiceServerUpdate(d) => serde_json::json!({ "t": VOICE_SERVER_UPDATE, "d": d }),
    }
  }
}

#[derive(Deserialize)]
struct RawDispatch {
  t: Option<String>,
  #[serde(default)]
  d: Value,
}

/// Parses a client frame. Accepts a bare dispatch `{t, d}` or one wrapped as
/// `{op: 1, d: {t, d}}`. Dispatches other than voice updates yield `None`.
pub fn parse_inbound(text: &str) -> Result<Option<GatewayDispatch>, serde_json::Error> {
  let value: Value = serde_json::from_str(text)?;

  let dispatch = match value.get("op").and_then(Value::as_u64) {
    Some(op) if op == RelayOp::VoiceStateUpdate as u64 => value.get("d").cloned().unwrap_or(Value::Null),
    Some(_) => return Ok(None),
    None => value,
  };

  let raw: RawDispatch = serde_json::from_value(dispatch)?;
  match raw.t.as_deref() {
    Some(VOICE_STATE_UPDATE) => Ok(Some(GatewayDispatch::VoiceStateUpdate(serde_json::from_value(raw.d)?))),
    Some(VOICE_SERVER_UPDATE) => Ok(Some(GatewayDispatch::VoiceServerUpdate(serde_json::from_value(raw.d)?))),
    _ => Ok(None),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::protocol::tracks::Track;

  #[test]
  fn test_hello_frame_shape() {
    let json: Value = serde_json::from_str(&RelayFrame::hello().to_json()).unwrap();
    assert_eq!(json["op"], 0);
    assert_eq!(json["d"]["message"], HELLO_MESSAGE);
  }

  #[test]
  fn test_track_event_frames() {
    let track = Arc::new(Track {
      artist: None,
      duration: 1.0,
      description: String::new(),
      title: "A".into(),
      thumbnail: String::new(),
      url: "u".into(),
      stream_url: "s".into(),
    });
    let guild = GuildId::from("42");

    let frame = RelayFrame::track_event(&TrackEvent::new(guild.clone(), track.clone(), TrackEventKind::Finish));
    assert_eq!(frame.op, 3);
    assert_eq!(frame.guild_id(), Some(guild.clone()));

    let frame = RelayFrame::track_event(&TrackEvent::new(guild, track, TrackEventKind::Error("boom".into())));
    assert_eq!(frame.relay_op(), Some(RelayOp::OnError));
    assert_eq!(frame.d, serde_json::json!({ "guildId": "42" }));
  }

  #[test]
  fn test_parse_bare_voice_server_update() {
    let text = r#"{"t":"VOICE_SERVER_UPDATE","d":{"token":"abc","guild_id":"42","endpoint":"us-east1.discord.media:443"}}"#;
    let parsed = parse_inbound(text).unwrap();
    assert_eq!(
      parsed,
      Some(GatewayDispatch::VoiceServerUpdate(VoiceServerData {
        token: "abc".into(),
        guild_id: "42".into(),
        endpoint: Some("us-east1.discord.media:443".into()),
      }))
    );
  }

  #[test]
  fn test_parse_wrapped_voice_state_update() {
    let text = r#"{"op":1,"d":{"t":"VOICE_STATE_UPDATE","d":{"guild_id":"42","channel_id":"7","user_id":"99","session_id":"s1","deaf":false}}}"#;
    match parse_inbound(text).unwrap() {
      Some(GatewayDispatch::VoiceStateUpdate(state)) => {
        assert_eq!(state.user_id, ClientId::from("99"));
        assert_eq!(state.session_id.as_deref(), Some("s1"));
      }
      other => panic!("unexpected parse result: {:?}", other),
    }
  }

  #[test]
  fn test_parse_ignores_other_dispatches() {
    assert_eq!(parse_inbound(r#"{"t":"MESSAGE_CREATE","d":{}}"#).unwrap(), None);
    assert_eq!(parse_inbound(r#"{"op":2,"d":{}}"#).unwrap(), None);
  }

  #[test]
  fn test_parse_rejects_malformed() {
    assert!(parse_inbound("not json").is_err());
    assert!(parse_inbound(r#"{"t":"VOICE_SERVER_UPDATE","d":{"guild_id":"42"}}"#).is_err());
  }

  #[test]
  fn test_dispatch_round_trips_through_client_encoding() {
    let dispatch = GatewayDispatch::VoiceStateUpdate(VoiceStateData {
      guild_id: Some("1".into()),
      channel_id: None,
      user_id: "2".into(),
      session_id: Some("s".into()),
    });
    let text = dispatch.to_value().to_string();
    assert_eq!(parse_inbound(&text).unwrap(), Some(dispatch));
  }
}
