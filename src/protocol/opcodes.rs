/// Op codes of the relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RelayOp {
  /// Handshake acknowledgement (server -> client).
  Hello = 0,
  /// Voice signaling passthrough (both directions).
  VoiceStateUpdate = 1,
  OnStart = 2,
  OnFinish = 3,
  OnError = 4,
}

impl RelayOp {
  pub fn from_u8(v: u8) -> Option<Self> {
    match v {
      0 => Some(Self::Hello),
      1 => Some(Self::VoiceStateUpdate),
      2 => Some(Self::OnStart),
      3 => Some(Self::OnFinish),
      4 => Some(Self::OnError),
      _ => None,
    }
  }
}

/// Application close codes sent when the relay channel is torn down by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RelayCloseCode {
  NoClientId = 4001,
  NoAuth = 4002,
  /// Signaling arrived for a guild with no adapter; client and server state diverged.
  NoConnectedGuild = 4003,
}

impl RelayCloseCode {
  pub fn code(self) -> u16 {
    self as u16
  }

  pub fn from_code(code: u16) -> Option<Self> {
    match code {
      4001 => Some(Self::NoClientId),
      4002 => Some(Self::NoAuth),
      4003 => Some(Self::NoConnectedGuild),
      _ => None,
    }
  }

  /// JSON close reason, kept in the shape existing clients parse.
  pub fn reason(self) -> String {
    let message = match self {
      Self::NoClientId => "No clientId provided.",
      Self::NoAuth => "No valid auth provided.",
      Self::NoConnectedGuild => "No connected guild for voice server update.",
    };
    serde_json::json!({ "message": message }).to_string()
  }
}

/// Voice gateway close code meaning "disconnected from the channel": either
/// moved to another channel or kicked.
pub const VOICE_CLOSE_DISCONNECTED: u16 = 4014;

/// Close code used when a transport link drops without a close frame.
pub const VOICE_CLOSE_ABNORMAL: u16 = 1006;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_op_codes_match_wire_values() {
    assert_eq!(RelayOp::Hello as u8, 0);
    assert_eq!(RelayOp::OnError as u8, 4);
    assert_eq!(RelayOp::from_u8(3), Some(RelayOp::OnFinish));
    assert_eq!(RelayOp::from_u8(9), None);
  }

  #[test]
  fn test_close_reason_is_json() {
    let reason: serde_json::Value = serde_json::from_str(&RelayCloseCode::NoAuth.reason()).unwrap();
    assert_eq!(reason["message"], "No valid auth provided.");
    assert_eq!(RelayCloseCode::from_code(4002), Some(RelayCloseCode::NoAuth));
  }
}
