use serde_json::Value;

use crate::common::types::{ChannelId, GuildId};

/// Gateway opcode a bot sends to join, move or leave a voice channel.
pub const GATEWAY_VOICE_STATE_UPDATE: u8 = 4;

/// Outbound half of the signaling bridge between a voice connection and the
/// client that owns the gateway shard for its guild.
pub trait GatewayAdapter: Send + Sync {
  /// Sends a gateway payload for the client to forward. Returns `false` when
  /// nothing can carry it anymore.
  fn send_payload(&self, payload: Value) -> bool;

  /// Called once when the connection is destroyed.
  fn destroy(&self);
}

/// Builds the gateway payload that joins `channel_id`, or leaves voice when it is `None`.
pub fn voice_state_payload(
  guild_id: &GuildId,
  channel_id: Option<&ChannelId>,
  self_mute: bool,
  self_deaf: bool,
) -> Value {
  serde_json::json!({
    "op": GATEWAY_VOICE_STATE_UPDATE,
    "d": {
      "guild_id": guild_id,
      "channel_id": channel_id,
      "self_mute": self_mute,
      "self_deaf": self_deaf,
    }
  })
}
