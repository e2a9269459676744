use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timings and limits of the per-guild connection policy.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VoiceConfig {
  /// How long a connection may sit in Signalling/Connecting before it is destroyed.
  #[serde(default = "default_ready_timeout_ms")]
  pub ready_timeout_ms: u64,
  /// Window after a 4014 close in which a channel move may recover the connection.
  #[serde(default = "default_reconnect_grace_ms")]
  pub reconnect_grace_ms: u64,
  /// Backoff step; the n-th rejoin waits n steps.
  #[serde(default = "default_rejoin_step_ms")]
  pub rejoin_step_ms: u64,
  #[serde(default = "default_max_rejoin_attempts")]
  pub max_rejoin_attempts: u32,
  #[serde(default = "default_true")]
  pub self_deaf: bool,
  #[serde(default)]
  pub self_mute: bool,
}

impl VoiceConfig {
  pub fn ready_timeout(&self) -> Duration {
    Duration::from_millis(self.ready_timeout_ms)
  }

  pub fn reconnect_grace(&self) -> Duration {
    Duration::from_millis(self.reconnect_grace_ms)
  }

  pub fn rejoin_step(&self) -> Duration {
    Duration::from_millis(self.rejoin_step_ms)
  }
}

impl Default for VoiceConfig {
  fn default() -> Self {
    Self {
      ready_timeout_ms: default_ready_timeout_ms(),
      reconnect_grace_ms: default_reconnect_grace_ms(),
      rejoin_step_ms: default_rejoin_step_ms(),
      max_rejoin_attempts: default_max_rejoin_attempts(),
      self_deaf: true,
      self_mute: false,
    }
  }
}

fn default_ready_timeout_ms() -> u64 {
  20_000
}

fn default_reconnect_grace_ms() -> u64 {
  5_000
}

fn default_rejoin_step_ms() -> u64 {
  5_000
}

fn default_max_rejoin_attempts() -> u32 {
  5
}

fn default_true() -> bool {
  true
}
