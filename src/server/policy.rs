use std::time::Duration;

use crate::{configs::VoiceConfig, voice::connection::ConnectionStatus};

/// What a subscription does in response to its connection entering a status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyAction {
  None,
  /// Destroy the connection unless it is ready within the deadline.
  ArmReadyDeadline(Duration),
  /// A 4014 close: destroy unless signaling resumes within the grace window.
  AwaitRecovery(Duration),
  /// Ask the client to rejoin after `delay`. `attempt` is the new counter value.
  Rejoin { attempt: u32, delay: Duration },
  Destroy,
  StopPlayer,
}

/// Linear rejoin backoff: `step` for the first attempt, `2 * step` for the second, and so on.
pub fn rejoin_delay(step: Duration, attempt: u32) -> Duration {
  step * attempt
}

/// Decides the reaction to `status`. `deadline_armed` is the ready-deadline
/// guard; while it is held no second deadline is armed.
pub fn on_status(
  status: &ConnectionStatus,
  deadline_armed: bool,
  rejoin_attempts: u32,
  config: &VoiceConfig,
) -> PolicyAction {
  match status {
    ConnectionStatus::Disconnected(reason) if reason.is_ambiguous_close() => {
      PolicyAction::AwaitRecovery(config.reconnect_grace())
    }
    ConnectionStatus::Disconnected(_) if rejoin_attempts < config.max_rejoin_attempts => {
      let attempt = rejoin_attempts + 1;
      PolicyAction::Rejoin {
        attempt,
        delay: rejoin_delay(config.rejoin_step(), attempt),
      }
    }
    ConnectionStatus::Disconnected(_) => PolicyAction::Destroy,
    ConnectionStatus::Destroyed => PolicyAction::StopPlayer,
    ConnectionStatus::Signalling | ConnectionStatus::Connecting if !deadline_armed => {
      PolicyAction::ArmReadyDeadline(config.ready_timeout())
    }
    _ => PolicyAction::None,
  }
}
