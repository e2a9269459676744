use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::{
  common::types::{AnyResult, GuildId},
  protocol::tracks::{Track, TrackSource},
};

/// Starts playback of one item on the service side.
#[async_trait]
pub trait PlaybackSubmitter: Send + Sync {
  async fn submit(&self, guild_id: &GuildId, source: &TrackSource) -> AnyResult<Track>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
  Submitted {
    guild_id: GuildId,
    track: Track,
  },
  /// Raised once per failed attempt.
  SubmissionFailed {
    guild_id: GuildId,
    source: TrackSource,
    error: String,
  },
}

#[derive(Default)]
struct QueueState {
  pending: VecDeque<TrackSource>,
  current: Option<TrackSource>,
  /// Held by the relay between a start and a finish notification.
  locked: bool,
  /// Held while a submission chain is in flight.
  processing: bool,
}

/// Per-guild client-side sequencer: submits one item at a time, in order, and
/// only advances when the relay says the previous one is over.
pub struct PlaybackQueue {
  guild_id: GuildId,
  submitter: Arc<dyn PlaybackSubmitter>,
  state: Mutex<QueueState>,
  events: Option<flume::Sender<QueueEvent>>,
}

/// Releases `processing` on every exit path, including a dropped future.
struct ProcessingGuard<'a>(&'a Mutex<QueueState>);

impl Drop for ProcessingGuard<'_> {
  fn drop(&mut self) {
    self.0.lock().processing = false;
  }
}

impl PlaybackQueue {
  pub fn new(
    guild_id: GuildId,
    submitter: Arc<dyn PlaybackSubmitter>,
    events: Option<flume::Sender<QueueEvent>>,
  ) -> Self {
    Self {
      guild_id,
      submitter,
      state: Mutex::new(QueueState::default()),
      events,
    }
  }

  pub fn guild_id(&self) -> &GuildId {
    &self.guild_id
  }

  pub async fn enqueue(&self, source: TrackSource) {
    debug!("[{}] enqueued '{}'", self.guild_id, source.describe());
    self.state.lock().pending.push_back(source);
    self.process().await;
  }

  pub fn lock(&self, locked: bool) {
    self.state.lock().locked = locked;
  }

  pub fn is_locked(&self) -> bool {
    self.state.lock().locked
  }

  pub fn pending(&self) -> Vec<TrackSource> {
    self.state.lock().pending.iter().cloned().collect()
  }

  pub fn current(&self) -> Option<TrackSource> {
    self.state.lock().current.clone()
  }

  /// Submits pending items head first until one is accepted or none are left.
  /// Does nothing while locked, while another call is submitting, or when
  /// there is nothing pending.
  pub async fn process(&self) {
    {
      let mut state = self.state.lock();
      if state.locked || state.processing || state.pending.is_empty() {
        return;
      }
      state.processing = true;
    }
    let _guard = ProcessingGuard(&self.state);

    loop {
      let next = {
        let mut state = self.state.lock();
        let Some(next) = state.pending.pop_front() else {
          return;
        };
        state.current = Some(next.clone());
        next
      };

      match self.submitter.submit(&self.guild_id, &next).await {
        Ok(track) => {
          info!("[{}] submitted '{}'", self.guild_id, track.title);
          self.emit(QueueEvent::Submitted {
            guild_id: self.guild_id.clone(),
            track,
          });
          return;
        }
        Err(e) => {
          error!(
            "[{}] failed to submit '{}': {}",
            self.guild_id,
            next.describe(),
            e
          );
          self.emit(QueueEvent::SubmissionFailed {
            guild_id: self.guild_id.clone(),
            source: next,
            error: e.to_string(),
          });
        }
      }
    }
  }

  fn emit(&self, event: QueueEvent) {
    if let Some(events) = &self.events
      && events.send(event).is_err()
    {
      debug!("[{}] queue event listener is gone", self.guild_id);
    }
  }
}
