use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{common::types::AnyResult, protocol::tracks::Track};

/// A stream of 20 ms PCM frames (48 kHz, stereo, s16le).
#[async_trait]
pub trait AudioSource: Send {
  /// Next frame, or `Ok(None)` once the stream is exhausted.
  async fn read_frame(&mut self) -> AnyResult<Option<Bytes>>;
}

/// A playable source correlated with the track it plays, so state changes can
/// be routed back to that track.
pub struct AudioResource {
  track: Arc<Track>,
  source: Box<dyn AudioSource>,
}

impl AudioResource {
  pub fn new(track: impl Into<Arc<Track>>, source: Box<dyn AudioSource>) -> Self {
    Self {
      track: track.into(),
      source,
    }
  }

  pub fn track(&self) -> &Arc<Track> {
    &self.track
  }

  pub(crate) fn into_parts(self) -> (Arc<Track>, Box<dyn AudioSource>) {
    (self.track, self.source)
  }
}

/// Frames held in memory. An optional error is raised after the last frame.
#[derive(Default)]
pub struct MemorySource {
  frames: VecDeque<Bytes>,
  failure: Option<String>,
}

impl MemorySource {
  pub fn new(frames: impl IntoIterator<Item = Bytes>) -> Self {
    Self {
      frames: frames.into_iter().collect(),
      failure: None,
    }
  }

  /// `count` frames of silence.
  pub fn silence(count: usize) -> Self {
    Self::new((0..count).map(|_| Bytes::from(vec![0u8; super::FRAME_SIZE])))
  }

  pub fn failing_after(mut self, message: impl Into<String>) -> Self {
    self.failure = Some(message.into());
    self
  }
}

#[async_trait]
impl AudioSource for MemorySource {
  async fn read_frame(&mut self) -> AnyResult<Option<Bytes>> {
    if let Some(frame) = self.frames.pop_front() {
      return Ok(Some(frame));
    }
    match self.failure.take() {
      Some(message) => Err(message.into()),
      None => Ok(None),
    }
  }
}
