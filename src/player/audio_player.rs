use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, warn};

use crate::{
  common::types::GuildId,
  player::{
    FRAME_DURATION,
    resource::{AudioResource, AudioSource},
    state::{PlayerStatus, TrackSignal, track_signal},
  },
  protocol::{
    events::{TrackEvent, TrackEventKind, TrackEventSender},
    tracks::Track,
  },
  voice::connection::FrameSink,
};

struct PlayerShared {
  guild_id: GuildId,
  status: watch::Sender<PlayerStatus>,
  events: TrackEventSender,
  generation: AtomicU64,
}

impl PlayerShared {
  /// Applies `update` to the current status and emits the implied track signal.
  /// `generation` pins the update to one resource; stale pumps are ignored.
  /// A `quiet` transition emits nothing.
  fn transition(
    &self,
    generation: Option<u64>,
    quiet: bool,
    update: impl FnOnce(&PlayerStatus) -> Option<PlayerStatus>,
  ) -> bool {
    self.status.send_if_modified(|current| {
      if let Some(generation) = generation
        && self.generation.load(Ordering::Acquire) != generation
      {
        return false;
      }
      let Some(new) = update(current) else {
        return false;
      };
      let old = std::mem::replace(current, new);
      debug!("[{}] player {} -> {}", self.guild_id, old, current);

      if !quiet {
        match track_signal(&old, current) {
          Some(TrackSignal::Start(track)) => self.emit(track, TrackEventKind::Start),
          Some(TrackSignal::Finish(track)) => self.emit(track, TrackEventKind::Finish),
          None => {}
        }
      }
      true
    })
  }

  fn emit(&self, track: Arc<Track>, kind: TrackEventKind) {
    let event = TrackEvent::new(self.guild_id.clone(), track, kind);
    if self.events.send(event).is_err() {
      debug!("[{}] track event dropped, nobody is listening", self.guild_id);
    }
  }
}

/// Plays one resource at a time into the voice link of its guild.
///
/// Frames are paced at 20 ms. While no link is ready the player holds its
/// position in `AutoPaused` and picks up again once a link appears.
pub struct AudioPlayer {
  shared: Arc<PlayerShared>,
  sink: FrameSink,
  paused: watch::Sender<bool>,
  task: Mutex<Option<JoinHandle<()>>>,
}

impl AudioPlayer {
  pub fn new(guild_id: GuildId, events: TrackEventSender, sink: FrameSink) -> Self {
    let (status, _) = watch::channel(PlayerStatus::Idle);
    let (paused, _) = watch::channel(false);
    Self {
      shared: Arc::new(PlayerShared {
        guild_id,
        status,
        events,
        generation: AtomicU64::new(0),
      }),
      sink,
      paused,
      task: Mutex::new(None),
    }
  }

  pub fn status(&self) -> PlayerStatus {
    self.shared.status.borrow().clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<PlayerStatus> {
    self.shared.status.subscribe()
  }

  /// Replaces whatever is playing with `resource`.
  pub fn play(&self, resource: AudioResource) {
    let (track, source) = resource.into_parts();
    let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
    self.abort_task();
    self.paused.send_replace(false);

    let buffering = track.clone();
    self.shared.transition(None, false, move |_| Some(PlayerStatus::Buffering(buffering)));

    let task = tokio::spawn(pump(
      self.shared.clone(),
      generation,
      track,
      source,
      self.sink.clone(),
      self.paused.subscribe(),
    ));
    *self.task.lock() = Some(task);
  }

  /// Drops the current resource. Returns `false` if the player was idle.
  pub fn stop(&self) -> bool {
    self.shared.generation.fetch_add(1, Ordering::AcqRel);
    self.abort_task();
    self.paused.send_replace(false);
    self
      .shared
      .transition(None, false, |current| (!current.is_idle()).then_some(PlayerStatus::Idle))
  }

  /// Pauses playback. Only a playing (or auto-paused) player can pause.
  pub fn pause(&self) -> bool {
    let paused = self.shared.transition(None, false, |current| match current {
      PlayerStatus::Playing(t) | PlayerStatus::AutoPaused(t) => Some(PlayerStatus::Paused(t.clone())),
      _ => None,
    });
    if paused {
      self.paused.send_replace(true);
    }
    paused
  }

  /// Resumes a paused player.
  pub fn resume(&self) -> bool {
    let resumed = self.shared.transition(None, false, |current| match current {
      PlayerStatus::Paused(t) => Some(PlayerStatus::Playing(t.clone())),
      _ => None,
    });
    if resumed {
      self.paused.send_replace(false);
    }
    resumed
  }

  /// Reports a failure for `track` that happened before it reached the player.
  pub fn report_error(&self, track: Arc<Track>, message: impl Into<String>) {
    self.shared.emit(track, TrackEventKind::Error(message.into()));
  }

  fn abort_task(&self) {
    if let Some(task) = self.task.lock().take() {
      task.abort();
    }
  }
}

impl Drop for AudioPlayer {
  fn drop(&mut self) {
    self.abort_task();
  }
}

async fn pump(
  shared: Arc<PlayerShared>,
  generation: u64,
  track: Arc<Track>,
  mut source: Box<dyn AudioSource>,
  mut sink: FrameSink,
  mut paused: watch::Receiver<bool>,
) {
  let mut ticker = tokio::time::interval(FRAME_DURATION);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    let is_paused = *paused.borrow_and_update();
    if is_paused {
      let resumed = paused.wait_for(|p| !*p).await.is_ok();
      if !resumed {
        return;
      }
    }

    let link = sink.borrow_and_update().clone();
    let Some(link) = link else {
      shared.transition(Some(generation), false, |current| match current {
        PlayerStatus::Playing(t) => Some(PlayerStatus::AutoPaused(t.clone())),
        _ => None,
      });
      if sink.changed().await.is_err() {
        return;
      }
      continue;
    };

    ticker.tick().await;

    match source.read_frame().await {
      Ok(Some(frame)) => {
        if link.send_async(frame).await.is_err() {
          // The link went away under us; wait for the next one.
          continue;
        }
        shared.transition(Some(generation), false, |current| match current {
          PlayerStatus::Buffering(t) | PlayerStatus::AutoPaused(t) => Some(PlayerStatus::Playing(t.clone())),
          _ => None,
        });
      }
      Ok(None) => {
        shared.transition(Some(generation), false, |current| {
          (!current.is_idle()).then_some(PlayerStatus::Idle)
        });
        return;
      }
      Err(e) => {
        warn!("[{}] playback of '{}' failed: {}", shared.guild_id, track.title, e);
        let is_current = shared.transition(Some(generation), true, |current| {
          (!current.is_idle()).then_some(PlayerStatus::Idle)
        });
        if is_current {
          shared.emit(track, TrackEventKind::Error(e.to_string()));
        }
        return;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use bytes::Bytes;

  use super::*;
  use crate::player::{FRAME_SIZE, resource::MemorySource};

  struct Harness {
    player: AudioPlayer,
    events: flume::Receiver<TrackEvent>,
    link: watch::Sender<Option<flume::Sender<Bytes>>>,
    frames: flume::Receiver<Bytes>,
  }

  fn harness(with_link: bool) -> Harness {
    let (events_tx, events) = flume::unbounded();
    let (frames_tx, frames) = flume::unbounded();
    let (link, sink) = watch::channel(with_link.then_some(frames_tx.clone()));
    if !with_link {
      drop(frames_tx);
    }
    Harness {
      player: AudioPlayer::new("1".into(), events_tx, sink),
      events,
      link,
      frames,
    }
  }

  fn track(title: &str) -> Track {
    Track {
      title: title.into(),
      url: format!("https://example.com/{}", title),
      stream_url: format!("https://cdn.example.com/{}", title),
      ..Default::default()
    }
  }

  fn kinds(events: &flume::Receiver<TrackEvent>) -> Vec<(String, TrackEventKind)> {
    events.drain().map(|e| (e.track.title.clone(), e.kind)).collect()
  }

  #[tokio::test(start_paused = true)]
  async fn test_plays_to_the_end_and_finishes_once() {
    let h = harness(true);
    h.player.play(AudioResource::new(track("A"), Box::new(MemorySource::silence(5))));

    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(h.frames.drain().count(), 5);
    assert!(h.player.status().is_idle());
    assert_eq!(
      kinds(&h.events),
      vec![("A".into(), TrackEventKind::Start), ("A".into(), TrackEventKind::Finish)]
    );
    assert!(!h.player.stop());
    assert!(h.events.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_frames_are_paced() {
    let h = harness(true);
    h.player.play(AudioResource::new(track("A"), Box::new(MemorySource::silence(100))));

    tokio::time::sleep(Duration::from_millis(205)).await;
    let sent = h.frames.drain().collect::<Vec<_>>();
    assert!((10..=12).contains(&sent.len()), "sent {} frames", sent.len());
    assert!(sent.iter().all(|f| f.len() == FRAME_SIZE));
  }

  #[tokio::test(start_paused = true)]
  async fn test_error_skips_finish() {
    let h = harness(true);
    let source = MemorySource::silence(2).failing_after("stream reset");
    h.player.play(AudioResource::new(track("A"), Box::new(source)));

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(h.player.status().is_idle());
    assert_eq!(
      kinds(&h.events),
      vec![
        ("A".into(), TrackEventKind::Start),
        ("A".into(), TrackEventKind::Error("stream reset".into())),
      ]
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_pause_and_resume() {
    let h = harness(true);
    h.player.play(AudioResource::new(track("A"), Box::new(MemorySource::silence(100))));
    assert!(!h.player.pause(), "cannot pause before the first frame");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.player.pause());
    assert!(matches!(h.player.status(), PlayerStatus::Paused(_)));
    h.frames.drain().for_each(drop);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(h.frames.len() <= 1);
    assert!(!h.player.pause());

    assert!(h.player.resume());
    assert!(!h.player.resume());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.frames.len() >= 4);
    assert_eq!(kinds(&h.events), vec![("A".into(), TrackEventKind::Start)]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_waits_for_link_and_auto_pauses() {
    let h = harness(false);
    h.player.play(AudioResource::new(track("A"), Box::new(MemorySource::silence(100))));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(matches!(h.player.status(), PlayerStatus::Buffering(_)));
    assert!(h.events.is_empty());

    let (frames_tx, frames) = flume::unbounded();
    h.link.send_replace(Some(frames_tx));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(h.player.status(), PlayerStatus::Playing(_)));
    assert!(!frames.is_empty());

    h.link.send_replace(None);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(h.player.status(), PlayerStatus::AutoPaused(_)));

    let (frames_tx, _frames) = flume::unbounded();
    h.link.send_replace(Some(frames_tx));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(h.player.status(), PlayerStatus::Playing(_)));
    assert_eq!(kinds(&h.events), vec![("A".into(), TrackEventKind::Start)]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_stop_finishes_current_track() {
    let h = harness(true);
    h.player.play(AudioResource::new(track("A"), Box::new(MemorySource::silence(100))));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(h.player.stop());
    assert!(!h.player.stop());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
      kinds(&h.events),
      vec![("A".into(), TrackEventKind::Start), ("A".into(), TrackEventKind::Finish)]
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_replacing_does_not_finish_previous() {
    let h = harness(true);
    h.player.play(AudioResource::new(track("A"), Box::new(MemorySource::silence(100))));
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.player.play(AudioResource::new(track("B"), Box::new(MemorySource::silence(100))));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
      kinds(&h.events),
      vec![("A".into(), TrackEventKind::Start), ("B".into(), TrackEventKind::Start)]
    );
    assert_eq!(h.player.status().track().map(|t| t.title.clone()), Some("B".into()));
  }
}
