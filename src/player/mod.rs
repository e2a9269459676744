pub mod audio_player;
pub mod resource;
pub mod state;

use std::time::Duration;

pub use audio_player::AudioPlayer;
pub use resource::{AudioResource, AudioSource, MemorySource};
pub use state::{PlayerStatus, TrackSignal, track_signal};

pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: usize = 2;
/// One frame of audio on the wire.
pub const FRAME_DURATION: Duration = Duration::from_millis(20);
/// 960 samples per channel, 16-bit, stereo.
pub const FRAME_SIZE: usize = (SAMPLE_RATE as usize / 50) * CHANNELS * 2;
