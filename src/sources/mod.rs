pub mod ffmpeg;
pub mod plugin;
pub mod ytdlp;

pub use ffmpeg::{FfmpegOpener, PcmFrameReader};
pub use plugin::{ResolveError, SourceOpener, TrackResolver};
pub use ytdlp::YtDlpResolver;
