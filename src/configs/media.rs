use serde::{Deserialize, Serialize};

/// External tools used to resolve and decode tracks.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MediaConfig {
  #[serde(default = "default_ytdlp_path")]
  pub ytdlp_path: String,
  #[serde(default = "default_ffmpeg_path")]
  pub ffmpeg_path: String,
  /// yt-dlp format selector for the stream url.
  #[serde(default = "default_format")]
  pub format: String,
  #[serde(default = "default_search_limit")]
  pub search_limit: u32,
}

impl Default for MediaConfig {
  fn default() -> Self {
    Self {
      ytdlp_path: default_ytdlp_path(),
      ffmpeg_path: default_ffmpeg_path(),
      format: default_format(),
      search_limit: default_search_limit(),
    }
  }
}

fn default_ytdlp_path() -> String {
  "yt-dlp".to_string()
}

fn default_ffmpeg_path() -> String {
  "ffmpeg".to_string()
}

fn default_format() -> String {
  "bestaudio[ext=webm+acodec=opus+asr=48000]/bestaudio/best".to_string()
}

fn default_search_limit() -> u32 {
  10
}
