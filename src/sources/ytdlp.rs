use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::{
  configs::MediaConfig,
  protocol::tracks::{SearchEntry, Track},
  sources::plugin::{ResolveError, TrackResolver},
};

/// Resolves tracks by shelling out to yt-dlp.
pub struct YtDlpResolver {
  path: String,
  format: String,
  search_limit: u32,
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
  artist: Option<String>,
  duration: Option<f64>,
  description: Option<String>,
  #[serde(default)]
  title: String,
  thumbnail: Option<String>,
  webpage_url: Option<String>,
  url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
  #[serde(default)]
  entries: Vec<VideoInfo>,
}

impl YtDlpResolver {
  pub fn new(config: &MediaConfig) -> Self {
    Self {
      path: config.ytdlp_path.clone(),
      format: config.format.clone(),
      search_limit: config.search_limit,
    }
  }

  async fn run(&self, args: &[&str]) -> Result<Vec<u8>, ResolveError> {
    debug!("running {} {:?}", self.path, args);
    let output = Command::new(&self.path)
      .args(args)
      .kill_on_drop(true)
      .output()
      .await
      .map_err(|source| ResolveError::Spawn {
        tool: self.path.clone(),
        source,
      })?;

    if !output.status.success() {
      return Err(ResolveError::Tool {
        tool: self.path.clone(),
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
      });
    }
    Ok(output.stdout)
  }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
  async fn resolve(&self, query: &str) -> Result<Track, ResolveError> {
    let info_args = ["--dump-json", "--no-playlist", "--default-search", "ytsearch", query];
    let stream_args = [
      "-g",
      "-f",
      self.format.as_str(),
      "--no-playlist",
      "--default-search",
      "ytsearch",
      query,
    ];
    let (info, stream) = tokio::try_join!(self.run(&info_args), self.run(&stream_args))?;

    let info = parse_info(&info)?;
    let stream_url = first_line(&stream).ok_or_else(|| ResolveError::NoStream(query.to_string()))?;
    Ok(into_track(info, stream_url, query))
  }

  async fn search(&self, query: &str) -> Result<Vec<SearchEntry>, ResolveError> {
    let query = query.trim();
    if query.is_empty() {
      return Err(ResolveError::EmptyQuery);
    }
    let target = format!("ytsearch{}:{}", self.search_limit, query);
    let output = self.run(&["--dump-single-json", "--flat-playlist", target.as_str()]).await?;
    parse_search(&output)
  }
}

fn parse_info(raw: &[u8]) -> Result<VideoInfo, ResolveError> {
  // A search target prints one object per line; the first one wins.
  let line = raw
    .split(|b| *b == b'\n')
    .find(|l| !l.iter().all(u8::is_ascii_whitespace))
    .unwrap_or(raw);
  Ok(serde_json::from_slice(line)?)
}

fn parse_search(raw: &[u8]) -> Result<Vec<SearchEntry>, ResolveError> {
  let result: SearchResult = serde_json::from_slice(raw)?;
  Ok(
    result
      .entries
      .into_iter()
      .map(|entry| SearchEntry {
        artist: entry.artist.unwrap_or_else(|| "Unknown".to_string()),
        duration: entry.duration.unwrap_or(0.0),
        description: entry.description.unwrap_or_else(|| "No description.".to_string()),
        title: entry.title,
        thumbnail: entry.thumbnail.unwrap_or_default(),
        url: entry.webpage_url.or(entry.url).unwrap_or_default(),
      })
      .collect(),
  )
}

fn first_line(raw: &[u8]) -> Option<String> {
  String::from_utf8_lossy(raw)
    .lines()
    .map(str::trim)
    .find(|l| !l.is_empty())
    .map(str::to_string)
}

fn into_track(info: VideoInfo, stream_url: String, query: &str) -> Track {
  Track {
    artist: info.artist,
    duration: info.duration.unwrap_or(0.0),
    description: info.description.unwrap_or_default(),
    title: info.title,
    thumbnail: info.thumbnail.unwrap_or_default(),
    url: info.webpage_url.unwrap_or_else(|| query.to_string()),
    stream_url,
  }
}
