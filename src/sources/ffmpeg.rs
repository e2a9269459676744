use std::process::Stdio;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::{
  io::AsyncRead,
  process::{Child, ChildStdout, Command},
};
use tokio_util::codec::{Decoder, FramedRead};

use crate::{
  common::types::AnyResult,
  configs::MediaConfig,
  player::{AudioSource, FRAME_SIZE},
  protocol::tracks::Track,
  sources::plugin::SourceOpener,
};

const RECONNECT_ARGUMENTS: [&str; 10] = [
  "-reconnect",
  "1",
  "-reconnect_streamed",
  "1",
  "-reconnect_on_network_error",
  "1",
  "-reconnect_on_http_error",
  "4xx,5xx",
  "-reconnect_delay_max",
  "30",
];

const PCM_ARGUMENTS: [&str; 10] = [
  "-analyzeduration",
  "0",
  "-loglevel",
  "0",
  "-f",
  "s16le",
  "-ar",
  "48000",
  "-ac",
  "2",
];

/// Splits a raw s16le byte stream into 20 ms frames. A short tail is padded
/// with silence.
#[derive(Debug, Default)]
pub struct PcmFrameCodec;

impl Decoder for PcmFrameCodec {
  type Item = Bytes;
  type Error = std::io::Error;

  fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, Self::Error> {
    if src.len() < FRAME_SIZE {
      src.reserve(FRAME_SIZE - src.len());
      return Ok(None);
    }
    Ok(Some(src.split_to(FRAME_SIZE).freeze()))
  }

  fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, Self::Error> {
    if let Some(frame) = self.decode(src)? {
      return Ok(Some(frame));
    }
    if src.is_empty() {
      return Ok(None);
    }
    let mut frame = src.split();
    frame.resize(FRAME_SIZE, 0);
    Ok(Some(frame.freeze()))
  }
}

/// PCM frames read from any byte stream.
pub struct PcmFrameReader<R> {
  frames: FramedRead<R, PcmFrameCodec>,
}

impl<R: AsyncRead + Unpin + Send> PcmFrameReader<R> {
  pub fn new(reader: R) -> Self {
    Self {
      frames: FramedRead::with_capacity(reader, PcmFrameCodec, FRAME_SIZE * 4),
    }
  }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> AudioSource for PcmFrameReader<R> {
  async fn read_frame(&mut self) -> AnyResult<Option<Bytes>> {
    match self.frames.next().await {
      Some(frame) => Ok(Some(frame?)),
      None => Ok(None),
    }
  }
}

/// Decoded output of one ffmpeg process. The process dies with the source.
struct FfmpegSource {
  _child: Child,
  reader: PcmFrameReader<ChildStdout>,
}

#[async_trait]
impl AudioSource for FfmpegSource {
  async fn read_frame(&mut self) -> AnyResult<Option<Bytes>> {
    self.reader.read_frame().await
  }
}

/// Opens tracks by decoding their stream url with ffmpeg.
pub struct FfmpegOpener {
  path: String,
}

impl FfmpegOpener {
  pub fn new(config: &MediaConfig) -> Self {
    Self {
      path: config.ffmpeg_path.clone(),
    }
  }

  fn arguments(stream_url: &str) -> Vec<&str> {
    let mut args = Vec::with_capacity(RECONNECT_ARGUMENTS.len() + PCM_ARGUMENTS.len() + 3);
    args.extend(RECONNECT_ARGUMENTS);
    args.extend(["-i", stream_url]);
    args.extend(PCM_ARGUMENTS);
    args.push("pipe:1");
    args
  }
}

#[async_trait]
impl SourceOpener for FfmpegOpener {
  async fn open(&self, track: &Track) -> AnyResult<Box<dyn AudioSource>> {
    if track.stream_url.is_empty() {
      return Err(format!("track '{}' has no stream url", track.title).into());
    }

    let mut child = Command::new(&self.path)
      .args(Self::arguments(&track.stream_url))
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::null())
      .kill_on_drop(true)
      .spawn()?;

    let stdout = child.stdout.take().ok_or("ffmpeg stdout was not captured")?;
    Ok(Box::new(FfmpegSource {
      _child: child,
      reader: PcmFrameReader::new(stdout),
    }))
  }
}
