use std::{
  fs::{self, File, OpenOptions},
  io::{self, BufRead, BufReader, Write},
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use tracing_subscriber::{
  EnvFilter,
  fmt::{self, time::LocalTime},
  prelude::*,
};

use crate::configs::{Config, LoggingConfig};

/// Builds the filter string `level[,filters]` from the logging section.
fn filter_directives(logging: Option<&LoggingConfig>) -> String {
  let level = logging.and_then(|l| l.level.as_deref()).unwrap_or("info");
  match logging.and_then(|l| l.filters.as_deref()) {
    Some(filters) if !filters.is_empty() => format!("{},{}", level, filters),
    _ => level.to_string(),
  }
}

pub fn init(config: &Config) {
  let directives = filter_directives(config.logging.as_ref());

  // RUST_LOG wins over the config file
  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

  let stdout_layer = fmt::layer()
    .with_timer(LocalTime::rfc_3339())
    .with_target(true)
    .with_thread_ids(true)
    .with_line_number(true)
    .with_file(false);

  let file_layer = config
    .logging
    .as_ref()
    .and_then(|l| l.file.as_ref())
    .map(|file| {
      if let Some(parent) = Path::new(&file.path).parent() {
        if let Err(e) = fs::create_dir_all(parent) {
          eprintln!("Failed to create log directory: {}", e);
        }
      }

      fmt::layer()
        .with_writer(CappedFileWriter::new(file.path.clone().into(), file.max_lines))
        .with_timer(LocalTime::rfc_3339())
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
    });

  tracing_subscriber::registry()
    .with(env_filter)
    .with(stdout_layer)
    .with(file_layer)
    .init();
}

/// Appends to a log file and trims it back to the newest `max_lines` lines
/// every time roughly a tenth of that budget has been written.
#[derive(Clone)]
struct CappedFileWriter {
  path: PathBuf,
  max_lines: u32,
  written: Arc<Mutex<u32>>,
}

impl CappedFileWriter {
  fn new(path: PathBuf, max_lines: u32) -> Self {
    Self {
      path,
      max_lines,
      written: Arc::new(Mutex::new(0)),
    }
  }

  fn trim(&self) -> io::Result<()> {
    if !self.path.exists() {
      return Ok(());
    }

    let lines: Vec<String> = BufReader::new(File::open(&self.path)?)
      .lines()
      .collect::<Result<_, _>>()?;

    let keep = self.max_lines as usize;
    if lines.len() > keep {
      let mut file = File::create(&self.path)?;
      for line in &lines[lines.len() - keep..] {
        writeln!(file, "{}", line)?;
      }
    }
    Ok(())
  }
}

impl io::Write for CappedFileWriter {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)?
      .write_all(buf)?;

    let mut written = self.written.lock().unwrap_or_else(|e| e.into_inner());
    *written += buf.iter().filter(|&&b| b == b'\n').count() as u32;

    if *written >= (self.max_lines / 10).max(50) {
      if let Err(e) = self.trim() {
        eprintln!("Failed to trim log file: {}", e);
      }
      *written = 0;
    }

    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> fmt::MakeWriter<'a> for CappedFileWriter {
  type Writer = Self;

  fn make_writer(&'a self) -> Self::Writer {
    self.clone()
  }
}
