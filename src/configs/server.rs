use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
  /// Shared secret clients present as the `auth` query parameter of the relay.
  #[serde(default = "default_password")]
  pub password: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      password: default_password(),
    }
  }
}

fn default_host() -> String {
  "0.0.0.0".to_string()
}

fn default_password() -> String {
  "youshallnotpass".to_string()
}

fn default_port() -> u16 {
  3000
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LoggingConfig {
  pub level: Option<String>,
  pub filters: Option<String>,
  pub file: Option<LogFileConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogFileConfig {
  pub path: String,
  #[serde(default = "default_max_lines")]
  pub max_lines: u32,
}

fn default_max_lines() -> u32 {
  10_000
}
