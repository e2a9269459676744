/// A generic boxed error type.
pub type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// A convenient Result alias returning `AnyError`.
pub type AnyResult<T> = std::result::Result<T, AnyError>;

macro_rules! snowflake_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct $name(pub String);

    impl From<String> for $name {
      fn from(s: String) -> Self {
        Self(s)
      }
    }

    impl From<&str> for $name {
      fn from(s: &str) -> Self {
        Self(s.to_string())
      }
    }

    impl std::ops::Deref for $name {
      type Target = str;
      fn deref(&self) -> &Self::Target {
        &self.0
      }
    }

    impl std::fmt::Display for $name {
      fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
      }
    }
  };
}

snowflake_id!(
  /// Bot user id of a client process holding a relay channel.
  ClientId
);
snowflake_id!(
  /// Tenant (guild) a voice session is scoped to.
  GuildId
);
snowflake_id!(ChannelId);

/// Identifies one relay channel binding. A client that reconnects gets a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
  pub fn generate() -> Self {
    Self(uuid::Uuid::new_v4().to_string())
  }
}

impl std::fmt::Display for SessionId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub fn now_ms() -> u64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as u64
}
