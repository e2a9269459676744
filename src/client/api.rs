use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::{
  client::{ClientError, queue::PlaybackSubmitter},
  common::types::{AnyResult, ChannelId, ClientId, GuildId},
  protocol::tracks::{SearchEntry, Track, TrackSource},
};

/// REST client for one bot's view of the service.
#[derive(Clone)]
pub struct VoiceLinkClient {
  http: reqwest::Client,
  base_url: String,
  client_id: ClientId,
}

#[derive(Deserialize)]
struct SearchResponse {
  search: Vec<SearchEntry>,
}

impl VoiceLinkClient {
  pub fn new(base_url: impl Into<String>, client_id: impl Into<ClientId>) -> Self {
    Self {
      http: reqwest::Client::new(),
      base_url: base_url.into().trim_end_matches('/').to_string(),
      client_id: client_id.into(),
    }
  }

  pub fn client_id(&self) -> &ClientId {
    &self.client_id
  }

  fn subscription_url(&self, guild_id: &GuildId, action: &str) -> String {
    format!(
      "{}/{}/{}/subscription{}",
      self.base_url, self.client_id, guild_id, action
    )
  }

  /// Passes `response` through when it carries `expected`, otherwise turns the
  /// service's error body into a [`ClientError::Status`].
  async fn expect(response: Response, expected: StatusCode) -> Result<Response, ClientError> {
    let status = response.status();
    if status == expected {
      return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
      .ok()
      .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
      .unwrap_or(body);
    Err(ClientError::Status {
      status: status.as_u16(),
      message,
    })
  }

  pub async fn join(&self, guild_id: &GuildId, channel_id: &ChannelId) -> Result<(), ClientError> {
    debug!("[{}] joining channel {}", guild_id, channel_id);
    let response = self
      .http
      .post(self.subscription_url(guild_id, ""))
      .json(&json!({ "channelId": channel_id }))
      .send()
      .await?;
    Self::expect(response, StatusCode::NO_CONTENT).await?;
    Ok(())
  }

  pub async fn leave(&self, guild_id: &GuildId) -> Result<(), ClientError> {
    debug!("[{}] leaving voice", guild_id);
    let response = self.http.delete(self.subscription_url(guild_id, "")).send().await?;
    Self::expect(response, StatusCode::NO_CONTENT).await?;
    Ok(())
  }

  pub async fn load_track(&self, source: &TrackSource) -> Result<Track, ClientError> {
    let response = self
      .http
      .post(format!("{}/load_track", self.base_url))
      .json(&json!({ "track": source }))
      .send()
      .await?;
    Ok(Self::expect(response, StatusCode::CREATED).await?.json().await?)
  }

  /// Replaces whatever the guild is playing with `source`.
  pub async fn queue(&self, guild_id: &GuildId, source: &TrackSource) -> Result<Track, ClientError> {
    let response = self
      .http
      .post(self.subscription_url(guild_id, "/queue"))
      .json(&json!({ "track": source }))
      .send()
      .await?;
    Ok(Self::expect(response, StatusCode::CREATED).await?.json().await?)
  }

  async fn control(&self, guild_id: &GuildId, action: &str) -> Result<(), ClientError> {
    let response = self.http.post(self.subscription_url(guild_id, action)).send().await?;
    Self::expect(response, StatusCode::NO_CONTENT).await?;
    Ok(())
  }

  pub async fn skip(&self, guild_id: &GuildId) -> Result<(), ClientError> {
    self.control(guild_id, "/skip").await
  }

  pub async fn pause(&self, guild_id: &GuildId) -> Result<(), ClientError> {
    self.control(guild_id, "/pause").await
  }

  pub async fn resume(&self, guild_id: &GuildId) -> Result<(), ClientError> {
    self.control(guild_id, "/resume").await
  }

  pub async fn search(&self, query: &str) -> Result<Vec<SearchEntry>, ClientError> {
    let response = self
      .http
      .post(format!("{}/search", self.base_url))
      .json(&json!({ "search": query }))
      .send()
      .await?;
    let body: SearchResponse = Self::expect(response, StatusCode::OK).await?.json().await?;
    Ok(body.search)
  }
}

#[async_trait]
impl PlaybackSubmitter for VoiceLinkClient {
  async fn submit(&self, guild_id: &GuildId, source: &TrackSource) -> AnyResult<Track> {
    Ok(self.queue(guild_id, source).await?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_subscription_urls() {
    let client = VoiceLinkClient::new("http://127.0.0.1:2333/", "99");
    assert_eq!(
      client.subscription_url(&"42".into(), ""),
      "http://127.0.0.1:2333/99/42/subscription"
    );
    assert_eq!(
      client.subscription_url(&"42".into(), "/queue"),
      "http://127.0.0.1:2333/99/42/subscription/queue"
    );
  }
}
