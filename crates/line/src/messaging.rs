use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
#[cfg(any(test, feature = "test-support"))]
use tokio::sync::Mutex;

use shopkeep_core::config::LineConfig;

/// LINE rejects text messages longer than this many characters.
pub const MAX_TEXT_CHARS: usize = 5_000;

const REPLY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply request failed: {0}")]
    Http(String),
    #[error("reply rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Sends one reply for one reply token. Implementations never retry.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ReplyError>;
}

#[async_trait]
impl<T> ReplySender for Arc<T>
where
    T: ReplySender + ?Sized,
{
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ReplyError> {
        (**self).reply(reply_token, text).await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage; 1],
}

#[derive(Debug, Serialize)]
struct TextMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

/// Client for `POST /v2/bot/message/reply`.
pub struct LineReplyClient {
    client: reqwest::Client,
    endpoint: String,
    access_token: SecretString,
}

impl LineReplyClient {
    pub fn new(config: &LineConfig) -> Result<Self, ReplyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REPLY_TIMEOUT_SECS))
            .build()
            .map_err(|e| ReplyError::Http(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/v2/bot/message/reply", config.api_base_url.trim_end_matches('/')),
            access_token: config.channel_access_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReplySender for LineReplyClient {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ReplyError> {
        let body = ReplyRequest {
            reply_token,
            messages: [TextMessage { kind: "text", text: truncate_text(text) }],
        };
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.access_token.expose_secret()))
            .map_err(|e| ReplyError::Http(e.to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(AUTHORIZATION, bearer)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReplyError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReplyError::Rejected { status: status.as_u16(), body });
        }

        tracing::debug!(event_name = "line.reply.sent", "reply delivered");
        Ok(())
    }
}

/// Keeps every reply in memory, in send order.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct RecordingReplySender {
    sent: Mutex<Vec<(String, String)>>,
}

#[cfg(any(test, feature = "test-support"))]
impl RecordingReplySender {
    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().await.clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ReplySender for RecordingReplySender {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), ReplyError> {
        self.sent.lock().await.push((reply_token.to_string(), truncate_text(text)));
        Ok(())
    }
}

fn truncate_text(text: &str) -> String {
    text.chars().take(MAX_TEXT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use shopkeep_core::config::LineConfig;

    use super::{truncate_text, LineReplyClient, ReplyRequest, TextMessage, MAX_TEXT_CHARS};

    #[test]
    fn long_text_is_cut_at_the_character_limit() {
        let text = "ก".repeat(MAX_TEXT_CHARS + 10);

        let truncated = truncate_text(&text);

        assert_eq!(truncated.chars().count(), MAX_TEXT_CHARS);
        assert_eq!(truncate_text("short"), "short");
    }

    #[test]
    fn reply_body_matches_messaging_api_shape() {
        let body = ReplyRequest {
            reply_token: "rt-1",
            messages: [TextMessage { kind: "text", text: "hello".to_string() }],
        };

        let value = serde_json::to_value(&body).expect("serialize");

        assert_eq!(
            value,
            serde_json::json!({"replyToken": "rt-1", "messages": [{"type": "text", "text": "hello"}]})
        );
    }

    #[test]
    fn endpoint_is_built_from_api_base_url() {
        let config = LineConfig {
            channel_access_token: SecretString::from("token".to_string()),
            channel_secret: SecretString::from("secret".to_string()),
            api_base_url: "https://api.line.me/".to_string(),
        };

        let client = LineReplyClient::new(&config).expect("client");

        assert_eq!(client.endpoint(), "https://api.line.me/v2/bot/message/reply");
    }
}
