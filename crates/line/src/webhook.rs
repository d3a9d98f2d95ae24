use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("webhook body is not a valid LINE payload: {0}")]
    InvalidBody(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookPayload {
    pub destination: Option<String>,
    pub events: Vec<LineEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineEvent {
    TextMessage(TextMessageEvent),
    /// Follows, stickers, images, postbacks and anything else without a text reply path.
    Unsupported { event_type: String },
}

impl LineEvent {
    pub fn event_type(&self) -> LineEventType {
        match self {
            Self::TextMessage(_) => LineEventType::TextMessage,
            Self::Unsupported { .. } => LineEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LineEventType {
    TextMessage,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessageEvent {
    pub reply_token: String,
    pub user_id: Option<String>,
    pub text: String,
    pub webhook_event_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    destination: Option<String>,
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    reply_token: Option<String>,
    webhook_event_id: Option<String>,
    source: Option<RawSource>,
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSource {
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    message_type: String,
    text: Option<String>,
}

/// Decodes a webhook body. Unknown event kinds become [`LineEvent::Unsupported`]
/// rather than errors; only a body that is not a LINE payload at all is rejected.
pub fn parse_webhook(body: &[u8]) -> Result<WebhookPayload, WebhookError> {
    let raw: RawPayload =
        serde_json::from_slice(body).map_err(|e| WebhookError::InvalidBody(e.to_string()))?;

    Ok(WebhookPayload {
        destination: raw.destination,
        events: raw.events.into_iter().map(decode_event).collect(),
    })
}

fn decode_event(raw: RawEvent) -> LineEvent {
    let Some(message) = raw.message else {
        return LineEvent::Unsupported { event_type: raw.event_type };
    };
    let event_type = format!("{}.{}", raw.event_type, message.message_type);

    match (raw.event_type.as_str(), message.message_type.as_str(), raw.reply_token, message.text)
    {
        ("message", "text", Some(reply_token), Some(text)) => {
            LineEvent::TextMessage(TextMessageEvent {
                reply_token,
                user_id: raw.source.and_then(|source| source.user_id),
                text,
                webhook_event_id: raw.webhook_event_id,
            })
        }
        // Standby-mode text messages carry no reply token and cannot be answered.
        _ => LineEvent::Unsupported { event_type },
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_webhook, LineEvent, LineEventType, TextMessageEvent, WebhookError};

    #[test]
    fn text_message_is_decoded() {
        let body = br#"{
            "destination": "Uxxxxxxxx",
            "events": [{
                "type": "message",
                "mode": "active",
                "timestamp": 1700000000000,
                "webhookEventId": "01HEVT",
                "deliveryContext": {"isRedelivery": false},
                "replyToken": "reply-token-1",
                "source": {"type": "user", "userId": "U123"},
                "message": {"id": "444", "type": "text", "text": "How much is the iPhone 15?"}
            }]
        }"#;

        let payload = parse_webhook(body).expect("parse");

        assert_eq!(payload.destination.as_deref(), Some("Uxxxxxxxx"));
        assert_eq!(
            payload.events,
            vec![LineEvent::TextMessage(TextMessageEvent {
                reply_token: "reply-token-1".to_string(),
                user_id: Some("U123".to_string()),
                text: "How much is the iPhone 15?".to_string(),
                webhook_event_id: Some("01HEVT".to_string()),
            })]
        );
    }

    #[test]
    fn non_text_events_are_unsupported() {
        let body = br#"{"events": [
            {"type": "follow", "replyToken": "t1", "source": {"type": "user", "userId": "U1"}},
            {"type": "message", "replyToken": "t2", "message": {"id": "1", "type": "sticker", "packageId": "1", "stickerId": "2"}}
        ]}"#;

        let payload = parse_webhook(body).expect("parse");

        assert_eq!(
            payload.events,
            vec![
                LineEvent::Unsupported { event_type: "follow".to_string() },
                LineEvent::Unsupported { event_type: "message.sticker".to_string() },
            ]
        );
        assert!(payload.events.iter().all(|e| e.event_type() == LineEventType::Unsupported));
    }

    #[test]
    fn text_without_reply_token_is_unsupported() {
        let body = br#"{"events": [{"type": "message", "mode": "standby", "message": {"id": "1", "type": "text", "text": "hi"}}]}"#;

        let payload = parse_webhook(body).expect("parse");

        assert_eq!(payload.events[0].event_type(), LineEventType::Unsupported);
    }

    #[test]
    fn verification_ping_has_no_events() {
        let payload = parse_webhook(br#"{"destination": "U0", "events": []}"#).expect("parse");
        assert!(payload.events.is_empty());
    }

    #[test]
    fn garbage_body_is_rejected() {
        assert!(matches!(parse_webhook(b"not json"), Err(WebhookError::InvalidBody(_))));
        assert!(matches!(parse_webhook(br#"{"events": [{"no_type": 1}]}"#), Err(WebhookError::InvalidBody(_))));
    }
}
