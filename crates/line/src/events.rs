use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::messaging::ReplySender;
use crate::webhook::{LineEvent, LineEventType, TextMessageEvent};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    /// Prefers LINE's `webhookEventId` so log lines can be matched to console redeliveries.
    pub fn for_event(event: &LineEvent, fallback: impl Into<String>) -> Self {
        let correlation_id = match event {
            LineEvent::TextMessage(TextMessageEvent { webhook_event_id: Some(id), .. }) => {
                id.clone()
            }
            _ => fallback.into(),
        };
        Self { correlation_id }
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Replied,
    /// The reply was produced but the reply API refused it. Not retried.
    ReplyFailed,
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("text message handler failure: {0}")]
    TextMessage(String),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> LineEventType;
    async fn handle(
        &self,
        event: &LineEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<LineEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        event: &LineEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let Some(handler) = self.handlers.get(&event.event_type()) else {
            if let LineEvent::Unsupported { event_type } = event {
                tracing::debug!(
                    event_name = "line.event.ignored",
                    correlation_id = %ctx.correlation_id,
                    event_type = %event_type,
                    "no handler for event"
                );
            }
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(event, ctx).await
    }
}

/// Produces the reply text for one inbound text message. `None` means stay silent.
#[async_trait]
pub trait TextMessageService: Send + Sync {
    async fn handle_text_message(
        &self,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<String>, EventHandlerError>;
}

/// Runs the service and sends its reply exactly once with the event's reply token.
pub struct TextMessageHandler<S, R> {
    service: S,
    replies: R,
}

impl<S, R> TextMessageHandler<S, R>
where
    S: TextMessageService,
    R: ReplySender,
{
    pub fn new(service: S, replies: R) -> Self {
        Self { service, replies }
    }
}

#[async_trait]
impl<S, R> EventHandler for TextMessageHandler<S, R>
where
    S: TextMessageService + 'static,
    R: ReplySender + 'static,
{
    fn event_type(&self) -> LineEventType {
        LineEventType::TextMessage
    }

    async fn handle(
        &self,
        event: &LineEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let LineEvent::TextMessage(message) = event else {
            return Ok(HandlerResult::Ignored);
        };

        let Some(reply) = self.service.handle_text_message(message, ctx).await? else {
            return Ok(HandlerResult::Processed);
        };

        match self.replies.reply(&message.reply_token, &reply).await {
            Ok(()) => Ok(HandlerResult::Replied),
            Err(error) => {
                tracing::warn!(
                    event_name = "line.reply.failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "reply could not be delivered"
                );
                Ok(HandlerResult::ReplyFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{
        EventContext, EventDispatcher, EventHandlerError, HandlerResult, TextMessageHandler,
        TextMessageService,
    };
    use crate::messaging::{RecordingReplySender, ReplyError, ReplySender};
    use crate::webhook::{LineEvent, TextMessageEvent};

    fn text_event(text: &str) -> LineEvent {
        LineEvent::TextMessage(TextMessageEvent {
            reply_token: "token-1".to_owned(),
            user_id: Some("U1".to_owned()),
            text: text.to_owned(),
            webhook_event_id: Some("evt-1".to_owned()),
        })
    }

    struct Upper;

    #[async_trait]
    impl TextMessageService for Upper {
        async fn handle_text_message(
            &self,
            event: &TextMessageEvent,
            _ctx: &EventContext,
        ) -> Result<Option<String>, EventHandlerError> {
            Ok(Some(event.text.to_uppercase()))
        }
    }

    struct Silent;

    #[async_trait]
    impl TextMessageService for Silent {
        async fn handle_text_message(
            &self,
            _event: &TextMessageEvent,
            _ctx: &EventContext,
        ) -> Result<Option<String>, EventHandlerError> {
            Ok(None)
        }
    }

    struct Refusing;

    #[async_trait]
    impl ReplySender for Refusing {
        async fn reply(&self, _reply_token: &str, _text: &str) -> Result<(), ReplyError> {
            Err(ReplyError::Rejected { status: 400, body: "Invalid reply token".to_owned() })
        }
    }

    #[tokio::test]
    async fn text_message_reply_is_sent_once_with_its_token() {
        let replies = Arc::new(RecordingReplySender::default());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(TextMessageHandler::new(Upper, replies.clone()));

        let result =
            dispatcher.dispatch(&text_event("hi"), &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Replied);
        assert_eq!(replies.sent().await, vec![("token-1".to_owned(), "HI".to_owned())]);
    }

    #[tokio::test]
    async fn unsupported_events_are_ignored() {
        let replies = Arc::new(RecordingReplySender::default());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(TextMessageHandler::new(Upper, replies.clone()));
        let event = LineEvent::Unsupported { event_type: "follow".to_owned() };

        let result = dispatcher.dispatch(&event, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
        assert!(replies.sent().await.is_empty());
    }

    #[tokio::test]
    async fn empty_dispatcher_ignores_text_messages() {
        let dispatcher = EventDispatcher::new();

        let result =
            dispatcher.dispatch(&text_event("hi"), &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn silent_service_sends_nothing() {
        let replies = Arc::new(RecordingReplySender::default());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(TextMessageHandler::new(Silent, replies.clone()));

        let result =
            dispatcher.dispatch(&text_event("hi"), &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Processed);
        assert!(replies.sent().await.is_empty());
    }

    #[tokio::test]
    async fn reply_failure_is_reported_not_raised() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(TextMessageHandler::new(Upper, Refusing));

        let result =
            dispatcher.dispatch(&text_event("hi"), &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::ReplyFailed);
    }

    #[test]
    fn context_prefers_webhook_event_id() {
        assert_eq!(
            EventContext::for_event(&text_event("x"), "fallback").correlation_id,
            "evt-1"
        );
        let other = LineEvent::Unsupported { event_type: "follow".to_owned() };
        assert_eq!(EventContext::for_event(&other, "fallback").correlation_id, "fallback");
    }
}
