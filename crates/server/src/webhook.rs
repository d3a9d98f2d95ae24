//! `POST /callback`: the LINE webhook.
//!
//! The signature is checked against the raw body before anything is decoded.
//! Events of one delivery run concurrently; the response is sent once all of
//! them have replied (or failed to).

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use shopkeep_agent::{AgentRuntime, TurnContext};
use shopkeep_line::{
    parse_webhook, verify_signature, EventContext, EventDispatcher, EventHandlerError,
    HandlerResult, ReplySender, TextMessageEvent, TextMessageHandler, TextMessageService,
    SIGNATURE_HEADER,
};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Answers text messages with one pipeline turn.
pub struct AgentTextMessageService {
    runtime: AgentRuntime,
}

impl AgentTextMessageService {
    pub fn new(runtime: AgentRuntime) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl TextMessageService for AgentTextMessageService {
    async fn handle_text_message(
        &self,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<String>, EventHandlerError> {
        let mut turn = TurnContext::new(ctx.correlation_id.clone());
        if let Some(user_id) = &event.user_id {
            turn = turn.with_user(user_id.clone());
        }

        let outcome = self.runtime.handle_message(&event.text, &turn).await;
        Ok(Some(outcome.reply))
    }
}

pub fn agent_dispatcher<R>(runtime: AgentRuntime, replies: R) -> EventDispatcher
where
    R: ReplySender + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(TextMessageHandler::new(AgentTextMessageService::new(runtime), replies));
    dispatcher
}

#[derive(Clone)]
pub struct WebhookState {
    channel_secret: SecretString,
    dispatcher: Arc<EventDispatcher>,
}

impl WebhookState {
    pub fn new(channel_secret: SecretString, dispatcher: EventDispatcher) -> Self {
        Self { channel_secret, dispatcher: Arc::new(dispatcher) }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/callback", post(callback)).with_state(state)
}

pub async fn callback(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    if let Err(error) = verify_signature(state.channel_secret.expose_secret(), &body, signature) {
        warn!(
            event_name = "line.webhook.rejected",
            correlation_id = "unknown",
            error = %error,
            "webhook signature check failed"
        );
        return (StatusCode::BAD_REQUEST, "invalid signature");
    }

    let payload = match parse_webhook(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(
                event_name = "line.webhook.undecodable",
                correlation_id = "unknown",
                error = %error,
                "webhook body could not be decoded"
            );
            return (StatusCode::BAD_REQUEST, "invalid body");
        }
    };

    let delivery_id = Uuid::new_v4().to_string();
    info!(
        event_name = "line.webhook.received",
        correlation_id = %delivery_id,
        event_count = payload.events.len(),
        "webhook accepted"
    );

    let mut tasks = JoinSet::new();
    for (index, event) in payload.events.into_iter().enumerate() {
        let dispatcher = Arc::clone(&state.dispatcher);
        let ctx = EventContext::for_event(&event, format!("{delivery_id}-{index}"));
        tasks.spawn(async move {
            let result = dispatcher.dispatch(&event, &ctx).await;
            (ctx, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((ctx, Ok(result))) => log_result(&ctx, &result),
            Ok((ctx, Err(error))) => warn!(
                event_name = "line.event.failed",
                correlation_id = %ctx.correlation_id,
                error = %error,
                "event handler returned an error"
            ),
            Err(join_error) => error!(
                event_name = "line.event.aborted",
                correlation_id = %delivery_id,
                error = %join_error,
                "event task did not complete"
            ),
        }
    }

    (StatusCode::OK, "OK")
}

fn log_result(ctx: &EventContext, result: &HandlerResult) {
    debug!(
        event_name = "line.event.handled",
        correlation_id = %ctx.correlation_id,
        result = ?result,
        "event handled"
    );
}
