//! LINE Messaging API surface for shopkeep
//!
//! - **Signature** (`signature`) - `X-Line-Signature` verification (HMAC-SHA256, base64)
//! - **Webhook** (`webhook`) - decoding of webhook bodies into [`LineEvent`]s
//! - **Events** (`events`) - routing of decoded events to handlers
//! - **Messaging** (`messaging`) - reply API client
//!
//! # Architecture
//!
//! ```text
//! POST /callback → verify_signature → parse_webhook → EventDispatcher
//!                                                        ↓
//!                         ReplySender ← TextMessageService (agent runtime)
//! ```

pub mod events;
pub mod messaging;
pub mod signature;
pub mod webhook;

pub use events::{
    EventContext, EventDispatcher, EventHandler, EventHandlerError, HandlerResult,
    TextMessageHandler, TextMessageService,
};
#[cfg(feature = "test-support")]
pub use messaging::RecordingReplySender;
pub use messaging::{LineReplyClient, ReplyError, ReplySender, MAX_TEXT_CHARS};
pub use signature::{compute_signature, verify_signature, SignatureError, SIGNATURE_HEADER};
pub use webhook::{parse_webhook, LineEvent, LineEventType, TextMessageEvent, WebhookError, WebhookPayload};
