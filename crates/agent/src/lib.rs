//! Chat pipeline: two model calls around one catalog read.
//!
//! 1. **Intent resolution** (`intent`): utterance to a structured [`Intent`](shopkeep_core::Intent).
//! 2. **Lookup dispatch** (`lookup`): intent to at most one catalog read.
//! 3. **Answer synthesis** (`answer`): utterance plus data to the reply text.
//!
//! [`AgentRuntime`] drives the three stages through the turn state machine in
//! `shopkeep_core::flows` and guarantees exactly one reply per message.
//!
//! The model only phrases things. Prices, stock and product names always come
//! from the catalog.

pub mod answer;
pub mod gemini;
pub mod intent;
pub mod llm;
pub mod lookup;
pub mod openai;
pub mod runtime;
#[cfg(any(test, feature = "test-support"))]
pub mod scripted;

#[cfg(test)]
mod test_support;

pub use answer::{AnswerSynthesizer, FALLBACK_REPLY};
pub use intent::IntentResolver;
pub use llm::{client_from_config, LlmClient, LlmError, LlmRequest, ResponseShape};
pub use lookup::{CatalogLookup, LookupError};
pub use runtime::{AgentRuntime, StageTimings, TurnContext, TurnOutcome, GENERIC_APOLOGY};
#[cfg(feature = "test-support")]
pub use scripted::ScriptedLlmClient;
