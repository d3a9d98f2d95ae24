use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::Instrument;

use shopkeep_core::flows::{
    TurnEvent, TurnTermination, TurnTracker, TurnTransition, TurnTransitionError,
};
use shopkeep_db::repositories::CatalogRepository;

use crate::answer::AnswerSynthesizer;
use crate::intent::IntentResolver;
use crate::llm::{LlmClient, LlmError};
use crate::lookup::CatalogLookup;

/// Sent whenever a turn fails for a reason the user cannot act on.
pub const GENERIC_APOLOGY: &str =
    "Sorry, something went wrong while processing your message. Please try again.";

/// Per-message metadata threaded into logs.
#[derive(Clone, Debug, Default)]
pub struct TurnContext {
    pub correlation_id: String,
    pub user_id: Option<String>,
}

impl TurnContext {
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self { correlation_id: correlation_id.into(), user_id: None }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Wall-clock milliseconds per stage. A stage that did not run stays `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StageTimings {
    pub resolve_ms: Option<u64>,
    pub dispatch_ms: Option<u64>,
    pub synthesize_ms: Option<u64>,
    pub total_ms: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub termination: TurnTermination,
    pub transitions: Vec<TurnTransition>,
    pub timings: StageTimings,
}

#[derive(Debug, thiserror::Error)]
enum TurnError {
    #[error("{stage} failed: {source}")]
    Llm { stage: &'static str, source: LlmError },
    #[error(transparent)]
    Transition(#[from] TurnTransitionError),
}

struct Pipeline {
    resolver: IntentResolver,
    lookup: CatalogLookup,
    synthesizer: AnswerSynthesizer,
}

/// Runs one message through resolve, dispatch and synthesize, producing exactly one reply.
///
/// Cheap to clone; every turn is independent and shares no mutable state.
#[derive(Clone)]
pub struct AgentRuntime {
    pipeline: Arc<Pipeline>,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, catalog: Arc<dyn CatalogRepository>) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                resolver: IntentResolver::new(llm.clone()),
                lookup: CatalogLookup::new(catalog),
                synthesizer: AnswerSynthesizer::new(llm),
            }),
        }
    }

    /// Never fails: model errors and panics inside the turn become [`GENERIC_APOLOGY`].
    pub async fn handle_message(&self, utterance: &str, context: &TurnContext) -> TurnOutcome {
        let started = Instant::now();
        let span = tracing::info_span!(
            "agent_turn",
            correlation_id = %context.correlation_id,
            user_id = context.user_id.as_deref().unwrap_or("-"),
        );

        let pipeline = self.pipeline.clone();
        let owned_utterance = utterance.to_string();
        let task = tokio::spawn(
            async move { pipeline.run(&owned_utterance).await }.instrument(span.clone()),
        );

        let mut outcome = match task.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                span.in_scope(|| {
                    tracing::error!(
                        event_name = "agent.turn.panicked",
                        correlation_id = %context.correlation_id,
                        error = %join_error,
                        "turn task aborted; replying with apology"
                    );
                });
                failed_outcome(TurnTracker::new(), StageTimings::default())
            }
        };
        outcome.timings.total_ms = elapsed_ms(started);

        span.in_scope(|| {
            tracing::info!(
                event_name = "agent.turn.completed",
                correlation_id = %context.correlation_id,
                termination = ?outcome.termination,
                resolve_ms = outcome.timings.resolve_ms,
                dispatch_ms = outcome.timings.dispatch_ms,
                synthesize_ms = outcome.timings.synthesize_ms,
                elapsed_ms = outcome.timings.total_ms,
                "turn completed"
            );
        });

        outcome
    }
}

impl Pipeline {
    async fn run(&self, utterance: &str) -> TurnOutcome {
        let mut tracker = TurnTracker::new();
        let mut timings = StageTimings::default();

        match self.run_stages(utterance, &mut tracker, &mut timings).await {
            Ok(reply) => TurnOutcome {
                reply,
                termination: tracker.termination().unwrap_or(TurnTermination::Answered),
                transitions: tracker.into_transitions(),
                timings,
            },
            Err(error) => {
                tracing::warn!(
                    event_name = "agent.turn.failed",
                    state = ?tracker.state(),
                    error = %error,
                    "turn failed; replying with apology"
                );
                failed_outcome(tracker, timings)
            }
        }
    }

    async fn run_stages(
        &self,
        utterance: &str,
        tracker: &mut TurnTracker,
        timings: &mut StageTimings,
    ) -> Result<String, TurnError> {
        let stage = Instant::now();
        let intent = self
            .resolver
            .resolve(utterance)
            .await
            .map_err(|source| TurnError::Llm { stage: "intent resolution", source })?;
        timings.resolve_ms = Some(elapsed_ms(stage));
        tracing::debug!(
            event_name = "agent.turn.intent",
            action = %intent.action,
            "intent resolved"
        );

        let data = if intent.is_unknown() {
            tracker.advance(TurnEvent::IntentUnresolved)?;
            None
        } else {
            tracker.advance(TurnEvent::IntentResolved)?;
            let stage = Instant::now();
            let result = self.lookup.dispatch(&intent).await;
            timings.dispatch_ms = Some(elapsed_ms(stage));

            match result {
                Ok(data) => {
                    tracker.advance(TurnEvent::LookupCompleted)?;
                    data
                }
                Err(lookup_error) => {
                    tracker.advance(TurnEvent::LookupFailed)?;
                    tracing::warn!(
                        event_name = "agent.turn.lookup_failed",
                        error = %lookup_error,
                        "catalog lookup failed; replying with error description"
                    );
                    return Ok(lookup_error.description);
                }
            }
        };

        let stage = Instant::now();
        let reply = self
            .synthesizer
            .synthesize(utterance, data.as_deref())
            .await
            .map_err(|source| TurnError::Llm { stage: "answer synthesis", source })?;
        timings.synthesize_ms = Some(elapsed_ms(stage));
        tracker.advance(TurnEvent::AnswerSynthesized)?;

        Ok(reply)
    }
}

fn failed_outcome(mut tracker: TurnTracker, timings: StageTimings) -> TurnOutcome {
    if let Err(error) = tracker.advance(TurnEvent::Failed) {
        tracing::warn!(error = %error, "turn was already terminal when marking it failed");
    }
    TurnOutcome {
        reply: GENERIC_APOLOGY.to_string(),
        termination: TurnTermination::Failed,
        transitions: tracker.into_transitions(),
        timings,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
