use std::fmt::Write;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use shopkeep_core::domain::intent::{Intent, IntentAction, QueryParams};

use crate::llm::{
    truncate_for_log, LlmClient, LlmError, LlmRequest, ResponseShape, MAX_LLM_OUTPUT_LOG_CHARS,
    MAX_PROMPT_LOG_CHARS,
};

pub(crate) const CATALOG_SCHEMA_DESCRIPTION: &str = "\
The store keeps its product catalog as a list of product records.
Each product record has these fields:
- id (string): store-assigned product identifier
- name (string): product name (for example iPhone 15, MacBook Air M3, Keyboard)
- price (decimal): product price (for example 35000.00, 45000.00)
- stock (integer): units in stock (for example 100, 50, 200)
- category (string): product category (for example Smartphones, Laptops, Accessories)

The catalog answers general questions about products, prices, stock levels and categories.";

const INTENT_EXAMPLES: &[(&str, &str)] = &[
    ("What products do you have?", r#"{"action": "fetch_all_products"}"#),
    (
        "How much is the iPhone 15?",
        r#"{"action": "fetch_by_name", "query_params": {"name": "iPhone 15"}}"#,
    ),
    (
        "What do you have in Laptops?",
        r#"{"action": "fetch_by_category", "query_params": {"category": "Laptops"}}"#,
    ),
    ("Hello", r#"{"action": "unknown"}"#),
];

/// Why a model output could not be read as an intent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntentParseError {
    #[error("model output is empty")]
    Empty,
    #[error("model output is not valid JSON: {0}")]
    MalformedJson(String),
    #[error("model output is not a JSON object")]
    NotAnObject,
    #[error("`action` is missing or not a non-empty string")]
    MissingAction,
}

/// First model call of a turn: utterance in, structured [`Intent`] out.
#[derive(Clone)]
pub struct IntentResolver {
    llm: Arc<dyn LlmClient>,
}

impl IntentResolver {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Unreadable model output degrades to [`Intent::unknown`]; only model access
    /// failures are returned as errors.
    pub async fn resolve(&self, utterance: &str) -> Result<Intent, LlmError> {
        let request = build_request(utterance);
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                event_name = "agent.intent.prompt",
                prompt = %truncate_for_log(&request.user, MAX_PROMPT_LOG_CHARS),
                "intent prompt built"
            );
        }

        let output = self.llm.complete(request).await?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                event_name = "agent.intent.output",
                llm_output = %truncate_for_log(&output, MAX_LLM_OUTPUT_LOG_CHARS),
                "intent model output received"
            );
        }

        match parse_intent(&output) {
            Ok(intent) => Ok(intent),
            Err(error) => {
                tracing::warn!(
                    event_name = "agent.intent.fallback",
                    error = %error,
                    llm_output = %truncate_for_log(&output, MAX_LLM_OUTPUT_LOG_CHARS),
                    "intent output unreadable; falling back to unknown"
                );
                Ok(Intent::unknown())
            }
        }
    }
}

pub fn build_request(utterance: &str) -> LlmRequest {
    let mut system = String::with_capacity(2_048);
    system.push_str(
        "You are an assistant that understands shoppers' questions and decides which catalog \
         data is needed to answer them.\n\n",
    );
    system.push_str(CATALOG_SCHEMA_DESCRIPTION);
    system.push_str(
        "\n\nFrom the user's question, choose the single most suitable \"action\" for reading \
         the catalog, and give the \"query_params\" that action needs.\n\
         Respond with a JSON object only. Do not add any other text.\n\nPossible actions:\n",
    );
    for action in IntentAction::SUPPORTED.iter() {
        let _ = writeln!(system, "- \"{}\": {}", action, action_guidance(action));
    }
    system.push_str("\nExamples:\n");
    for (question, response) in INTENT_EXAMPLES {
        let _ = writeln!(system, "- For \"{question}\": {response}");
    }

    LlmRequest {
        system,
        user: format!("User question: \"{utterance}\"\n\nJSON response:"),
        shape: ResponseShape::Json,
    }
}

fn action_guidance(action: &IntentAction) -> &'static str {
    match action {
        IntentAction::FetchAllProducts => {
            "the user wants information about all products (no query_params)"
        }
        IntentAction::FetchByName => {
            "the user asks about one product by name (query_params: {\"name\": \"product name\"})"
        }
        IntentAction::FetchByCategory => {
            "the user asks about products in one category (query_params: {\"category\": \"category name\"})"
        }
        IntentAction::Unknown | IntentAction::Other(_) => {
            "the needed catalog data cannot be determined (no query_params)"
        }
    }
}

/// Parses one model output into an [`Intent`].
///
/// Accepts a bare JSON object, optionally wrapped in a Markdown code fence.
pub fn parse_intent(raw: &str) -> Result<Intent, IntentParseError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(IntentParseError::Empty);
    }

    let value: Value =
        serde_json::from_str(body).map_err(|e| IntentParseError::MalformedJson(e.to_string()))?;
    let object = value.as_object().ok_or(IntentParseError::NotAnObject)?;

    let action = object
        .get("action")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|action| !action.is_empty())
        .ok_or(IntentParseError::MissingAction)?;

    Ok(Intent::new(IntentAction::parse(action), object.get("query_params").and_then(coerce_params)))
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening fence line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn coerce_params(value: &Value) -> Option<QueryParams> {
    let object = value.as_object()?;
    let params: QueryParams = object
        .iter()
        .filter_map(|(key, value)| {
            let coerced = match value {
                Value::String(text) => text.trim().to_string(),
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                Value::Null | Value::Array(_) | Value::Object(_) => return None,
            };
            (!coerced.is_empty()).then(|| (key.clone(), coerced))
        })
        .collect();

    (!params.is_empty()).then_some(params)
}
