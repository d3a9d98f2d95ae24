use std::fmt::Write;
use std::sync::Arc;

use serde_json::{json, Value};

use shopkeep_core::domain::product::Product;

use crate::llm::{
    truncate_for_log, LlmClient, LlmError, LlmRequest, ResponseShape, MAX_LLM_OUTPUT_LOG_CHARS,
    MAX_PROMPT_LOG_CHARS,
};

/// Sent when the model answers with nothing.
pub const FALLBACK_REPLY: &str =
    "Sorry, I didn't understand your question. Please try asking again.";

pub(crate) const NO_DATA_MARKER: &str = "No relevant data found.";

const ANSWER_EXAMPLES: &[(&str, &str)] = &[
    ("asked for the price of iPhone 15 and the data has it", "iPhone 15 costs 35,000 baht."),
    (
        "asked about products in Laptops and the data has them",
        "In Laptops we have MacBook Air M3 (45,000 baht) and Dell XPS 15 (55,000 baht).",
    ),
    ("asked about stock", "We have 100 units of iPhone 15 in stock."),
    (
        "asked about something the data does not cover",
        "Sorry, I couldn't find information about that in our catalog right now.",
    ),
];

/// Second model call of a turn: writes the reply from the utterance and the lookup result.
#[derive(Clone)]
pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn synthesize(
        &self,
        utterance: &str,
        data: Option<&[Product]>,
    ) -> Result<String, LlmError> {
        let request = build_request(utterance, data);
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                event_name = "agent.answer.prompt",
                prompt = %truncate_for_log(&request.user, MAX_PROMPT_LOG_CHARS),
                "answer prompt built"
            );
        }

        let output = self.llm.complete(request).await?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                event_name = "agent.answer.output",
                llm_output = %truncate_for_log(&output, MAX_LLM_OUTPUT_LOG_CHARS),
                "answer model output received"
            );
        }

        let reply = output.trim();
        if reply.is_empty() {
            tracing::warn!(event_name = "agent.answer.empty", "model returned an empty answer");
            return Ok(FALLBACK_REPLY.to_string());
        }
        Ok(reply.to_string())
    }
}

pub fn build_request(utterance: &str, data: Option<&[Product]>) -> LlmRequest {
    let mut system = String::from(
        "You answer shoppers' questions about our product catalog.\n\
         Answer in natural, helpful language using only the catalog data you are given.\n\
         Never invent products, prices or stock figures that are not in the data.\n\
         If the data is not enough to answer, say politely that no related information was found.\n\
         Do not refuse or say nothing matched when the data lets you summarise an answer.\n\
         Reply in the same language as the question.\n\nExample answers:\n",
    );
    for (situation, answer) in ANSWER_EXAMPLES {
        let _ = writeln!(system, "- If the user {situation}: \"{answer}\"");
    }

    let user = format!(
        "The user asked: \"{utterance}\"\n\nCatalog data:\n{}\n\nAnswer:",
        render_data(data)
    );

    LlmRequest { system, user, shape: ResponseShape::FreeText }
}

/// Empty results and "no data" render the same way.
pub(crate) fn render_data(data: Option<&[Product]>) -> String {
    let records = match data {
        Some(records) if !records.is_empty() => records,
        _ => return NO_DATA_MARKER.to_string(),
    };

    let view: Vec<Value> = records
        .iter()
        .map(|product| {
            json!({
                "name": product.name,
                "price": product.price,
                "stock": product.stock,
                "category": product.category,
            })
        })
        .collect();

    serde_json::to_string_pretty(&view).unwrap_or_else(|_| NO_DATA_MARKER.to_string())
}
