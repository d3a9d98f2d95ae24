use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::llm::{LlmClient, LlmError, LlmRequest};

/// Replays canned completions in order and records every request it saw.
#[derive(Default)]
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlmClient {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<String, LlmError>>,
    {
        Self { responses: Mutex::new(responses.into_iter().collect()), requests: Mutex::default() }
    }

    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|reply| Ok(reply.into())))
    }

    pub async fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        self.requests.lock().await.push(request);
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Response("scripted responses exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::ScriptedLlmClient;
    use crate::llm::{LlmClient, LlmRequest, ResponseShape};

    #[tokio::test]
    async fn replays_then_reports_exhaustion() {
        let client = ScriptedLlmClient::replies(["first"]);
        let request = LlmRequest {
            system: String::new(),
            user: "hello".to_string(),
            shape: ResponseShape::FreeText,
        };

        assert_eq!(client.complete(request.clone()).await.expect("first"), "first");
        assert!(client.complete(request).await.is_err());
        assert_eq!(client.requests().await.len(), 2);
    }
}
