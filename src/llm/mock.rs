//! Scripted provider for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};

/// Replays queued replies in order; repeats the last one when the queue runs dry.
pub(crate) struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: String,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    /// Always answers with `reply`.
    pub(crate) fn replying(reply: &str) -> Self {
        Self::scripted(Vec::new(), reply)
    }

    pub(crate) fn scripted(replies: Vec<Result<String, LlmError>>, fallback: &str) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: fallback.to_string(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with a transient request error.
    pub(crate) fn failing() -> Self {
        let err = || {
            Err(LlmError::RequestFailed {
                provider: "scripted".into(),
                reason: "connection refused".into(),
            })
        };
        Self::scripted((0..16).map(|_| err()).collect(), "")
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request, if any.
    pub(crate) fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().ok()?.last().cloned()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Ok(self.fallback.clone()));
        next.map(|content| CompletionResponse {
            content,
            input_tokens: 100,
            output_tokens: 20,
            finish_reason: FinishReason::Stop,
            response_id: None,
        })
    }
}
