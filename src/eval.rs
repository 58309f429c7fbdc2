//! Correctness evaluation (LLM-as-judge) for support answers.
//!
//! A judge model compares an answer against a reference answer and returns a
//! boolean verdict with its reasoning. `run_dataset` drives each case through
//! a fresh conversation and judges the final reply.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, OracleError, OracleKind};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, extract_json_object};
use crate::verification::{RetryPolicy, VerificationFlow};

const JUDGE_MAX_TOKENS: u32 = 512;

/// One dataset entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalCase {
    /// Customer messages sent in order on one thread.
    pub inputs: Vec<String>,
    /// The expected final answer.
    pub reference: String,
}

/// Evaluator result, in the `{key, score, comment}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalResult {
    pub key: String,
    pub score: bool,
    pub comment: String,
}

#[derive(Debug, Deserialize)]
struct CorrectnessVerdict {
    #[serde(default)]
    reasoning: String,
    score: bool,
}

fn correctness_prompt(input: &str, output: &str, reference: &str) -> String {
    format!(
        r#"You are an expert data labeler evaluating model outputs for correctness.

A correct answer is accurate and complete, has no factual errors, addresses all parts of
the question, and is logically consistent. Compare the output to the reference output.
Focus on correctness of information rather than style. Additional information not in the
reference is fine.

<input>
{input}
</input>

<output>
{output}
</output>

<reference_output>
{reference}
</reference_output>

Respond with ONLY a JSON object:
{{"reasoning": "<concise reasoning>", "score": true|false}}"#
    )
}

pub(crate) fn parse_verdict(raw: &str) -> Result<EvalResult, String> {
    let verdict: CorrectnessVerdict = serde_json::from_str(&extract_json_object(raw))
        .map_err(|e| format!("JSON parse error: {e}"))?;
    Ok(EvalResult {
        key: "correctness".into(),
        score: verdict.score,
        comment: verdict.reasoning,
    })
}

/// LLM judge for answer correctness.
pub struct CorrectnessEvaluator {
    llm: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl CorrectnessEvaluator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn evaluate(
        &self,
        input: &str,
        output: &str,
        reference: &str,
    ) -> Result<EvalResult, OracleError> {
        let prompt = correctness_prompt(input, output, reference);
        let llm = self.llm.clone();
        self.retry
            .run(OracleKind::Evaluator, || {
                let llm = llm.clone();
                let request = CompletionRequest::new(vec![ChatMessage::user(prompt.clone())])
                    .with_temperature(0.0)
                    .with_max_tokens(JUDGE_MAX_TOKENS);
                async move {
                    let response = llm.complete(request).await.map_err(|source| {
                        OracleError::Call {
                            oracle: OracleKind::Evaluator,
                            source,
                        }
                    })?;
                    parse_verdict(&response.content).map_err(|reason| OracleError::Malformed {
                        oracle: OracleKind::Evaluator,
                        reason,
                    })
                }
            })
            .await
    }
}

/// Outcome of one dataset case.
#[derive(Debug, Clone, Serialize)]
pub struct EvalRecord {
    pub case: EvalCase,
    /// Everything shown to the customer on the last turn: notices plus the
    /// reply, or plus the email prompt if verification never finished.
    pub output: String,
    pub result: EvalResult,
}

/// Aggregate over a dataset run.
#[derive(Debug, Clone, Serialize)]
pub struct EvalSummary {
    pub records: Vec<EvalRecord>,
    pub correct: usize,
}

impl EvalSummary {
    pub fn accuracy(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        self.correct as f64 / self.records.len() as f64
    }
}

/// Run every case on its own thread and judge the final output.
pub async fn run_dataset(
    flow: &VerificationFlow,
    evaluator: &CorrectnessEvaluator,
    cases: &[EvalCase],
) -> Result<EvalSummary, Error> {
    let mut records = Vec::with_capacity(cases.len());
    for case in cases {
        let thread_id = Uuid::new_v4();
        let mut output = String::new();
        for input in &case.inputs {
            output = flow
                .handle_message(thread_id, input)
                .await?
                .display_lines()
                .join("\n");
        }
        flow.reset(thread_id).await?;

        let transcript = case.inputs.join("\n");
        let result = evaluator
            .evaluate(&transcript, &output, &case.reference)
            .await?;
        if !result.score {
            warn!(input = %transcript, comment = %result.comment, "Case judged incorrect");
        }
        records.push(EvalRecord {
            case: case.clone(),
            output,
            result,
        });
    }

    let correct = records.iter().filter(|r| r.result.score).count();
    info!(cases = records.len(), correct, "Evaluation finished");
    Ok(EvalSummary { records, correct })
}
