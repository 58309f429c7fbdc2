//! The verification flow. It routes each inbound message through
//! route → verify ⇄ collect → respond.
//!
//! `collect` never blocks. It persists a checkpoint with `pending = collect`
//! and hands a prompt back to the host; the next message on the same thread
//! resumes at `verify`. State is written only when a turn responds or
//! suspends, so a failed turn leaves the previous checkpoint in place.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ClassifierFallback, FlowConfig};
use crate::conversation::ConversationState;
use crate::error::{Error, OracleKind};
use crate::responder::SpecialistResponder;
use crate::store::{Checkpoint, CheckpointStore, CustomerStore};
use crate::verification::classifier::QueryClassifier;
use crate::verification::extractor::EmailExtractor;
use crate::verification::retry::RetryPolicy;
use crate::verification::state::{Step, TurnOutcome};
use crate::verification::validator::{VerificationOutcome, validate_customer_email};

/// Longest conversation lifetime honoured.
const MAX_TTL: std::time::Duration = std::time::Duration::from_secs(365 * 24 * 3600);

/// Prompt emitted when the flow suspends for an email address.
pub const COLLECT_PROMPT: &str = "Please provide your email:";

/// Asked when the message held no email address.
pub const ASK_FOR_EMAIL: &str =
    "To access information about your account or orders, please provide your email address.";

pub fn welcome_message(name: &str) -> String {
    format!("✓ Verified! Welcome back, {name}.")
}

pub fn not_found_message(email: &str) -> String {
    format!("I couldn't find '{email}' in our system. Please check and try again.")
}

/// Bookkeeping for one turn.
#[derive(Default)]
struct Turn {
    steps: Vec<Step>,
    notices: Vec<String>,
}

type ThreadLocks = StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>;

/// A claim on one thread's turn lock. Dropping it removes the map entry once
/// no other claim remains, including when the turn future is cancelled.
struct ThreadClaim<'a> {
    locks: &'a ThreadLocks,
    thread_id: Uuid,
    lock: Option<Arc<Mutex<()>>>,
}

impl ThreadClaim<'_> {
    fn mutex(&self) -> Arc<Mutex<()>> {
        self.lock.clone().unwrap_or_default()
    }
}

impl Drop for ThreadClaim<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Release our reference under the map lock so the count below is exact.
        self.lock.take();
        if locks
            .get(&self.thread_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&self.thread_id);
        }
    }
}

/// Runs conversations through the verification state machine.
pub struct VerificationFlow {
    store: Arc<dyn CustomerStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    classifier: Arc<dyn QueryClassifier>,
    extractor: Arc<dyn EmailExtractor>,
    responder: Arc<dyn SpecialistResponder>,
    config: FlowConfig,
    retry: RetryPolicy,
    /// Per-thread turn locks. Entries are dropped when no turn holds them.
    locks: ThreadLocks,
}

impl VerificationFlow {
    pub fn new(
        store: Arc<dyn CustomerStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        classifier: Arc<dyn QueryClassifier>,
        extractor: Arc<dyn EmailExtractor>,
        responder: Arc<dyn SpecialistResponder>,
    ) -> Self {
        let config = FlowConfig::default();
        Self {
            store,
            checkpoints,
            classifier,
            extractor,
            responder,
            retry: RetryPolicy::from(&config.retry),
            config,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn with_config(mut self, config: FlowConfig) -> Self {
        self.retry = RetryPolicy::from(&config.retry);
        self.config = config;
        self
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Process one inbound customer message on `thread_id`.
    ///
    /// Turns on the same thread run one at a time; different threads run
    /// concurrently.
    pub async fn handle_message(&self, thread_id: Uuid, text: &str) -> Result<TurnOutcome, Error> {
        let claim = self.claim_thread(thread_id);
        let result = {
            let mutex = claim.mutex();
            let _guard = mutex.lock().await;
            self.run_turn(thread_id, text).await
        };
        drop(claim);

        if let Err(ref e) = result {
            warn!(thread_id = %thread_id, error = %e, retryable = e.is_retryable(), "Turn failed");
        }
        result
    }

    /// The live checkpoint for a thread. Expired checkpoints read as absent.
    pub async fn conversation(&self, thread_id: Uuid) -> Result<Option<Checkpoint>, Error> {
        let checkpoint = self.checkpoints.load_checkpoint(thread_id).await?;
        Ok(checkpoint.filter(|cp| !cp.is_expired(Utc::now())))
    }

    /// Forget a thread. Returns whether it existed.
    pub async fn reset(&self, thread_id: Uuid) -> Result<bool, Error> {
        Ok(self.checkpoints.delete_checkpoint(thread_id).await?)
    }

    /// Delete every expired checkpoint.
    pub async fn purge_expired(&self) -> Result<usize, Error> {
        Ok(self.checkpoints.purge_expired_checkpoints(Utc::now()).await?)
    }

    fn claim_thread(&self, thread_id: Uuid) -> ThreadClaim<'_> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        ThreadClaim {
            locks: &self.locks,
            thread_id,
            lock: Some(locks.entry(thread_id).or_default().clone()),
        }
    }

    async fn run_turn(&self, thread_id: Uuid, text: &str) -> Result<TurnOutcome, Error> {
        let now = Utc::now();
        let (mut state, created_at, entry) = match self.checkpoints.load_checkpoint(thread_id).await? {
            Some(cp) if cp.is_expired(now) => {
                info!(thread_id = %thread_id, expired_at = %cp.expires_at, "Checkpoint expired, starting fresh");
                (ConversationState::new(), now, Step::Route)
            }
            Some(cp) => {
                let entry = match cp.pending {
                    Some(Step::Collect) => Step::Verify,
                    _ => Step::Route,
                };
                (cp.state, cp.created_at, entry)
            }
            None => (ConversationState::new(), now, Step::Route),
        };

        state.push_user(text);
        debug!(thread_id = %thread_id, step = %entry, "Turn started");

        let mut turn = Turn::default();
        let mut step = entry;
        loop {
            turn.steps.push(step);
            let next = match step {
                Step::Route => self.route(thread_id, &state).await?,
                Step::Verify => self.verify(thread_id, &mut state, &mut turn).await?,
                Step::Collect => {
                    self.save(thread_id, state, Some(Step::Collect), created_at)
                        .await?;
                    info!(thread_id = %thread_id, step = %step, "Awaiting customer email");
                    return Ok(TurnOutcome::AwaitingInput {
                        prompt: COLLECT_PROMPT.to_string(),
                        messages: turn.notices,
                        steps: turn.steps,
                    });
                }
                Step::Respond => {
                    let reply = self.responder.respond(&state).await?;
                    state.push_assistant(reply.clone());
                    let customer_id = state.customer_id().map(str::to_string);
                    self.save(thread_id, state, None, created_at).await?;
                    info!(
                        thread_id = %thread_id,
                        step = %step,
                        customer_id = customer_id.as_deref().unwrap_or("-"),
                        "Responded"
                    );
                    return Ok(TurnOutcome::Responded {
                        reply,
                        customer_id,
                        messages: turn.notices,
                        steps: turn.steps,
                    });
                }
            };
            debug_assert!(step.can_transition_to(next), "{step} -> {next}");
            step = next;
        }
    }

    /// Decide whether the latest message needs a verified identity.
    async fn route(&self, thread_id: Uuid, state: &ConversationState) -> Result<Step, Error> {
        if state.is_verified() {
            debug!(thread_id = %thread_id, customer_id = state.customer_id().unwrap_or("-"), "Already verified");
            return Ok(Step::Respond);
        }

        let query = state
            .last_user_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let classifier = self.classifier.clone();
        let result = self
            .retry
            .run(OracleKind::Classifier, || {
                let classifier = classifier.clone();
                let query = query.clone();
                async move { classifier.classify(&query).await }
            })
            .await;

        match result {
            Ok(c) => {
                debug!(
                    thread_id = %thread_id,
                    requires_verification = c.requires_verification,
                    reasoning = %c.reasoning,
                    "Query classified"
                );
                Ok(if c.requires_verification {
                    Step::Verify
                } else {
                    Step::Respond
                })
            }
            Err(e) => match self.config.classifier_fallback {
                ClassifierFallback::Fail => Err(e.into()),
                ClassifierFallback::RequireVerification => {
                    warn!(thread_id = %thread_id, error = %e, "Classifier unavailable, requiring verification");
                    Ok(Step::Verify)
                }
            },
        }
    }

    /// Extract and validate an email, appending exactly one assistant message.
    async fn verify(
        &self,
        thread_id: Uuid,
        state: &mut ConversationState,
        turn: &mut Turn,
    ) -> Result<Step, Error> {
        if state.is_verified() {
            return Ok(Step::Respond);
        }

        let text = state
            .last_user_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let extractor = self.extractor.clone();
        let extraction = self
            .retry
            .run(OracleKind::Extractor, || {
                let extractor = extractor.clone();
                let text = text.clone();
                async move { extractor.extract(&text).await }
            })
            .await?;

        let (notice, next) = if extraction.is_empty() {
            (ASK_FOR_EMAIL.to_string(), Step::Collect)
        } else {
            match validate_customer_email(self.store.as_ref(), &extraction.email).await? {
                VerificationOutcome::Verified(info) => {
                    state.resolve_customer(info.customer_id.clone());
                    info!(
                        thread_id = %thread_id,
                        customer_id = %info.customer_id,
                        "Customer verified"
                    );
                    (welcome_message(&info.customer_name), Step::Respond)
                }
                VerificationOutcome::NotFound => {
                    debug!(thread_id = %thread_id, email = %extraction.email, "Email not found");
                    (not_found_message(&extraction.email), Step::Collect)
                }
            }
        };

        state.push_assistant(notice.clone());
        turn.notices.push(notice);
        Ok(next)
    }

    async fn save(
        &self,
        thread_id: Uuid,
        state: ConversationState,
        pending: Option<Step>,
        created_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.config.conversation_ttl.min(MAX_TTL))
            .unwrap_or_else(|_| chrono::Duration::days(365));
        let checkpoint = Checkpoint {
            thread_id,
            state,
            pending,
            prompt: pending.map(|_| COLLECT_PROMPT.to_string()),
            created_at,
            updated_at: now,
            expires_at: now + ttl,
        };
        self.checkpoints.save_checkpoint(&checkpoint).await?;
        Ok(())
    }
}
