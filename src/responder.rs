//! Specialist responders: the step that actually answers the customer.
//!
//! The verification flow hands over a `ConversationState` whose
//! `customer_id` is either verified or absent. Responders read customer data
//! only for that id, through the read-only store queries.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::conversation::ConversationState;
use crate::error::{DatabaseError, Error, OracleError, OracleKind};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, Role};
use crate::store::{CustomerStore, Order};
use crate::verification::RetryPolicy;

/// Orders included in responder context.
const RECENT_ORDER_LIMIT: usize = 5;

const RESPOND_MAX_TOKENS: u32 = 1024;

/// Reply used when an order lookup is attempted without a verified customer.
pub const VERIFICATION_REQUIRED: &str =
    "Customer verification required. Please provide your email.";

/// Answers the conversation once routing and verification are done.
#[async_trait]
pub trait SpecialistResponder: Send + Sync {
    async fn respond(&self, state: &ConversationState) -> Result<String, Error>;
}

/// Recent orders for the verified customer in `state`, one line per order
/// with its items.
///
/// Returns `VERIFICATION_REQUIRED` when no customer is verified.
pub async fn customer_orders_summary(
    store: &dyn CustomerStore,
    state: &ConversationState,
    limit: usize,
) -> Result<String, DatabaseError> {
    let Some(customer_id) = state.customer_id() else {
        return Ok(VERIFICATION_REQUIRED.to_string());
    };

    let orders = store.get_customer_orders(customer_id, limit).await?;
    if orders.is_empty() {
        return Ok(format!("No orders found for customer {customer_id}."));
    }

    let mut out = String::from("Recent orders:\n");
    for order in &orders {
        write_order(store, order, &mut out).await?;
    }
    Ok(out)
}

/// Status and items of one order, if it belongs to the verified customer in
/// `state`. Orders of other customers read as absent.
pub async fn order_status_detail(
    store: &dyn CustomerStore,
    state: &ConversationState,
    order_id: &str,
) -> Result<Option<String>, DatabaseError> {
    let Some(customer_id) = state.customer_id() else {
        return Ok(None);
    };
    let Some(order) = store.get_order(order_id).await? else {
        return Ok(None);
    };
    if order.customer_id != customer_id {
        warn!(customer_id, order_id, "Order reference belongs to another customer");
        return Ok(None);
    }

    let mut out = String::from("Referenced order:\n");
    write_order(store, &order, &mut out).await?;
    Ok(Some(out))
}

async fn write_order(
    store: &dyn CustomerStore,
    order: &Order,
    out: &mut String,
) -> Result<(), DatabaseError> {
    let _ = writeln!(out, "- {}", order.summary_line());
    for item in store.get_order_items(&order.order_id).await? {
        let name = store
            .get_product(&item.product_id)
            .await?
            .map(|p| p.name)
            .unwrap_or_else(|| item.product_id.clone());
        let _ = writeln!(
            out,
            "    {} x {} @ ${:.2}",
            item.quantity, name, item.price_per_unit
        );
    }
    Ok(())
}

fn supervisor_system_prompt() -> &'static str {
    r#"You are a customer support agent for TechHub, an online electronics store.
Answer questions about orders, products, accounts, and store policies.
Use only the customer and order data provided in context. Never guess at order details.
Be helpful, accurate, concise, and specific."#
}

/// LLM-backed supervisor. Adds the verified customer's profile and orders,
/// plus any of their orders or catalog products mentioned by id, as system
/// context.
pub struct SupervisorResponder {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn CustomerStore>,
    retry: RetryPolicy,
    product_ref: Regex,
    order_ref: Regex,
}

impl SupervisorResponder {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn CustomerStore>,
        retry: RetryPolicy,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            llm,
            store,
            retry,
            product_ref: Regex::new(r"\bTECH-[A-Z]{3}-\d{3}\b")?,
            order_ref: Regex::new(r"\bORD-\d{4}-\d{4}\b")?,
        })
    }

    /// System context for this turn: customer profile, orders, mentioned products.
    async fn build_context(&self, state: &ConversationState) -> Result<Option<String>, DatabaseError> {
        let mut sections = Vec::new();

        if let Some(customer_id) = state.customer_id() {
            if let Some(customer) = self.store.get_customer(customer_id).await? {
                sections.push(format!(
                    "Verified customer: {} ({}), email {}, {} {}, segment {}.",
                    customer.name,
                    customer.customer_id,
                    customer.email,
                    customer.city,
                    customer.state,
                    customer.segment.as_str()
                ));
            }
            sections.push(
                customer_orders_summary(self.store.as_ref(), state, RECENT_ORDER_LIMIT).await?,
            );
        } else {
            sections.push("The customer is not verified. Do not discuss any account or order details.".into());
        }

        let last = state
            .last_user_message()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let orders = mentions(&self.order_ref, last);
        let products = mentions(&self.product_ref, last);

        for order_id in &orders {
            if let Some(detail) = order_status_detail(self.store.as_ref(), state, order_id).await? {
                sections.push(detail);
            }
        }
        for product_id in &products {
            if let Some(p) = self.store.get_product(product_id).await? {
                sections.push(format!(
                    "Product {}: {} ({}), ${:.2}, {}.",
                    p.product_id,
                    p.name,
                    p.category,
                    p.price,
                    if p.in_stock { "in stock" } else { "out of stock" }
                ));
            }
        }

        Ok((!sections.is_empty()).then(|| sections.join("\n\n")))
    }
}

/// Distinct ids matched by `pattern`, in order of appearance.
fn mentions(pattern: &Regex, text: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for m in pattern.find_iter(text) {
        if !ids.iter().any(|id| id == m.as_str()) {
            ids.push(m.as_str().to_string());
        }
    }
    ids
}

#[async_trait]
impl SpecialistResponder for SupervisorResponder {
    async fn respond(&self, state: &ConversationState) -> Result<String, Error> {
        let mut messages = vec![ChatMessage::system(supervisor_system_prompt())];
        if let Some(context) = self.build_context(state).await? {
            messages.push(ChatMessage::system(context));
        }

        // The transcript must end on the customer's turn; flow notices that
        // follow it (e.g. the verification welcome) become context instead.
        let transcript = state.to_chat_messages();
        let cut = transcript
            .iter()
            .rposition(|m| m.role == Role::User)
            .map_or(transcript.len(), |i| i + 1);
        let (turns, notices) = transcript.split_at(cut);
        if !notices.is_empty() {
            let shown: Vec<&str> = notices.iter().map(|m| m.content.as_str()).collect();
            messages.push(ChatMessage::system(format!(
                "Already shown to the customer: {}",
                shown.join(" ")
            )));
        }
        messages.extend_from_slice(turns);

        let llm = self.llm.clone();
        let reply = self
            .retry
            .run(OracleKind::Responder, || {
                let llm = llm.clone();
                let request =
                    CompletionRequest::new(messages.clone()).with_max_tokens(RESPOND_MAX_TOKENS);
                async move {
                    llm.complete(request)
                        .await
                        .map_err(|source| OracleError::Call {
                            oracle: OracleKind::Responder,
                            source,
                        })
                }
            })
            .await?;

        debug!(
            customer_id = state.customer_id().unwrap_or("-"),
            output_tokens = reply.output_tokens,
            "Supervisor replied"
        );
        Ok(reply.content.trim().to_string())
    }
}

/// Offline responder used when no LLM is configured.
///
/// Verified customers get their recent orders; everyone else gets a pointer
/// to general help.
pub struct TemplateResponder {
    store: Arc<dyn CustomerStore>,
}

impl TemplateResponder {
    pub fn new(store: Arc<dyn CustomerStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SpecialistResponder for TemplateResponder {
    async fn respond(&self, state: &ConversationState) -> Result<String, Error> {
        if state.customer_id().is_none() {
            return Ok("Thanks for contacting TechHub support! Our standard policies: \
                       returns are accepted within 30 days of delivery, and most orders \
                       ship within 2 business days. Ask about a specific order and I'll \
                       look it up once you've verified your email."
                .to_string());
        }

        let summary =
            customer_orders_summary(self.store.as_ref(), state, RECENT_ORDER_LIMIT).await?;
        info!(customer_id = state.customer_id().unwrap_or("-"), "Template reply with orders");
        Ok(format!("Here's what I found on your account.\n{summary}"))
    }
}
