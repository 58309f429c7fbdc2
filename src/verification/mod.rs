//! Customer verification: classify, extract, validate, and the flow that
//! ties them together.

pub mod classifier;
pub mod extractor;
pub mod flow;
pub mod retry;
pub mod state;
pub mod validator;

pub use classifier::{KeywordClassifier, LlmQueryClassifier, QueryClassification, QueryClassifier};
pub use extractor::{EmailExtraction, EmailExtractor, LlmEmailExtractor, RegexEmailExtractor};
pub use flow::{ASK_FOR_EMAIL, COLLECT_PROMPT, VerificationFlow};
pub use retry::RetryPolicy;
pub use state::{Step, TurnOutcome};
pub use validator::{VerificationOutcome, validate_customer_email};
