//! TechHub support: customer verification and routing core.

pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod eval;
pub mod llm;
pub mod responder;
pub mod store;
pub mod verification;
