//! # kestrel-tokens
//!
//! Token accounting used when the upstream stream does not report usage.
//!
//! - [`TokenCounter`]: the counting collaborator the orchestrator calls for
//!   output tokens
//! - [`EstimatingCounter`]: default character-class estimator
//! - [`shared_counter`]: process-wide estimator, built once on first use
//! - [`input_tokens_from_context_usage`]: context-usage percentage → tokens

#![deny(unsafe_code)]

mod counter;
mod usage;

pub use counter::{EstimatingCounter, TokenCounter, shared_counter};
pub use usage::input_tokens_from_context_usage;
