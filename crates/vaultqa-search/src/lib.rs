//! Retrieval policy, scoring, and citation matching for VaultQA
//!
//! Everything in this crate is pure: no I/O, no clocks. The service crate
//! feeds it search hits and model output; this crate decides how many
//! candidates to keep, how to score them, and which of the model's citations
//! resolve to evidence.

pub mod citations;
pub mod context;
pub mod models;
pub mod ranking;

pub use citations::{build_references, extract_citations};
pub use context::format_context;
pub use models::*;
pub use ranking::RetrievalPolicy;
