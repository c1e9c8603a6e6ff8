//! VaultQA service library
//!
//! Exposes the indexing and query pipelines for the binary and for
//! integration tests.

pub mod answer;
pub mod application;
pub mod chunker;
pub mod config;
pub mod folder_selector;
pub mod indexing;
pub mod infrastructure;
pub mod retrieval;
pub mod scanner;
pub mod util;

pub use application::ServiceContainer;
pub use config::Config;
