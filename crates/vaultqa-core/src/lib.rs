//! Core domain models and traits for VaultQA
//!
//! This crate provides the fundamental building blocks used across the
//! VaultQA service, including:
//! - Domain entities (vaults, notes, chunks)
//! - Result types and error handling
//! - The metadata store trait
//! - Shared value objects

pub mod error;
pub mod models;
pub mod traits;
pub mod values;

pub use error::{Result, VaultQaError};

/// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;
