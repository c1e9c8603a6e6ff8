//! Chat model abstractions for VaultQA

pub mod models;
pub mod traits;

pub use models::ChatMessage;
pub use traits::ChatCompleter;
