use crate::models::ChatMessage;
use async_trait::async_trait;
use vaultqa_core::Result;

/// A chat-completion model.
///
/// The core imposes no cross-request ordering; implementations are stateless
/// from its perspective. `max_tokens: None` means no cap.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String>;

    fn model_name(&self) -> &str;
}
