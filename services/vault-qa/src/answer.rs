//! Answer synthesis.
//!
//! Formats the selected evidence, drives the chat model under a
//! cite-or-abstain contract, and resolves the citations it emits back into
//! references.

use crate::util::abort_on_cancel;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use vaultqa_core::Result;
use vaultqa_llm::{ChatCompleter, ChatMessage};
use vaultqa_search::{build_references, format_context, Candidate, Reference};

/// Fixed reply for a deliberate empty selection.
pub const ABSTAIN_ANSWER: &str =
    "I'm sorry, I couldn't find anything relevant in your notes to answer that.";

/// Low temperature discourages hallucinated citations.
const ANSWER_TEMPERATURE: f32 = 0.3;

const SYSTEM_PROMPT: &str = "\
You answer questions using only the note excerpts provided in the context. \
Cite a source inline for every major claim, using the exact format \
[File: filename.md, Section: section name] with the filename and section \
copied from the context. If the context does not contain the information \
needed to answer, say that the information is not available in the notes. \
End your answer with a \"Citations:\" block listing each source you used.";

#[derive(Debug, Clone)]
pub struct SynthesizedAnswer {
    pub answer: String,
    pub references: Vec<Reference>,
    /// True when the full-selection fallback was used because the answer
    /// cited nothing that matched.
    pub citation_fallback: bool,
}

pub struct AnswerSynthesizer {
    chat: Arc<dyn ChatCompleter>,
}

impl AnswerSynthesizer {
    pub fn new(chat: Arc<dyn ChatCompleter>) -> Self {
        Self { chat }
    }

    pub async fn synthesize(
        &self,
        question: &str,
        candidates: &[Candidate],
        cancel: &CancellationToken,
    ) -> Result<SynthesizedAnswer> {
        let context = format_context(candidates);
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!("{}\n\n{}", question, context)),
        ];

        let answer = abort_on_cancel(
            cancel,
            self.chat.complete(messages, ANSWER_TEMPERATURE, None),
        )
        .await?;

        let (references, citation_fallback) = build_references(&answer, candidates);
        if citation_fallback {
            warn!(
                candidates = candidates.len(),
                "no citations matched evidence, returning references for full selection"
            );
        }

        Ok(SynthesizedAnswer {
            answer,
            references,
            citation_fallback,
        })
    }
}
