//! Evidence formatting for the chat prompt.

use crate::models::Candidate;
use std::fmt::Write;

/// Render the selected candidates, in score order, into the context block
/// handed to the chat model. The trailing instruction pins the citation
/// format the extractor parses back out.
pub fn format_context(candidates: &[Candidate]) -> String {
    let mut out = String::from("--- Context from notes ---\n\n");

    for (i, candidate) in candidates.iter().enumerate() {
        let _ = write!(
            out,
            "[Chunk {}]\n[Vault: {}] File: {}\nSection: {}\nContent: {}\n\n",
            i + 1,
            candidate.vault_name,
            candidate.rel_path,
            candidate.heading_path,
            candidate.text,
        );
    }

    out.push_str(
        "--- End Context ---\n\n\
         When citing sources, use the format '[File: filename.md, Section: section name]'\n\
         matching the exact filename and section name from the context above.\n",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultqa_core::{values::Score, Uuid};

    fn candidate(rel_path: &str, heading: &str, text: &str) -> Candidate {
        Candidate {
            chunk_id: Uuid::new_v4(),
            note_id: Uuid::new_v4(),
            vault_name: "personal".to_string(),
            rel_path: rel_path.to_string(),
            heading_path: heading.to_string(),
            chunk_index: 0,
            text: text.to_string(),
            vector_score: Score::clamped(0.9),
            lexical_score: Score::clamped(0.2),
            final_score: Score::clamped(0.69),
        }
    }

    #[test]
    fn formats_numbered_blocks_in_order() {
        let candidates = vec![
            candidate("projects/main.md", "# Overview", "Alpha ships in Q1."),
            candidate("notes/log.md", "# Log > ## March", "Beta slipped."),
        ];
        let context = format_context(&candidates);

        assert!(context.starts_with("--- Context from notes ---\n"));
        assert!(context.contains("[Chunk 1]\n[Vault: personal] File: projects/main.md\nSection: # Overview\nContent: Alpha ships in Q1.\n"));
        assert!(context.contains("[Chunk 2]\n[Vault: personal] File: notes/log.md\nSection: # Log > ## March\nContent: Beta slipped.\n"));
        assert!(context.contains("--- End Context ---"));
        assert!(context.contains("[File: filename.md, Section: section name]"));
        let chunk1 = context.find("[Chunk 1]").unwrap();
        let chunk2 = context.find("[Chunk 2]").unwrap();
        assert!(chunk1 < chunk2);
    }

    #[test]
    fn empty_selection_still_renders_frame() {
        let context = format_context(&[]);
        assert!(context.contains("--- Context from notes ---"));
        assert!(context.contains("--- End Context ---"));
    }
}
