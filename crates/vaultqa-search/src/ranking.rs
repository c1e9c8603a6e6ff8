//! Scoring policy for the retrieval engine.
//!
//! The constants here are operating points of the retrieval policy. They are
//! fixed at build time and deliberately not exposed as per-query knobs.

use crate::models::DetailLevel;
use std::collections::HashSet;

/// Question words that carry no retrieval signal.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "could",
    "did", "do", "does", "for", "from", "had", "has", "have", "how", "i",
    "if", "in", "into", "is", "it", "its", "me", "my", "of", "on", "or",
    "our", "should", "so", "than", "that", "the", "their", "then", "there",
    "these", "they", "this", "to", "was", "we", "were", "what", "when",
    "where", "which", "who", "why", "will", "with", "would", "you", "your",
];

/// Keywords that indicate a broad, survey-style question.
const BROAD_KEYWORDS: &[&str] = &[
    "overview", "summary", "summaries", "all", "everything", "compare",
    "comparison", "list", "recap", "broad", "topics", "outline",
];

/// Lowercased alphanumeric token runs.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Question tokens with stopwords removed.
pub fn meaningful_tokens(question: &str) -> Vec<String> {
    tokenize(question)
        .into_iter()
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn is_broad(question_tokens: &[String]) -> bool {
    question_tokens
        .iter()
        .any(|t| BROAD_KEYWORDS.contains(&t.as_str()))
}

/// Build-time retrieval policy: K bounds, pooling limits, score blending
/// weights, and gate thresholds.
#[derive(Debug, Clone)]
pub struct RetrievalPolicy {
    pub k_min: usize,
    pub k_max: usize,
    pub candidate_k_per_scope: usize,
    pub max_candidates: usize,
    pub rerank_keep: usize,
    pub vector_weight: f32,
    pub lexical_weight: f32,
    pub vector_floor: f32,
    pub final_floor: f32,
    pub lexical_clamp: f32,
    pub heading_bonus: f32,
    pub position_step: f32,
    pub position_floor: f32,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            k_min: 3,
            k_max: 8,
            candidate_k_per_scope: 15,
            max_candidates: 200,
            rerank_keep: 8,
            vector_weight: 0.7,
            lexical_weight: 0.3,
            vector_floor: 0.3,
            final_floor: 0.4,
            lexical_clamp: 0.4,
            heading_bonus: 0.1,
            position_step: 0.1,
            position_floor: 0.1,
        }
    }
}

impl RetrievalPolicy {
    /// Select K from the question and its context, clamped to
    /// `[k_min, k_max]`.
    pub fn auto_k(
        &self,
        question: &str,
        detail: DetailLevel,
        user_folders_given: bool,
    ) -> usize {
        let mut k: i64 = match detail {
            DetailLevel::Brief => 3,
            DetailLevel::Normal => 5,
            DetailLevel::Detailed => 8,
        };

        let tokens = tokenize(question);
        let meaningful: Vec<&String> = tokens
            .iter()
            .filter(|t| !STOPWORDS.contains(&t.as_str()))
            .collect();
        let unique: HashSet<&str> = meaningful.iter().map(|t| t.as_str()).collect();

        if meaningful.len() >= 12 || unique.len() >= 10 {
            k += 1;
        }
        if meaningful.len() <= 4 {
            k -= 1;
        }

        let broad = is_broad(&tokens);
        if broad {
            k += 1;
        }
        if question.matches('?').count() > 1 {
            k += 1;
        }
        if question.chars().count() > 200 {
            k += 1;
        }
        if user_folders_given && !broad {
            k -= 1;
        }

        k.clamp(self.k_min as i64, self.k_max as i64) as usize
    }

    /// Clamp an explicit user K into `[k_min, k_max]`; `0` means
    /// auto-select and passes through.
    pub fn clamp_user_k(&self, k: usize) -> usize {
        if k == 0 {
            0
        } else {
            k.clamp(self.k_min, self.k_max)
        }
    }

    /// Weight applied to the vector score of a hit from the
    /// `folder_index`-th folder scope.
    pub fn position_weight(&self, folder_index: usize) -> f32 {
        (1.0 - self.position_step * folder_index as f32).max(self.position_floor)
    }

    /// Lexical relevance of a chunk to the question, in
    /// `[0, lexical_clamp]`.
    ///
    /// Token-frequency base normalized by chunk length, plus a bonus per
    /// question token appearing in the heading path.
    pub fn lexical_score(&self, question: &str, text: &str, heading_path: &str) -> f32 {
        let question_tokens: HashSet<String> =
            meaningful_tokens(question).into_iter().collect();
        if question_tokens.is_empty() {
            return 0.0;
        }

        let chunk_tokens = tokenize(text);
        let matches: usize = question_tokens
            .iter()
            .map(|q| chunk_tokens.iter().filter(|t| *t == q).count())
            .sum();
        let base = (matches as f32 / (1.0 + chunk_tokens.len() as f32)) * 10.0;
        let mut score = base.clamp(0.0, self.lexical_clamp);

        let heading_tokens: HashSet<String> =
            tokenize(heading_path).into_iter().collect();
        let heading_hits = question_tokens
            .iter()
            .filter(|q| heading_tokens.contains(q.as_str()))
            .count();
        score += self.heading_bonus * heading_hits as f32;

        score.clamp(0.0, self.lexical_clamp)
    }

    /// Blend vector and lexical signals into the final score.
    pub fn blend(&self, vector: f32, lexical: f32) -> f32 {
        self.vector_weight * vector + self.lexical_weight * lexical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetrievalPolicy {
        RetrievalPolicy::default()
    }

    #[test]
    fn tokenize_splits_on_non_alphanumeric() {
        assert_eq!(
            tokenize("What's in projects/alpha-notes?"),
            vec!["what", "s", "in", "projects", "alpha", "notes"]
        );
    }

    #[test]
    fn auto_k_base_values_per_detail() {
        let p = policy();
        // Five meaningful tokens: no short-question or long-question nudges.
        let q = "project alpha shipping schedule details";
        assert_eq!(p.auto_k(q, DetailLevel::Brief, false), 3);
        assert_eq!(p.auto_k(q, DetailLevel::Normal, false), 5);
        assert_eq!(p.auto_k(q, DetailLevel::Detailed, false), 8);
    }

    #[test]
    fn auto_k_short_question_steps_down() {
        assert_eq!(policy().auto_k("status?", DetailLevel::Normal, false), 4);
    }

    #[test]
    fn auto_k_broad_keyword_steps_up() {
        let p = policy();
        let q = "overview of the quarterly planning process across projects teams";
        assert_eq!(p.auto_k(q, DetailLevel::Normal, false), 6);
        // Broad cancels the user-folder step-down.
        assert_eq!(p.auto_k(q, DetailLevel::Normal, true), 6);
    }

    #[test]
    fn auto_k_user_folders_step_down_when_not_broad() {
        let p = policy();
        let q = "project alpha shipping schedule details";
        assert_eq!(p.auto_k(q, DetailLevel::Normal, true), 4);
    }

    #[test]
    fn auto_k_multiple_question_marks_step_up() {
        let p = policy();
        let q = "when does alpha ship? who owns deployment? where are runbooks kept?";
        assert!(p.auto_k(q, DetailLevel::Normal, false) >= 6);
    }

    #[test]
    fn auto_k_always_within_bounds() {
        let p = policy();
        let questions = vec![
            String::new(),
            "?".to_string(),
            "hi".to_string(),
            "very long question with many distinct meaningful words ".repeat(10),
            "overview summary compare list everything all topics outline recap broad??"
                .to_string(),
        ];
        for q in &questions {
            for detail in [DetailLevel::Brief, DetailLevel::Normal, DetailLevel::Detailed] {
                for folders in [false, true] {
                    let k = p.auto_k(q, detail, folders);
                    assert!((3..=8).contains(&k), "k={} for {:?}", k, q);
                }
            }
        }
    }

    #[test]
    fn clamp_user_k_contract() {
        let p = policy();
        assert_eq!(p.clamp_user_k(0), 0);
        assert_eq!(p.clamp_user_k(1), 3);
        assert_eq!(p.clamp_user_k(5), 5);
        assert_eq!(p.clamp_user_k(50), 8);
    }

    #[test]
    fn position_weight_steps_and_floors() {
        let p = policy();
        assert!((p.position_weight(0) - 1.0).abs() < 1e-6);
        assert!((p.position_weight(3) - 0.7).abs() < 1e-6);
        assert!((p.position_weight(25) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn lexical_score_stays_clamped() {
        let p = policy();
        let inputs = [
            ("", "", ""),
            ("alpha", "alpha alpha alpha", "# Alpha"),
            ("alpha beta gamma", &"alpha ".repeat(500), "# Alpha > ## Beta"),
            ("the of and", "the of and", ""),
        ];
        for (q, text, heading) in inputs {
            let s = p.lexical_score(q, text, heading);
            assert!((0.0..=0.4).contains(&s), "score {} for {:?}", s, q);
        }
    }

    #[test]
    fn lexical_score_rewards_heading_hits() {
        let p = policy();
        let with_heading = p.lexical_score("deployment checklist", "unrelated text", "# Deployment");
        let without = p.lexical_score("deployment checklist", "unrelated text", "# Recipes");
        assert!(with_heading > without);
    }

    #[test]
    fn lexical_score_zero_for_stand_in_chunk() {
        // A candidate whose chunk row is missing gets empty text and scores
        // on the heading alone.
        let p = policy();
        assert_eq!(p.lexical_score("unmatched words", "", ""), 0.0);
    }

    #[test]
    fn blend_weights_sum_to_final() {
        let p = policy();
        let blended = p.blend(0.8, 0.4);
        assert!((blended - (0.7 * 0.8 + 0.3 * 0.4)).abs() < 1e-6);
    }
}
