//! Citation extraction and matching.
//!
//! The chat model is instructed to cite evidence as
//! `[File: <name>, Section: <section>]`. Model output is messy: paths come
//! back abbreviated, sections lose their heading markers, separators drift.
//! The matchers here are deliberately forgiving, but every reference they
//! emit resolves to a selected candidate; citations that match nothing are
//! dropped.

use crate::models::{Candidate, Reference};
use std::collections::HashSet;

/// Extract `(file, section)` pairs from a model answer, preserving the
/// original strings, deduplicated in first-seen order.
pub fn extract_citations(answer: &str) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let mut cited = Vec::new();

    for line in answer.lines() {
        // Byte offsets survive because the mapping is ASCII-only.
        let lower: String = line.chars().map(|c| c.to_ascii_lowercase()).collect();
        if !lower.contains("[file:") || !lower.contains("section:") {
            continue;
        }

        let mut search_from = 0;
        while let Some(rel) = lower[search_from..].find("[file:") {
            let start = search_from + rel;
            let Some(end) = balanced_end(line, start) else {
                break;
            };
            search_from = end + 1;

            // Inside the brackets, past the "File:" marker.
            let inner = &line[start + "[file:".len()..end];
            if let Some(pair) = split_citation(inner) {
                if seen.insert(pair.clone()) {
                    cited.push(pair);
                }
            }
        }
    }

    cited
}

/// Index of the `]` closing the bracket at `start`, tracking nesting.
fn balanced_end(line: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in line[start..].char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split `"<file>, Section: <section>"` (or `"<file>: <section>"`) into its
/// parts.
fn split_citation(inner: &str) -> Option<(String, String)> {
    let lower: String = inner.chars().map(|c| c.to_ascii_lowercase()).collect();
    let (file, section) = if let Some(idx) = lower.find(", section:") {
        (&inner[..idx], &inner[idx + ", section:".len()..])
    } else if let Some(idx) = inner.find(':') {
        (&inner[..idx], &inner[idx + 1..])
    } else {
        return None;
    };

    let file = file.trim();
    let section = section.trim();
    if file.is_empty() || section.is_empty() {
        return None;
    }
    Some((file.to_string(), section.to_string()))
}

/// Resolve citations in `answer` against the selected candidates and build
/// the reference list.
///
/// Returns the references plus a flag that is true when the full-selection
/// fallback was used (no citation patterns, or none matched).
pub fn build_references(answer: &str, candidates: &[Candidate]) -> (Vec<Reference>, bool) {
    let cited = extract_citations(answer);

    if cited.is_empty() {
        return (all_references(candidates), true);
    }

    let mut matched = vec![false; candidates.len()];
    for (file, section) in &cited {
        // Each cited pair resolves to at most one candidate.
        let hit = candidates.iter().position(|c| {
            file_matches(&c.rel_path, file) && section_matches(&c.heading_path, section)
        });
        if let Some(i) = hit {
            matched[i] = true;
        } else {
            tracing::debug!(file = %file, section = %section, "citation matched no candidate");
        }
    }

    if !matched.iter().any(|m| *m) {
        return (all_references(candidates), true);
    }

    let references = candidates
        .iter()
        .zip(&matched)
        .filter(|(_, m)| **m)
        .map(|(c, _)| Reference::from_candidate(c))
        .collect();
    (references, false)
}

fn all_references(candidates: &[Candidate]) -> Vec<Reference> {
    candidates.iter().map(Reference::from_candidate).collect()
}

fn normalize_path(path: &str) -> String {
    let mut p = path.trim().replace('\\', "/").to_lowercase();
    while let Some(stripped) = p.strip_prefix("./") {
        p = stripped.to_string();
    }
    p
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Whether a cited file string refers to the candidate's path.
pub fn file_matches(chunk_path: &str, cited: &str) -> bool {
    let chunk = normalize_path(chunk_path);
    let cited = normalize_path(cited);
    if chunk.is_empty() || cited.is_empty() {
        return false;
    }

    if chunk == cited {
        return true;
    }

    if basename(&chunk) == basename(&cited) {
        let chunk_has_dir = chunk.contains('/');
        let cited_has_dir = cited.contains('/');
        if !chunk_has_dir || !cited_has_dir {
            return true;
        }
        if chunk.ends_with(&format!("/{}", cited)) {
            return true;
        }
    }

    let cited_parts: Vec<&str> = cited.split('/').collect();
    if cited_parts.len() >= 2 {
        let chunk_parts: Vec<&str> = chunk.split('/').collect();
        if chunk_parts.len() >= cited_parts.len()
            && chunk_parts[chunk_parts.len() - cited_parts.len()..] == cited_parts[..]
        {
            return true;
        }
    }

    chunk.ends_with(&format!("/{}", cited))
}

/// Heading markers stripped, lowercased, internal whitespace collapsed.
fn normalize_section(section: &str) -> String {
    section
        .chars()
        .filter(|c| *c != '#')
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn section_tokens(normalized: &str) -> HashSet<String> {
    normalized
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | '>' | '|'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Whether a cited section string refers to the candidate's heading path.
pub fn section_matches(heading_path: &str, cited: &str) -> bool {
    let heading = normalize_section(heading_path);
    let cited = normalize_section(cited);

    if heading == cited {
        return true;
    }

    if heading.chars().count() >= 3 && cited.chars().count() >= 3 {
        let (shorter, longer) = if heading.chars().count() <= cited.chars().count() {
            (&heading, &cited)
        } else {
            (&cited, &heading)
        };
        if longer.contains(shorter.as_str()) {
            let single_word = !shorter.contains(' ');
            let ratio =
                shorter.chars().count() as f32 / longer.chars().count().max(1) as f32;
            if single_word || ratio >= 0.6 {
                return true;
            }
        }
    }

    let heading_tokens = section_tokens(&heading);
    let cited_tokens = section_tokens(&cited);
    let common = heading_tokens.intersection(&cited_tokens).count();
    let smaller = heading_tokens.len().min(cited_tokens.len());
    common >= 2 && smaller > 0 && common as f32 >= 0.6 * smaller as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::format_context;
    use vaultqa_core::{values::Score, Uuid};

    fn candidate(rel_path: &str, heading: &str) -> Candidate {
        Candidate {
            chunk_id: Uuid::new_v4(),
            note_id: Uuid::new_v4(),
            vault_name: "personal".to_string(),
            rel_path: rel_path.to_string(),
            heading_path: heading.to_string(),
            chunk_index: 0,
            text: "text".to_string(),
            vector_score: Score::clamped(0.8),
            lexical_score: Score::clamped(0.3),
            final_score: Score::clamped(0.65),
        }
    }

    #[test]
    fn extracts_bracket_pairs() {
        let answer = "Alpha ships in Q1 [File: projects/main.md, Section: # Overview].\n\
                      Citations:\n\
                      [File: projects/main.md, Section: # Overview]";
        let cited = extract_citations(answer);
        assert_eq!(
            cited,
            vec![("projects/main.md".to_string(), "# Overview".to_string())]
        );
    }

    #[test]
    fn extraction_is_case_insensitive_on_markers() {
        let cited = extract_citations("[file: a.md, SECTION: Goals]");
        assert_eq!(cited, vec![("a.md".to_string(), "Goals".to_string())]);
    }

    #[test]
    fn extraction_falls_back_to_first_colon() {
        let cited = extract_citations("see [File: a.md: Goals] and Section: above");
        assert_eq!(cited, vec![("a.md".to_string(), "Goals".to_string())]);
    }

    #[test]
    fn extraction_ignores_lines_without_both_markers() {
        assert!(extract_citations("[File: a.md] alone").is_empty());
        assert!(extract_citations("Section: Goals alone").is_empty());
    }

    #[test]
    fn citation_matching_is_reflexive() {
        // A citation built verbatim from a chunk's own path and heading path
        // must match that chunk.
        let cases = [
            ("projects/main.md", "# Overview"),
            ("notes/daily/2026-01-05.md", "# Log > ## Morning"),
            ("root.md", "# Root"),
        ];
        for (path, heading) in cases {
            assert!(file_matches(path, path), "file {}", path);
            assert!(section_matches(heading, heading), "section {}", heading);
        }
    }

    #[test]
    fn file_match_accepts_basename_only_citation() {
        assert!(file_matches("projects/main.md", "main.md"));
        assert!(!file_matches("projects/main.md", "other.md"));
    }

    #[test]
    fn file_match_accepts_trailing_components() {
        assert!(file_matches("a/b/c/notes.md", "c/notes.md"));
        assert!(file_matches("a/b/c/notes.md", "b/c/notes.md"));
        assert!(!file_matches("a/b/c/notes.md", "x/notes.md"));
    }

    #[test]
    fn file_match_rejects_non_component_suffix() {
        assert!(!file_matches("my-notes.md", "s.md"));
    }

    #[test]
    fn file_match_normalizes_separators_and_case() {
        assert!(file_matches("Projects/Main.md", "projects\\main.md"));
    }

    #[test]
    fn section_match_strips_heading_markers() {
        assert!(section_matches("# Overview", "Overview"));
        assert!(section_matches("# A > ## B", "A > B"));
    }

    #[test]
    fn section_match_accepts_contained_single_word() {
        assert!(section_matches("# Deployment Checklist", "Deployment"));
    }

    #[test]
    fn section_match_rejects_short_fragments() {
        assert!(!section_matches("# Deployment Checklist", "De"));
    }

    #[test]
    fn section_match_token_overlap() {
        assert!(section_matches("# Release Goals > ## 2026 Planning", "Release Planning Goals"));
        assert!(!section_matches("# Release Goals", "Grocery List"));
    }

    #[test]
    fn references_round_trip_through_context_format() {
        // An answer that cites every chunk exactly as formatted yields
        // references that are a permutation of the selection.
        let candidates = vec![
            candidate("projects/main.md", "# Overview"),
            candidate("notes/log.md", "# Log > ## March"),
        ];
        let _context = format_context(&candidates);
        let answer = "Covered. [File: notes/log.md, Section: # Log > ## March]\n\
                      [File: projects/main.md, Section: # Overview]";
        let (refs, fallback) = build_references(answer, &candidates);
        assert!(!fallback);
        let expected: Vec<Reference> =
            candidates.iter().map(Reference::from_candidate).collect();
        assert_eq!(refs.len(), expected.len());
        for r in &expected {
            assert!(refs.contains(r));
        }
    }

    #[test]
    fn unmatched_citation_is_dropped_others_survive() {
        let candidates = vec![candidate("projects/main.md", "# Overview")];
        let answer = "[File: projects/main.md, Section: # Overview]\n\
                      [File: elsewhere.md, Section: # Nothing]";
        let (refs, fallback) = build_references(answer, &candidates);
        assert!(!fallback);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].rel_path, "projects/main.md");
    }

    #[test]
    fn no_citations_falls_back_to_full_selection() {
        let candidates = vec![
            candidate("a.md", "# A"),
            candidate("b.md", "# B"),
        ];
        let (refs, fallback) = build_references("Q1.", &candidates);
        assert!(fallback);
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn all_unmatched_citations_fall_back_to_full_selection() {
        let candidates = vec![candidate("a.md", "# A")];
        let answer = "[File: missing.md, Section: # Gone]";
        let (refs, fallback) = build_references(answer, &candidates);
        assert!(fallback);
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn duplicate_citations_yield_one_reference() {
        let candidates = vec![candidate("a.md", "# A > ## Sub")];
        let answer = "[File: a.md, Section: # A > ## Sub]\n\
                      [File: a.md, Section: Sub]";
        let (refs, fallback) = build_references(answer, &candidates);
        assert!(!fallback);
        assert_eq!(refs.len(), 1);
    }
}
