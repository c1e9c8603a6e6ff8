//! Markdown chunking.
//!
//! Notes are parsed with pulldown-cmark and cut into passages at heading
//! boundaries, carrying a serialized heading breadcrumb. A second pass
//! enforces the code-point size bounds: same-heading neighbors merge,
//! undersized passages merge forward, oversized passages split at the best
//! available boundary.

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Size bounds for produced passages, measured in code points.
///
/// The default maximum targets roughly 450 tokens, keeping every passage
/// under a 512-token embedding context with headroom.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub min_chunk_size: usize,
    pub max_chunk_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: 50,
            max_chunk_size: 700,
        }
    }
}

/// A heading-delimited passage of a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    /// Heading breadcrumb, e.g. `"# A > ## B"`.
    pub heading_path: String,
    pub text: String,
}

/// Chunking result for one note.
#[derive(Debug, Clone)]
pub struct ChunkedNote {
    pub title: String,
    pub passages: Vec<Passage>,
}

pub struct MarkdownChunker {
    config: ChunkerConfig,
}

impl MarkdownChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunk a note's content. `file_name` is the note's filename, used for
    /// title fallback.
    pub fn chunk(&self, content: &str, file_name: &str) -> ChunkedNote {
        let title = extract_title(content, file_name);
        let raw = collect_passages(content, &title);
        let passages = self.enforce_size(raw);
        ChunkedNote { title, passages }
    }

    fn enforce_size(&self, passages: Vec<Passage>) -> Vec<Passage> {
        let min = self.config.min_chunk_size;
        let max = self.config.max_chunk_size;

        let merged = merge_same_heading(passages, max);
        let merged = merge_undersized(merged, min, max);
        let mut out = split_oversized(merged, max);

        // A sub-minimum tail has no next passage to merge into; fold it back
        // into its predecessor when that stays within bounds.
        if out.len() >= 2 {
            let tail_len = cp_len(&out[out.len() - 1].text);
            let prev_len = cp_len(&out[out.len() - 2].text);
            if tail_len < min && prev_len + 2 + tail_len <= max {
                if let Some(tail) = out.pop() {
                    if let Some(prev) = out.last_mut() {
                        prev.text.push_str("\n\n");
                        prev.text.push_str(&tail.text);
                    }
                }
            }
        }

        debug_assert!(!out.is_empty(), "collector always yields a passage");
        out
    }
}

fn cp_len(text: &str) -> usize {
    text.chars().count()
}

fn heading_level(level: HeadingLevel) -> usize {
    level as usize
}

/// First H1 text, else first H2 text, else the filename stem with each
/// space-delimited word's first letter uppercased.
fn extract_title(content: &str, file_name: &str) -> String {
    let parser = Parser::new_ext(content, Options::ENABLE_TABLES);
    let mut first_h2: Option<String> = None;
    let mut collecting: Option<(usize, String)> = None;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                let level = heading_level(level);
                if level <= 2 {
                    collecting = Some((level, String::new()));
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buf)) = &mut collecting {
                    buf.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, buf)) = collecting.take() {
                    let text = buf.trim().to_string();
                    if !text.is_empty() {
                        if level == 1 {
                            return text;
                        }
                        if first_h2.is_none() {
                            first_h2 = Some(text);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    first_h2.unwrap_or_else(|| title_from_filename(file_name))
}

fn title_from_filename(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    stem.split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Walk the document in order, cutting a new passage at every heading.
fn collect_passages(content: &str, title: &str) -> Vec<Passage> {
    let mut state = PassageCollector::new(format!("# {}", title));
    let parser = Parser::new_ext(content, Options::ENABLE_TABLES);

    for event in parser {
        state.on_event(event);
    }
    state.finish(content)
}

struct PassageCollector {
    passages: Vec<Passage>,
    heading_stack: Vec<(usize, String)>,
    heading_path: String,
    current: String,
    collecting_heading: Option<(usize, String)>,
    table_row: Vec<String>,
    cell: String,
    in_cell: bool,
    in_code_block: bool,
    code: String,
}

impl PassageCollector {
    fn new(synthesized_path: String) -> Self {
        Self {
            passages: Vec::new(),
            heading_stack: Vec::new(),
            heading_path: synthesized_path,
            current: String::new(),
            collecting_heading: None,
            table_row: Vec::new(),
            cell: String::new(),
            in_cell: false,
            in_code_block: false,
            code: String::new(),
        }
    }

    fn on_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                self.flush();
                self.collecting_heading = Some((heading_level(level), String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = self.collecting_heading.take() {
                    // Pop entries at this level or deeper, then descend.
                    while self
                        .heading_stack
                        .last()
                        .is_some_and(|(l, _)| *l >= level)
                    {
                        self.heading_stack.pop();
                    }
                    self.heading_stack.push((level, text.trim().to_string()));
                    self.heading_path = serialize_stack(&self.heading_stack);
                }
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.in_code_block = true;
                self.code.clear();
            }
            Event::End(TagEnd::CodeBlock) => {
                self.in_code_block = false;
                self.current.push_str(&self.code);
                if !self.current.ends_with('\n') {
                    self.current.push('\n');
                }
            }
            Event::Start(Tag::TableCell) => {
                self.in_cell = true;
                self.cell.clear();
            }
            Event::End(TagEnd::TableCell) => {
                self.in_cell = false;
                self.table_row.push(self.cell.trim().to_string());
            }
            Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => {
                if !self.table_row.is_empty() {
                    self.current.push_str(&self.table_row.join(" | "));
                    self.current.push('\n');
                    self.table_row.clear();
                }
            }
            Event::Text(text) | Event::Code(text) => self.push_text(&text),
            Event::SoftBreak | Event::HardBreak => self.push_text("\n"),
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::Item) => {
                if !self.current.ends_with('\n') {
                    self.current.push('\n');
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => self.push_text(&html),
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some((_, buf)) = &mut self.collecting_heading {
            buf.push_str(text);
        } else if self.in_cell {
            self.cell.push_str(text);
        } else if self.in_code_block {
            self.code.push_str(text);
        } else {
            self.current.push_str(text);
        }
    }

    fn flush(&mut self) {
        let text = self.current.trim();
        if !text.is_empty() {
            self.passages.push(Passage {
                heading_path: self.heading_path.clone(),
                text: text.to_string(),
            });
        }
        self.current.clear();
    }

    fn finish(mut self, content: &str) -> Vec<Passage> {
        self.flush();
        if self.passages.is_empty() {
            // Empty file, or markup that produced no text: one passage under
            // the synthesized heading whose text equals the file.
            self.passages.push(Passage {
                heading_path: self.heading_path.clone(),
                text: content.to_string(),
            });
        }
        self.passages
    }
}

fn serialize_stack(stack: &[(usize, String)]) -> String {
    stack
        .iter()
        .map(|(level, text)| format!("{} {}", "#".repeat(*level), text))
        .collect::<Vec<_>>()
        .join(" > ")
}

/// Merge consecutive passages with identical non-empty heading paths when
/// the result stays within the maximum.
fn merge_same_heading(passages: Vec<Passage>, max: usize) -> Vec<Passage> {
    let mut out: Vec<Passage> = Vec::with_capacity(passages.len());
    for passage in passages {
        if let Some(last) = out.last_mut() {
            if !last.heading_path.is_empty()
                && last.heading_path == passage.heading_path
                && cp_len(&last.text) + 2 + cp_len(&passage.text) <= max
            {
                last.text.push_str("\n\n");
                last.text.push_str(&passage.text);
                continue;
            }
        }
        out.push(passage);
    }
    out
}

/// Merge a sub-minimum passage into the next one when combined they stay
/// within the maximum.
fn merge_undersized(passages: Vec<Passage>, min: usize, max: usize) -> Vec<Passage> {
    let mut out: Vec<Passage> = Vec::with_capacity(passages.len());
    let mut iter = passages.into_iter().peekable();
    while let Some(mut passage) = iter.next() {
        while cp_len(&passage.text) < min {
            let fits = match iter.peek() {
                Some(next) => cp_len(&passage.text) + 2 + cp_len(&next.text) <= max,
                None => false,
            };
            if !fits {
                break;
            }
            if let Some(next) = iter.next() {
                passage.text.push_str("\n\n");
                passage.text.push_str(&next.text);
            }
        }
        out.push(passage);
    }
    out
}

/// Split passages exceeding the maximum, preserving the heading path.
fn split_oversized(passages: Vec<Passage>, max: usize) -> Vec<Passage> {
    let mut out = Vec::with_capacity(passages.len());
    for passage in passages {
        if cp_len(&passage.text) <= max {
            out.push(passage);
            continue;
        }
        for piece in split_text(&passage.text, max) {
            out.push(Passage {
                heading_path: passage.heading_path.clone(),
                text: piece,
            });
        }
    }
    out
}

fn split_text(text: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut start = 0;

    while chars.len() - start > max {
        let cut = find_cut(&chars[start..start + max]);
        let piece: String = chars[start..start + cut].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            parts.push(piece.to_string());
        }
        start += cut;
    }

    let rest: String = chars[start..].iter().collect();
    let rest = rest.trim();
    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

/// Best split position within the window: a blank line, then a newline, then
/// a sentence boundary, else the window end.
fn find_cut(window: &[char]) -> usize {
    for i in (1..window.len()).rev() {
        if window[i] == '\n' && window[i - 1] == '\n' {
            return i + 1;
        }
    }
    for i in (0..window.len()).rev() {
        if window[i] == '\n' {
            return i + 1;
        }
    }
    for i in (1..window.len()).rev() {
        if window[i] == ' ' && window[i - 1] == '.' {
            return i + 1;
        }
    }
    window.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> MarkdownChunker {
        MarkdownChunker::new(ChunkerConfig::default())
    }

    fn small_chunker() -> MarkdownChunker {
        MarkdownChunker::new(ChunkerConfig {
            min_chunk_size: 20,
            max_chunk_size: 120,
        })
    }

    #[test]
    fn title_prefers_h1() {
        let note = chunker().chunk("# Main Title\n\nBody text here.", "file.md");
        assert_eq!(note.title, "Main Title");
    }

    #[test]
    fn title_falls_back_to_h2() {
        let note = chunker().chunk("## Secondary\n\nBody.", "file.md");
        assert_eq!(note.title, "Secondary");
    }

    #[test]
    fn title_falls_back_to_filename() {
        let note = chunker().chunk("no headings at all", "weekly planning notes.md");
        assert_eq!(note.title, "Weekly Planning Notes");
    }

    #[test]
    fn pre_heading_content_gets_synthesized_path() {
        let content = "Intro paragraph before any heading.\n\n# First\n\nSection body.";
        let note = chunker().chunk(content, "intro.md");
        assert_eq!(note.passages[0].heading_path, "# First");
        assert!(note.passages[0].text.contains("Intro paragraph"));
    }

    #[test]
    fn heading_stack_builds_breadcrumbs() {
        let content = "# A\n\ncontent under a, long enough to stand alone as a passage body.\n\n\
                       ## B\n\ncontent under b, long enough to stand alone as a passage body.\n\n\
                       ### C\n\ncontent under c, long enough to stand alone as a passage body.\n\n\
                       ## D\n\ncontent under d, long enough to stand alone as a passage body.";
        let note = small_chunker().chunk(content, "tree.md");
        let paths: Vec<&str> = note
            .passages
            .iter()
            .map(|p| p.heading_path.as_str())
            .collect();
        assert!(paths.contains(&"# A"));
        assert!(paths.contains(&"# A > ## B"));
        assert!(paths.contains(&"# A > ## B > ### C"));
        // The second H2 pops B and C before pushing.
        assert!(paths.contains(&"# A > ## D"));
    }

    #[test]
    fn repeated_level_pops_and_rebuilds() {
        let content = (1..=5)
            .map(|i| format!("## Section {}\n\nbody text for section number {} here.\n", i, i))
            .collect::<String>();
        let note = small_chunker().chunk(&content, "flat.md");
        for (i, passage) in note.passages.iter().enumerate() {
            assert!(
                !passage.heading_path.contains('>'),
                "passage {} has nested path {}",
                i,
                passage.heading_path
            );
        }
    }

    #[test]
    fn table_rows_become_pipe_joined_lines() {
        let content = "# Data\n\n| Name | Value |\n| --- | --- |\n| alpha | 1 |\n| beta | 2 |\n";
        let note = chunker().chunk(content, "data.md");
        let text = &note.passages[0].text;
        assert!(text.contains("Name | Value"));
        assert!(text.contains("alpha | 1"));
        assert!(text.contains("beta | 2"));
    }

    #[test]
    fn code_blocks_keep_raw_lines() {
        let content = "# Code\n\n```rust\nfn main() {\n    println!(\"hi\");\n}\n```\n";
        let note = chunker().chunk(content, "code.md");
        let text = &note.passages[0].text;
        assert!(text.contains("fn main() {"));
        assert!(text.contains("    println!(\"hi\");"));
    }

    #[test]
    fn empty_file_yields_single_synthesized_chunk() {
        let note = chunker().chunk("", "empty note.md");
        assert_eq!(note.passages.len(), 1);
        assert_eq!(note.passages[0].heading_path, "# Empty Note");
        assert_eq!(note.passages[0].text, "");
    }

    #[test]
    fn size_bounds_hold_for_long_documents() {
        let config = ChunkerConfig {
            min_chunk_size: 20,
            max_chunk_size: 120,
        };
        let chunker = MarkdownChunker::new(config.clone());
        let content = (1..=6)
            .map(|i| {
                format!(
                    "## Part {}\n\n{}\n",
                    i,
                    "A sentence of filler text for sizing. ".repeat(i * 3)
                )
            })
            .collect::<String>();
        let note = chunker.chunk(&content, "long.md");
        assert!(note.passages.len() > 1);
        for passage in &note.passages {
            let len = cp_len(&passage.text);
            assert!(
                len <= config.max_chunk_size,
                "passage over max: {} chars",
                len
            );
        }
    }

    #[test]
    fn short_note_keeps_single_undersized_chunk() {
        let note = chunker().chunk("# T\n\ntiny.", "t.md");
        assert_eq!(note.passages.len(), 1);
        assert!(cp_len(&note.passages[0].text) < 50);
    }

    #[test]
    fn oversized_paragraph_splits_preserving_heading() {
        let content = format!(
            "# Big\n\n{}",
            "This is sentence one of a very long paragraph. ".repeat(60)
        );
        let note = chunker().chunk(&content, "big.md");
        assert!(note.passages.len() > 1);
        for passage in &note.passages {
            assert_eq!(passage.heading_path, "# Big");
            assert!(cp_len(&passage.text) <= 700);
        }
    }

    #[test]
    fn undersized_neighbor_merges_forward() {
        let content = "# A\n\nshort.\n\n# B\n\nThis neighboring section has enough text that \
                       the merged result is a comfortably mid-sized passage.";
        let note = chunker().chunk(content, "merge.md");
        assert_eq!(note.passages.len(), 1);
        assert!(note.passages[0].text.contains("short."));
        assert!(note.passages[0].text.contains("neighboring section"));
    }

    #[test]
    fn split_prefers_blank_line_boundary() {
        let text = format!("{}\n\n{}", "a".repeat(80), "b".repeat(80));
        let parts = split_text(&text, 120);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "a".repeat(80));
        assert_eq!(parts[1], "b".repeat(80));
    }

    #[test]
    fn split_falls_back_to_window_when_no_boundary() {
        let text = "x".repeat(250);
        let parts = split_text(&text, 100);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 100);
        assert_eq!(parts[1].len(), 100);
        assert_eq!(parts[2].len(), 50);
    }

    #[test]
    fn only_code_note_still_produces_bounded_chunks() {
        let content = format!("```\n{}\n```\n", "let x = 1;\n".repeat(100));
        let note = chunker().chunk(&content, "snippets.md");
        assert!(!note.passages.is_empty());
        for passage in &note.passages {
            assert!(cp_len(&passage.text) <= 700);
        }
    }
}
