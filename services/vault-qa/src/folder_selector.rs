//! Folder selection for retrieval scoping.
//!
//! Combines folders the user asked for with a language-model ranking of the
//! rest. The ranker is a hint, not a gate: garbage output, an empty reply,
//! or a transport failure all degrade to searching every folder.

use crate::util::abort_on_cancel;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vaultqa_core::{values::split_folder_key, Result};
use vaultqa_llm::{ChatCompleter, ChatMessage};

const RANKER_TEMPERATURE: f32 = 0.0;

/// Ordered folder choice for one query.
#[derive(Debug, Clone, Default)]
pub struct FolderSelection {
    /// Id-qualified `"<vault_id>/<folder>"` keys, user picks first.
    pub selected: Vec<String>,
    pub available: Vec<String>,
}

pub struct FolderSelector {
    chat: Arc<dyn ChatCompleter>,
}

impl FolderSelector {
    pub fn new(chat: Arc<dyn ChatCompleter>) -> Self {
        Self { chat }
    }

    /// Choose an ordered subset of `available` folders for the question.
    ///
    /// `vault_names` maps vault ids to their display names for the
    /// name-qualified projection shown to the user and the ranker.
    pub async fn select(
        &self,
        question: &str,
        available: &[String],
        user_folders: &[String],
        vault_names: &HashMap<i64, String>,
        cancel: &CancellationToken,
    ) -> Result<FolderSelection> {
        let user_picked = match_user_folders(user_folders, available, vault_names);

        let remaining: Vec<&String> = available
            .iter()
            .filter(|a| !user_picked.contains(*a))
            .collect();

        let ranked = if remaining.is_empty() {
            Vec::new()
        } else {
            self.rank_folders(question, &remaining, vault_names, cancel)
                .await
        };

        let mut selected = user_picked;
        selected.extend(ranked);

        if selected.is_empty() {
            // Nothing usable from either source: search all folders.
            selected = available.to_vec();
        }

        debug!(selected = ?selected, "folder selection");
        Ok(FolderSelection {
            selected,
            available: available.to_vec(),
        })
    }

    /// Ask the chat model to rank the remaining folders. Never fails: any
    /// problem falls back to the input order.
    async fn rank_folders(
        &self,
        question: &str,
        remaining: &[&String],
        vault_names: &HashMap<i64, String>,
        cancel: &CancellationToken,
    ) -> Vec<String> {
        // Name-qualified projection, with a reverse map back to id form.
        let mut back: HashMap<String, String> = HashMap::new();
        let mut display = Vec::with_capacity(remaining.len());
        for key in remaining {
            let name_qualified = name_qualify(key, vault_names);
            back.insert(name_qualified.to_lowercase(), (*key).clone());
            display.push(name_qualified);
        }

        let prompt = ranker_prompt(question, &display);
        let reply = abort_on_cancel(
            cancel,
            self.chat
                .complete(vec![ChatMessage::user(prompt)], RANKER_TEMPERATURE, None),
        )
        .await;

        let fallback = || remaining.iter().map(|k| (*k).clone()).collect::<Vec<_>>();

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "folder ranker call failed, using all folders");
                return fallback();
            }
        };

        let Some(ranked) = parse_folder_ranking(&reply) else {
            warn!("folder ranker reply unparseable, using all folders");
            return fallback();
        };
        if ranked.is_empty() {
            return fallback();
        }

        // Map name-qualified entries back; drop anything not in the set.
        ranked
            .iter()
            .filter_map(|entry| back.get(&entry.trim().to_lowercase()).cloned())
            .collect()
    }
}

fn name_qualify(key: &str, vault_names: &HashMap<i64, String>) -> String {
    match split_folder_key(key) {
        Some((vault_id, folder)) => {
            let name = vault_names
                .get(&vault_id)
                .cloned()
                .unwrap_or_else(|| vault_id.to_string());
            format!("{}/{}", name, folder)
        }
        None => key.to_string(),
    }
}

fn ranker_prompt(question: &str, folders: &[String]) -> String {
    let mut listing = String::new();
    for folder in folders {
        listing.push_str("- ");
        listing.push_str(folder);
        listing.push('\n');
    }
    format!(
        "You are ranking folders from a personal note collection by relevance to a question.\n\n\
         Question: {}\n\n\
         Folders:\n{}\n\
         Respond with a JSON array of folder strings, in decreasing relevance.\n\
         Include only folders directly relevant to the question; omit tangential ones.\n\
         Do not include any explanatory text.",
        question, listing
    )
}

/// Leniently parse the ranker's reply into a list of folder strings.
///
/// Tries the slice between the first `[` and last `]` as strict JSON; on
/// failure strips a leading code fence and `json` token and retries.
pub fn parse_folder_ranking(reply: &str) -> Option<Vec<String>> {
    if let Some(parsed) = parse_array_slice(reply) {
        return Some(parsed);
    }

    let stripped = strip_code_fence(reply);
    let stripped = stripped
        .trim_start()
        .strip_prefix("json")
        .unwrap_or(&stripped)
        .trim();
    parse_array_slice(stripped)
}

fn parse_array_slice(text: &str) -> Option<Vec<String>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // Drop a language tag on the fence line.
    match rest.split_once('\n') {
        Some((first, body)) if !first.trim().is_empty() && !first.contains('[') => {
            body.trim().to_string()
        }
        _ => rest.trim().to_string(),
    }
}

/// Match free-form user folder input against the available set.
///
/// Matching order per token: exact id-qualified, exact name-qualified,
/// exact unqualified, prefix, specificity. First-seen order, deduplicated.
fn match_user_folders(
    user_folders: &[String],
    available: &[String],
    vault_names: &HashMap<i64, String>,
) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    for raw in user_folders {
        let token = raw.trim().to_lowercase();
        if token.is_empty() {
            continue;
        }
        for key in available {
            if out.contains(key) {
                continue;
            }
            if folder_token_matches(&token, key, vault_names) {
                out.push(key.clone());
            }
        }
    }
    out
}

fn folder_token_matches(
    token: &str,
    available_key: &str,
    vault_names: &HashMap<i64, String>,
) -> bool {
    let key_lower = available_key.to_lowercase();
    if token == key_lower {
        return true;
    }

    let name_qualified = name_qualify(available_key, vault_names).to_lowercase();
    if token == name_qualified {
        return true;
    }

    let Some((_, folder)) = split_folder_key(available_key) else {
        return false;
    };
    let folder = folder.to_lowercase();
    if token == folder {
        return true;
    }
    if !folder.is_empty() {
        let prefixed = format!("{}/", folder);
        if prefixed.starts_with(token) || token.starts_with(&prefixed) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> HashMap<i64, String> {
        HashMap::from([(1, "personal".to_string()), (2, "work".to_string())])
    }

    #[test]
    fn parses_plain_json_array() {
        let parsed = parse_folder_ranking(r#"["personal/projects", "work/notes"]"#).unwrap();
        assert_eq!(parsed, vec!["personal/projects", "work/notes"]);
    }

    #[test]
    fn parses_array_embedded_in_prose() {
        let reply = "Here are the folders:\n[\"personal/projects\"]\nHope that helps!";
        assert_eq!(
            parse_folder_ranking(reply).unwrap(),
            vec!["personal/projects"]
        );
    }

    #[test]
    fn parses_fenced_json_block() {
        let reply = "```json\n[\"personal/projects\", \"work/notes\"]\n```";
        assert_eq!(
            parse_folder_ranking(reply).unwrap(),
            vec!["personal/projects", "work/notes"]
        );
    }

    #[test]
    fn garbage_reply_returns_none() {
        assert!(parse_folder_ranking("I think the projects folder").is_none());
        assert!(parse_folder_ranking("").is_none());
        assert!(parse_folder_ranking("[not json").is_none());
    }

    #[test]
    fn user_match_exact_id_qualified() {
        let available = vec!["1/projects".to_string(), "1/notes".to_string()];
        let picked = match_user_folders(&["1/projects".to_string()], &available, &names());
        assert_eq!(picked, vec!["1/projects"]);
    }

    #[test]
    fn user_match_name_qualified_and_unqualified() {
        let available = vec!["1/projects".to_string(), "2/projects".to_string()];
        let picked =
            match_user_folders(&["personal/projects".to_string()], &available, &names());
        assert_eq!(picked, vec!["1/projects"]);

        let picked = match_user_folders(&["projects".to_string()], &available, &names());
        // Unqualified matches both vaults, first-seen order.
        assert_eq!(picked, vec!["1/projects", "2/projects"]);
    }

    #[test]
    fn user_match_prefix_and_specificity() {
        let available = vec!["1/projects/alpha".to_string(), "1/projects".to_string()];
        // User token is a prefix of the available folder path.
        let picked = match_user_folders(&["projects/al".to_string()], &available, &names());
        assert!(picked.contains(&"1/projects/alpha".to_string()));

        // User token is more specific than the available folder path.
        let picked =
            match_user_folders(&["projects/alpha/sub".to_string()], &available, &names());
        assert!(picked.contains(&"1/projects/alpha".to_string()));
        assert!(picked.contains(&"1/projects".to_string()));
    }

    #[test]
    fn user_match_dedups_preserving_first_seen() {
        let available = vec!["1/projects".to_string()];
        let picked = match_user_folders(
            &["projects".to_string(), "1/projects".to_string()],
            &available,
            &names(),
        );
        assert_eq!(picked, vec!["1/projects"]);
    }
}
