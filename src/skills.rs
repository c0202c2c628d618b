//! Skill scoring and skill-tree building from extracted solution text.
//!
//! Two sequential text-model calls: the first scores individual skills
//! from the solution text, the second arranges the scored list into a
//! hierarchical tree grouped by category. Models are asked for bare JSON
//! but routinely wrap it in code fences or prose, so both parsers scrape
//! the first JSON-looking region out of the reply before giving up.

use crate::error::IngestError;
use crate::prompts;
use crate::providers::TextCompleter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// One scored skill from the flat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub title: String,
    pub category: String,
    /// 1–10 as produced by the model; not range-validated here.
    pub strength: u8,
}

/// One node of the hierarchical skill tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillNode {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SkillNode>,
}

/// The combined result of both skill calls.
///
/// Serialized as `{ "list": [...], "tree": {...} }` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEvaluation {
    #[serde(rename = "list")]
    pub skills: Vec<Skill>,
    pub tree: SkillNode,
}

/// Failure to locate or deserialise JSON inside a model reply.
#[derive(Debug, Error)]
#[error("could not parse model reply as {expected}: {detail}")]
pub struct ParseError {
    expected: &'static str,
    detail: String,
}

// Non-greedy: grab the first bracketed list of objects, across lines.
static LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\s*\{[\s\S]*?\}\s*)\]").expect("list regex"));
// Greedy: the outermost braced object, across lines.
static TREE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("tree regex"));

/// Parse the flat skill list out of a scoring reply.
///
/// Tries the reply verbatim first, then scrapes the first `[ { ... } ]`
/// region (models love fencing their JSON).
pub fn parse_skill_list(reply: &str) -> Result<Vec<Skill>, ParseError> {
    if let Ok(skills) = serde_json::from_str::<Vec<Skill>>(reply.trim()) {
        return Ok(skills);
    }
    let matched = LIST_RE.find(reply).ok_or(ParseError {
        expected: "a skill list",
        detail: "no [ { ... } ] region found".to_string(),
    })?;
    serde_json::from_str(matched.as_str()).map_err(|e| ParseError {
        expected: "a skill list",
        detail: e.to_string(),
    })
}

/// Parse the hierarchical tree out of a tree-building reply.
pub fn parse_skill_tree(reply: &str) -> Result<SkillNode, ParseError> {
    if let Ok(tree) = serde_json::from_str::<SkillNode>(reply.trim()) {
        return Ok(tree);
    }
    let matched = TREE_RE.find(reply).ok_or(ParseError {
        expected: "a skill tree",
        detail: "no { ... } region found".to_string(),
    })?;
    serde_json::from_str(matched.as_str()).map_err(|e| ParseError {
        expected: "a skill tree",
        detail: e.to_string(),
    })
}

/// Score the solution text and build the skill tree.
///
/// Unlike per-slot description failures, there is no degraded result
/// worth returning here — an unusable reply fails the request with
/// [`IngestError::Upstream`].
pub async fn evaluate(
    solution: &str,
    completer: &Arc<dyn TextCompleter>,
) -> Result<SkillEvaluation, IngestError> {
    let reply = completer
        .complete(&prompts::skill_scoring_prompt(solution))
        .await
        .map_err(|e| IngestError::Upstream {
            detail: format!("skill scoring: {e}"),
        })?;
    debug!(chars = reply.len(), "scoring reply received");
    let skills = parse_skill_list(&reply).map_err(|e| IngestError::Upstream {
        detail: e.to_string(),
    })?;

    let list_json = serde_json::to_string(&skills)
        .map_err(|e| IngestError::Internal(format!("serialising skill list: {e}")))?;
    let reply = completer
        .complete(&prompts::skill_tree_prompt(&list_json))
        .await
        .map_err(|e| IngestError::Upstream {
            detail: format!("skill tree: {e}"),
        })?;
    let tree = parse_skill_tree(&reply).map_err(|e| IngestError::Upstream {
        detail: e.to_string(),
    })?;

    info!(skills = skills.len(), "skill evaluation complete");
    Ok(SkillEvaluation { skills, tree })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;
    use async_trait::async_trait;

    const LIST: &str = r#"[
        { "title": "React", "category": "Frontend", "strength": 9 },
        { "title": "Docker", "category": "DevOps", "strength": 6 }
    ]"#;

    #[test]
    fn bare_list_parses() {
        let skills = parse_skill_list(LIST).unwrap();
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].title, "React");
        assert_eq!(skills[1].strength, 6);
    }

    #[test]
    fn fenced_list_is_scraped() {
        let reply = format!("Here are the skills:\n```json\n{LIST}\n```\nHope that helps!");
        let skills = parse_skill_list(&reply).unwrap();
        assert_eq!(skills.len(), 2);
    }

    #[test]
    fn replies_without_json_fail() {
        let err = parse_skill_list("I could not find any skills.").unwrap_err();
        assert!(err.to_string().contains("skill list"));
    }

    #[test]
    fn tree_with_prose_around_it_is_scraped() {
        let reply = r#"Sure! {
            "title": "Skills",
            "children": [
                { "title": "Frontend", "strength": 7,
                  "children": [ { "title": "React", "strength": 8 } ] }
            ]
        } Let me know if you need changes."#;
        let tree = parse_skill_tree(reply).unwrap();
        assert_eq!(tree.title, "Skills");
        assert_eq!(tree.children[0].children[0].title, "React");
        assert_eq!(tree.children[0].children[0].strength, Some(8));
    }

    #[test]
    fn leaf_nodes_default_to_no_children() {
        let tree = parse_skill_tree(r#"{ "title": "Rust", "strength": 9 }"#).unwrap();
        assert!(tree.children.is_empty());
        assert_eq!(tree.strength, Some(9));
    }

    /// Plays the scoring reply first, then the tree reply.
    struct Scripted;

    #[async_trait]
    impl TextCompleter for Scripted {
        async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
            if prompt.contains("score from 1 to 10") {
                Ok(format!("```json\n{LIST}\n```"))
            } else {
                Ok(r#"{ "title": "Skills", "children": [
                    { "title": "Frontend", "children": [ { "title": "React", "strength": 9 } ] }
                ] }"#
                    .to_string())
            }
        }
    }

    #[tokio::test]
    async fn evaluate_runs_both_calls() {
        let completer: Arc<dyn TextCompleter> = Arc::new(Scripted);
        let eval = evaluate("built a dashboard in React", &completer)
            .await
            .unwrap();
        assert_eq!(eval.skills.len(), 2);
        assert_eq!(eval.tree.children[0].title, "Frontend");
    }

    /// Always answers prose, never JSON.
    struct Unhelpful;

    #[async_trait]
    impl TextCompleter for Unhelpful {
        async fn complete(&self, _: &str) -> Result<String, ProviderError> {
            Ok("As an AI language model, I cannot do that.".to_string())
        }
    }

    #[tokio::test]
    async fn unusable_reply_is_an_upstream_error() {
        let completer: Arc<dyn TextCompleter> = Arc::new(Unhelpful);
        let err = evaluate("anything", &completer).await.unwrap_err();
        assert!(matches!(err, IngestError::Upstream { .. }));
    }
}
