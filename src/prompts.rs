//! Instruction prompts for every external model call.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tweaking the wording for one file kind
//!    means editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    spinning up a real model, so prompt regressions are easy to catch.
//!
//! The describe prompts are structurally identical — describe the content,
//! ignore irrelevant chrome — but use kind-specific wording so the model
//! knows whether it is looking at a slide, a page, a photo, or a frame.

/// Per-slide prompt for ppt/pptx uploads.
pub const SLIDE_PROMPT: &str = "Extract all the details in this slide line by line if it is text \
and describe what the images show if any in detail. Don't include any information irrelevant to \
the main slide content.";

/// Per-page prompt for pdf and docx uploads.
pub const PAGE_PROMPT: &str = "Extract all the details in this page line by line if it is text, \
and describe images if any in detail. Don't include any information irrelevant to the main page \
content.";

/// Prompt for single still images.
pub const IMAGE_PROMPT: &str = "What's in this image? Don't include any information irrelevant \
to the main content.";

/// Prompt for accepted video keyframes.
pub const FRAME_PROMPT: &str = "Describe this frame in detail.";

/// The skill categories the scoring prompt asks the model to use.
pub const SKILL_CATEGORIES: &str =
    "Frontend, Backend, Database, DevOps, Mobile, AI/ML, Design, Soft Skills";

/// Build the scoring prompt: solution text in, JSON skill list out.
pub fn skill_scoring_prompt(solution: &str) -> String {
    format!(
        r#"The following text describes a skill/project/achievement of a user. From the text, analyse the various skills possessed by the user and give them a score from 1 to 10. Your answer should be a list of the following format:
[
  {{ "title": "React", "category": "Frontend", "strength": 9 }},
  {{ "title": "Node.js", "category": "Backend", "strength": 8 }},
  {{ "title": "PostgreSQL", "category": "Database", "strength": 7 }},
  {{ "title": "Docker", "category": "DevOps", "strength": 6 }}
]

The various categories are: {SKILL_CATEGORIES}
Do not return any additional text. Only the final json.
Text:
{solution}"#
    )
}

/// Build the tree prompt: JSON skill list in, hierarchical JSON tree out.
pub fn skill_tree_prompt(skill_list_json: &str) -> String {
    format!(
        r#"This is the list of skills of the user: {skill_list_json}
Organize them into a hierarchical skill tree as a nested JSON object grouped by category. Each category should be a node with a `title` and `children`, and each skill under it should be a child node with `title` and `strength`. Use this format:

{{
  "title": "Skills",
  "strength": 8,
  "children": [
    {{
      "title": "Frontend",
      "strength": 7,
      "children": [
        {{ "title": "React", "strength": 8 }}
      ]
    }}
  ]
}}
Do not return any additional text. Only the final json."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_prompts_ignore_chrome() {
        for p in [SLIDE_PROMPT, PAGE_PROMPT, IMAGE_PROMPT] {
            assert!(p.contains("irrelevant"), "prompt must exclude chrome: {p}");
        }
    }

    #[test]
    fn scoring_prompt_embeds_solution_and_categories() {
        let p = skill_scoring_prompt("built a compiler");
        assert!(p.contains("built a compiler"));
        assert!(p.contains("AI/ML"));
        assert!(p.ends_with("built a compiler"));
    }

    #[test]
    fn tree_prompt_embeds_list() {
        let p = skill_tree_prompt(r#"[{"title":"Rust"}]"#);
        assert!(p.contains(r#"[{"title":"Rust"}]"#));
    }
}
