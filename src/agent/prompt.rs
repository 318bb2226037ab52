//! Prompt templates for question answering and the tool-calling agent.
//!
//! The QA and refine templates use `{placeholder}` slots filled by
//! [`render`]. Every template can be overridden by a file in the prompt
//! directory; each file is loaded independently and a missing file keeps
//! the compiled-in default.

use std::path::{Path, PathBuf};

use super::message::{ChatMessage, system_message, user_message};

/// System prompt that makes the model answer math questions with code.
pub const MATH_CODE_SYSTEM_PROMPT: &str = "You are GPT-4, a highly capable model answering questions for users according to the following rules:\n\
1. You ALWAYS answer the question, even if the context isn't helpful.\n\
2. When the question relates to mathematical expressions/evaluations, you DO NOT solve them yourself, \
you think step-by-step and ONLY provide (output) a piece of python code that can be used to solve the problem, and NOTHING else.";

/// Generic question-answering system prompt.
pub const DEFAULT_QA_SYSTEM_PROMPT: &str = "You are an expert Q&A system that is trusted around the world.\n\
Always answer the query using the provided context information, and not prior knowledge.\n\
Some rules to follow:\n\
1. Never directly reference the given context in your answer.\n\
2. Avoid statements like 'Based on the context, ...' or 'The context information ...' or anything along those lines.";

/// First-pass user template. Slots: `{context_str}`, `{query_str}`.
pub const QA_USER_TEMPLATE: &str = "Context information is below.\n\
---------------------\n\
{context_str}\n\
---------------------\n\
Given the context information and not prior knowledge, answer the question: {query_str}\n";

/// Refine user template. Slots: `{context_msg}`, `{query_str}`, `{existing_answer}`.
pub const REFINE_USER_TEMPLATE: &str = "We have the opportunity to refine the original answer \
(only if needed) with some more context below.\n\
------------\n\
{context_msg}\n\
------------\n\
Given the new context, refine the original answer to better answer the question: {query_str}. \
If the context isn't useful, output the original answer again.\n\
Original Answer: {existing_answer}";

/// System prompt for the tool-calling agent.
pub const AGENT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools.\n\
Call a tool whenever it can answer part of the question, using the exact argument names of its schema. \
Use the paper tools for questions about their documents and the arithmetic tools for every calculation. \
Base the final answer on the tool results.";

/// Default prompt directory, relative to the home directory.
const DEFAULT_PROMPT_DIR: &str = ".config/paperchat/prompts";

const QA_SYSTEM_FILENAME: &str = "qa_system.md";
const QA_USER_FILENAME: &str = "qa_user.md";
const REFINE_USER_FILENAME: &str = "refine_user.md";
const AGENT_SYSTEM_FILENAME: &str = "agent_system.md";

/// Which compiled-in QA system prompt to start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateStyle {
    /// Math questions are answered with a fenced python block.
    #[default]
    MathCode,
    /// Generic context-grounded QA.
    Default,
}

impl TemplateStyle {
    const fn qa_system(self) -> &'static str {
        match self {
            Self::MathCode => MATH_CODE_SYSTEM_PROMPT,
            Self::Default => DEFAULT_QA_SYSTEM_PROMPT,
        }
    }
}

/// Loaded prompt templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// System prompt for QA and refine passes.
    pub qa_system: String,
    /// First-pass user template.
    pub qa_user: String,
    /// Refine-pass user template.
    pub refine_user: String,
    /// System prompt for the tool-calling agent.
    pub agent_system: String,
}

impl PromptSet {
    /// Loads prompts from `prompt_dir`, falling back to the defaults for `style`.
    ///
    /// Resolution order for the directory:
    /// 1. Explicit `prompt_dir` argument (from `--prompt-dir`)
    /// 2. `PAPERCHAT_PROMPT_DIR` environment variable
    /// 3. `~/.config/paperchat/prompts/`
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>, style: TemplateStyle) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("PAPERCHAT_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            qa_system: load_file(QA_SYSTEM_FILENAME, style.qa_system()),
            qa_user: load_file(QA_USER_FILENAME, QA_USER_TEMPLATE),
            refine_user: load_file(REFINE_USER_FILENAME, REFINE_USER_TEMPLATE),
            agent_system: load_file(AGENT_SYSTEM_FILENAME, AGENT_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults(style: TemplateStyle) -> Self {
        Self {
            qa_system: style.qa_system().to_string(),
            qa_user: QA_USER_TEMPLATE.to_string(),
            refine_user: REFINE_USER_TEMPLATE.to_string(),
            agent_system: AGENT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Returns the default prompt directory under the user's home.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }

    /// Messages for the first QA pass.
    #[must_use]
    pub fn qa_messages(&self, context: &str, query: &str) -> Vec<ChatMessage> {
        vec![
            system_message(&self.qa_system),
            user_message(&render(
                &self.qa_user,
                &[("context_str", context), ("query_str", query)],
            )),
        ]
    }

    /// Messages for a refine pass over `existing_answer`.
    #[must_use]
    pub fn refine_messages(
        &self,
        context: &str,
        query: &str,
        existing_answer: &str,
    ) -> Vec<ChatMessage> {
        vec![
            system_message(&self.qa_system),
            user_message(&render(
                &self.refine_user,
                &[
                    ("context_msg", context),
                    ("query_str", query),
                    ("existing_answer", existing_answer),
                ],
            )),
        ]
    }
}

/// Fills `{name}` slots in `template` in a single pass.
///
/// Substituted values are not rescanned, and unknown slots are left as-is.
#[must_use]
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = tail.find('}').and_then(|end| {
            let key = &tail[..end];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (end, *value))
        });
        if let Some((end, value)) = hit {
            out.push_str(value);
            rest = &tail[end + 1..];
        } else {
            out.push('{');
            rest = tail;
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::Role;

    #[test]
    fn test_render_fills_slots() {
        let out = render("Q: {query_str} C: {context_str}", &[
            ("query_str", "why?"),
            ("context_str", "because"),
        ]);
        assert_eq!(out, "Q: why? C: because");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let out = render("{a} {b}", &[("a", "{b}"), ("b", "x")]);
        assert_eq!(out, "{b} x");
    }

    #[test]
    fn test_render_keeps_unknown_slots_and_braces() {
        let out = render("fn f() { {missing} }", &[("query_str", "q")]);
        assert_eq!(out, "fn f() { {missing} }");
    }

    #[test]
    fn test_defaults_by_style() {
        let math = PromptSet::defaults(TemplateStyle::MathCode);
        assert!(math.qa_system.contains("piece of python code"));
        let plain = PromptSet::defaults(TemplateStyle::Default);
        assert!(plain.qa_system.starts_with("You are an expert Q&A system"));
        assert_eq!(math.qa_user, plain.qa_user);
    }

    #[test]
    fn test_qa_messages() {
        let prompts = PromptSet::defaults(TemplateStyle::MathCode);
        let messages = prompts.qa_messages("Mixtral has 8 experts.", "How many experts?");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[1].content.contains("Mixtral has 8 experts.\n---"));
        assert!(messages[1].content.contains("answer the question: How many experts?"));
    }

    #[test]
    fn test_refine_messages_carry_existing_answer() {
        let prompts = PromptSet::defaults(TemplateStyle::Default);
        let messages = prompts.refine_messages("more", "q", "first draft");
        assert!(messages[1].content.ends_with("Original Answer: first draft"));
        assert!(messages[1].content.contains("------------\nmore\n------------"));
    }

    #[test]
    fn test_load_overrides_file_by_file() {
        let tmp = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        std::fs::write(tmp.path().join("agent_system.md"), "custom agent")
            .unwrap_or_else(|_| unreachable!());

        let prompts = PromptSet::load(Some(tmp.path()), TemplateStyle::MathCode);
        assert_eq!(prompts.agent_system, "custom agent");
        assert_eq!(prompts.qa_system, MATH_CODE_SYSTEM_PROMPT);
        assert_eq!(prompts.refine_user, REFINE_USER_TEMPLATE);
    }
}
