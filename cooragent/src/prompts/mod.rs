//! Prompt templates and binding.
//!
//! Templates are plain text with `<<VAR>>` placeholders; literal braces pass
//! through untouched. Binding substitutes `CURRENT_TIME` plus the session
//! state's template vars and produces `[system message] + messages`. Unknown
//! placeholders fail the bind; nothing is ever silently replaced with an
//! empty string.
//!
//! **Canonical source**: default template text lives in `cooragent/prompts/*.md`,
//! embedded at compile time; a prompts directory overrides per file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::error::WorkflowError;
use crate::message::Message;
use crate::state::SessionState;

/// Embedded default templates (canonical source: `cooragent/prompts/*.md`).
macro_rules! embed_prompt {
    ($name:literal) => {
        ($name, include_str!(concat!("../../prompts/", $name, ".md")))
    };
}

const EMBEDDED: &[(&str, &str)] = &[
    embed_prompt!("coordinator"),
    embed_prompt!("planner"),
    embed_prompt!("publisher"),
    embed_prompt!("agent_factory"),
    embed_prompt!("researcher"),
    embed_prompt!("coder"),
    embed_prompt!("browser"),
    embed_prompt!("reporter"),
];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("no template named {0}")]
    MissingTemplate(String),
    #[error("template references unknown placeholder <<{0}>>")]
    UnknownPlaceholder(String),
    #[error("failed to read template {path}: {message}")]
    ReadFile { path: String, message: String },
}

impl From<TemplateError> for WorkflowError {
    fn from(e: TemplateError) -> Self {
        WorkflowError::Template(e.to_string())
    }
}

/// Substitutes every `<<VAR>>` in `template` from `vars`. A placeholder with
/// no binding fails; extra vars are fine.
pub fn render(template: &str, vars: &HashMap<&str, String>) -> Result<String, TemplateError> {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let placeholder = PLACEHOLDER
        .get_or_init(|| Regex::new(r"<<([A-Za-z0-9_]+)>>").expect("placeholder pattern is valid"));
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in placeholder.captures_iter(template) {
        let whole = caps.get(0).expect("capture 0 always present");
        let name = &caps[1];
        let value = vars
            .get(name)
            .ok_or_else(|| TemplateError::UnknownPlaceholder(name.to_string()))?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Named templates: embedded defaults with an optional per-file directory
/// override. Read-only after construction.
pub struct PromptLibrary {
    dir: Option<PathBuf>,
}

impl PromptLibrary {
    /// Embedded templates only.
    pub fn embedded() -> Self {
        Self { dir: None }
    }

    /// Templates from `dir` (`<name>.md`), falling back to the embedded text
    /// for names without a file.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn get(&self, name: &str) -> Result<String, TemplateError> {
        if let Some(ref dir) = self.dir {
            let path = dir.join(format!("{name}.md"));
            if path.is_file() {
                return std::fs::read_to_string(&path).map_err(|e| TemplateError::ReadFile {
                    path: path.display().to_string(),
                    message: e.to_string(),
                });
            }
        }
        EMBEDDED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, text)| text.to_string())
            .ok_or_else(|| TemplateError::MissingTemplate(name.to_string()))
    }

    /// Binds the named template against `state`: system message first, then
    /// the conversation so far.
    pub fn apply(&self, name: &str, state: &SessionState) -> Result<Vec<Message>, TemplateError> {
        let template = self.get(name)?;
        bind_text(&template, state)
    }
}

/// Binds arbitrary template text (e.g. a persisted agent's prompt) against
/// `state`.
pub fn bind_text(template: &str, state: &SessionState) -> Result<Vec<Message>, TemplateError> {
    let mut vars = state.template_vars();
    vars.insert("CURRENT_TIME", current_time_string());
    let system = render(template, &vars)?;
    let mut messages = Vec::with_capacity(state.messages.len() + 1);
    messages.push(Message::system(system));
    messages.extend(state.messages.iter().cloned());
    Ok(messages)
}

fn current_time_string() -> String {
    chrono::Local::now().format("%a %b %d %Y %H:%M:%S %z").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn render_substitutes_all_placeholders() {
        let out = render(
            "Team: <<TEAM_MEMBERS>>; time <<CURRENT_TIME>>.",
            &vars(&[("TEAM_MEMBERS", "a, b"), ("CURRENT_TIME", "now")]),
        )
        .unwrap();
        assert_eq!(out, "Team: a, b; time now.");
    }

    #[test]
    fn render_rejects_unknown_placeholder() {
        let err = render("<<NOPE>>", &HashMap::new()).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownPlaceholder(name) if name == "NOPE"));
    }

    #[test]
    fn render_keeps_literal_braces() {
        let out = render("JSON: {\"next\": \"FINISH\"}", &HashMap::new()).unwrap();
        assert_eq!(out, "JSON: {\"next\": \"FINISH\"}");
    }

    #[test]
    fn embedded_templates_bind_against_state() {
        let library = PromptLibrary::embedded();
        let mut state = SessionState::new("u1", "wf-1");
        state.messages.push(Message::user("hello"));
        state.team_members = vec!["researcher".into()];
        for name in [
            "coordinator",
            "planner",
            "publisher",
            "agent_factory",
            "researcher",
            "coder",
            "browser",
            "reporter",
        ] {
            let bound = library.apply(name, &state).unwrap_or_else(|e| {
                panic!("template {name} failed to bind: {e}");
            });
            assert_eq!(bound.len(), 2);
            assert_eq!(bound[1].content, "hello");
        }
    }

    #[test]
    fn missing_template_is_an_error() {
        let library = PromptLibrary::embedded();
        assert!(matches!(
            library.get("nope"),
            Err(TemplateError::MissingTemplate(_))
        ));
    }

    #[test]
    fn dir_override_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("coordinator.md"), "custom <<CURRENT_TIME>>").unwrap();
        let library = PromptLibrary::with_dir(dir.path());
        assert!(library.get("coordinator").unwrap().starts_with("custom"));
        // other names still fall back to embedded text
        assert!(library.get("planner").unwrap().contains("planning agent"));
    }
}
