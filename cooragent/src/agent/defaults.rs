//! The built-in roster: researcher, coder, browser, reporter.
//!
//! Installed idempotently on first start, owned by `share` so every user's
//! run sees them.

use crate::llm::LlmType;
use crate::prompts::PromptLibrary;
use crate::tools::{default_tool_specs, ToolSpec};

use super::{AgentDefinition, SHARE_OWNER};

fn spec(name: &str) -> ToolSpec {
    default_tool_specs()
        .into_iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("{name} missing from default tool specs"))
}

fn prompt(name: &str) -> String {
    PromptLibrary::embedded()
        .get(name)
        .unwrap_or_else(|e| panic!("embedded prompt {name}: {e}"))
}

/// The default agents with their tool bindings, in seeding order.
pub fn default_agents() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition {
            user_id: SHARE_OWNER.into(),
            agent_name: "researcher".into(),
            nick_name: "researcher".into(),
            description: "Uses search engines and web crawlers to gather information from the internet. Outputs a Markdown report summarizing findings. Researcher can not do math or programming.".into(),
            llm_type: LlmType::Basic,
            selected_tools: vec![spec("tavily_tool"), spec("crawl_tool")],
            prompt: prompt("researcher"),
        },
        AgentDefinition {
            user_id: SHARE_OWNER.into(),
            agent_name: "coder".into(),
            nick_name: "coder".into(),
            description: "Executes Python or Bash commands, performs mathematical calculations, and outputs a Markdown report. Must be used for all mathematical computations.".into(),
            llm_type: LlmType::Code,
            selected_tools: vec![spec("python_repl_tool"), spec("bash_tool")],
            prompt: prompt("coder"),
        },
        AgentDefinition {
            user_id: SHARE_OWNER.into(),
            agent_name: "browser".into(),
            nick_name: "browser".into(),
            description: "Directly interacts with web pages, performing complex operations and interactions. Can also perform in-domain search, like Facebook, Instagram, Github, etc.".into(),
            llm_type: LlmType::Basic,
            selected_tools: vec![spec("browser_tool")],
            prompt: prompt("browser"),
        },
        AgentDefinition {
            user_id: SHARE_OWNER.into(),
            agent_name: "reporter".into(),
            nick_name: "reporter".into(),
            description: "Writes a professional report based on the result of each step. Unable to perform any code or command-line operations.".into(),
            llm_type: LlmType::Basic,
            selected_tools: vec![],
            prompt: prompt("reporter"),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_share_owned_and_valid() {
        let agents = default_agents();
        assert_eq!(agents.len(), 4);
        for def in &agents {
            assert_eq!(def.user_id, SHARE_OWNER);
            def.validate().expect("default agent must validate");
        }
    }

    #[test]
    fn researcher_binds_search_and_crawl() {
        let agents = default_agents();
        let researcher = agents.iter().find(|a| a.agent_name == "researcher").unwrap();
        let tools: Vec<&str> = researcher
            .selected_tools
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(tools, vec!["tavily_tool", "crawl_tool"]);
    }
}
