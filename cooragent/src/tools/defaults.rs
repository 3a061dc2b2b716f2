//! Built-in tool specs seeded on first start.
//!
//! Only the search tool ships with an implementation here; the rest are
//! registered spec-only and become runnable when the host process registers
//! concrete implementations.

use serde_json::json;

use super::{search::TavilySearch, ToolSpec};

pub const TOOL_CRAWL: &str = "crawl_tool";
pub const TOOL_BROWSER: &str = "browser_tool";
pub const TOOL_PYTHON_REPL: &str = "python_repl_tool";
pub const TOOL_BASH: &str = "bash_tool";

/// The default roster's tool bindings, in seeding order.
pub fn default_tool_specs() -> Vec<ToolSpec> {
    vec![
        TavilySearch::tool_spec(),
        ToolSpec {
            name: TOOL_CRAWL.into(),
            description: "Fetch a URL and return its readable content as Markdown.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "The URL to crawl"}
                },
                "required": ["url"],
            }),
        },
        ToolSpec {
            name: TOOL_BROWSER.into(),
            description: "Interact with a web page: navigate, click, type, and read the result.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "instruction": {"type": "string", "description": "What to do in the browser"}
                },
                "required": ["instruction"],
            }),
        },
        ToolSpec {
            name: TOOL_PYTHON_REPL.into(),
            description: "Execute Python code and return stdout; use for calculations and data handling.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "code": {"type": "string", "description": "Python code to execute"}
                },
                "required": ["code"],
            }),
        },
        ToolSpec {
            name: TOOL_BASH.into(),
            description: "Run a Bash command and return its output.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "cmd": {"type": "string", "description": "Command to run"}
                },
                "required": ["cmd"],
            }),
        },
    ]
}

/// Writes one `<name>.json` record per default tool under `dir`, skipping
/// names already present. The records mirror what agent definitions
/// snapshot, so the store stays self-describing.
pub fn seed_tool_records(dir: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    for spec in default_tool_specs() {
        let path = dir.join(format!("{}.json", spec.name));
        if path.exists() {
            continue;
        }
        let json = serde_json::to_string_pretty(&spec)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        std::fs::write(path, json)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_tool_records_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        seed_tool_records(dir.path()).unwrap();
        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, default_tool_specs().len());
        // marker content survives a second seeding
        let marker = dir.path().join("bash_tool.json");
        std::fs::write(&marker, "{\"name\": \"bash_tool\"}").unwrap();
        seed_tool_records(dir.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(marker).unwrap(),
            "{\"name\": \"bash_tool\"}"
        );
    }

    #[test]
    fn default_specs_are_unique_and_search_first() {
        let specs = default_tool_specs();
        assert_eq!(specs[0].name, super::super::search::TOOL_TAVILY);
        let mut names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), specs.len());
    }

    #[test]
    fn every_default_schema_is_an_object_schema() {
        for spec in default_tool_specs() {
            assert_eq!(spec.input_schema["type"], "object", "{}", spec.name);
        }
    }
}
