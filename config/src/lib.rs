//! Settings for CoorAgent: one TOML file plus `.env`, applied with priority
//! **existing env > .env > config file > defaults**.
//!
//! The file lives at `$XDG_CONFIG_HOME/cooragent/config.toml` (or an explicit
//! path). All sections are optional; [`Settings::default`] is a runnable
//! configuration that keeps durable state under `./store`.

mod dotenv;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parse config toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
}

/// Where durable agent state lives: one JSON file per agent under
/// `agents/`, prompt templates under `prompts/`, tool records under `tools/`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub root: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./store"),
        }
    }
}

impl StoreSettings {
    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.root.join("prompts")
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.root.join("tools")
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
        }
    }
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Orchestration policy knobs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WorkflowSettings {
    /// Safety bound on node executions per run; exceeding it fails the run.
    pub max_node_visits: usize,
    /// Whether `coop_agents` may name agents owned by other users (opt-in grant).
    pub coop_grant_enabled: bool,
    /// User id allowed to remove share-owned agents.
    pub admin_user: String,
    /// Rolling user/assistant turns prepended from the session cache.
    pub session_history_turns: usize,
    /// Channel capacity of one run's event stream (producer blocks when full).
    pub event_buffer: usize,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_node_visits: 25,
            coop_grant_enabled: true,
            admin_user: "admin".to_string(),
            session_history_turns: 3,
            event_buffer: 64,
        }
    }
}

/// Model names per LM channel (`basic`, `reasoning`, `vision`, `code`).
/// API key and base URL come from the environment (`OPENAI_API_KEY`,
/// `OPENAI_BASE_URL`), which `.env` can supply.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub models: HashMap<String, String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert("basic".to_string(), "gpt-4o-mini".to_string());
        models.insert("reasoning".to_string(), "o3-mini".to_string());
        models.insert("vision".to_string(), "gpt-4o".to_string());
        models.insert("code".to_string(), "gpt-4o".to_string());
        Self { models }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EvaluationSettings {
    pub output_dir: PathBuf,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./store/evaluation"),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub server: ServerSettings,
    pub workflow: WorkflowSettings,
    pub llm: LlmSettings,
    pub evaluation: EvaluationSettings,
}

impl Settings {
    /// Loads settings from an explicit TOML path, or from
    /// `$XDG_CONFIG_HOME/cooragent/config.toml` when `path` is `None`.
    /// A missing file yields defaults; a present but invalid file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, LoadError> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| LoadError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cooragent").join("config.toml"))
}

/// Loads a project `.env` (current directory, or `override_dir` when given) and
/// sets each key into the process environment unless already set, so existing
/// env always wins.
pub fn load_and_apply_dotenv(override_dir: Option<&Path>) -> Result<(), LoadError> {
    let map = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;
    for (key, value) in map {
        if std::env::var(&key).is_err() {
            std::env::set_var(&key, value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let settings = Settings::load(Some(Path::new("/nonexistent/cooragent.toml"))).unwrap();
        assert_eq!(settings.server.port, 8001);
        assert_eq!(settings.workflow.max_node_visits, 25);
        assert_eq!(settings.workflow.session_history_turns, 3);
        assert_eq!(settings.store.agents_dir(), PathBuf::from("./store/agents"));
    }

    #[test]
    fn partial_toml_overrides_only_named_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9000\n\n[workflow]\nmax_node_visits = 7\n",
        )
        .unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.workflow.max_node_visits, 7);
        // untouched sections keep defaults
        assert!(settings.workflow.coop_grant_enabled);
        assert_eq!(settings.llm.models.get("basic").unwrap(), "gpt-4o-mini");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid [[[\n").unwrap();
        let result = Settings::load(Some(&path));
        assert!(matches!(result, Err(LoadError::Parse(_))));
    }

    #[test]
    fn dotenv_does_not_override_existing_env() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "COORAGENT_TEST_PRIO=from_dotenv\n").unwrap();
        std::env::set_var("COORAGENT_TEST_PRIO", "from_env");
        load_and_apply_dotenv(Some(dir.path())).unwrap();
        assert_eq!(
            std::env::var("COORAGENT_TEST_PRIO").as_deref(),
            Ok("from_env")
        );
        std::env::remove_var("COORAGENT_TEST_PRIO");
    }

    #[test]
    fn dotenv_sets_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "COORAGENT_TEST_NEW=value\n").unwrap();
        std::env::remove_var("COORAGENT_TEST_NEW");
        load_and_apply_dotenv(Some(dir.path())).unwrap();
        assert_eq!(std::env::var("COORAGENT_TEST_NEW").as_deref(), Ok("value"));
        std::env::remove_var("COORAGENT_TEST_NEW");
    }
}
