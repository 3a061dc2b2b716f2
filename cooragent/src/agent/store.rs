//! Durable agent records: one self-describing JSON file per agent,
//! `<agent_name>.json`, under the agents directory.

use std::path::{Path, PathBuf};

use tracing::warn;

use super::{AgentDefinition, RegistryError};

pub struct AgentStore {
    dir: PathBuf,
}

impl AgentStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| RegistryError::Storage(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    fn path(&self, agent_name: &str) -> PathBuf {
        self.dir.join(format!("{agent_name}.json"))
    }

    pub fn save(&self, def: &AgentDefinition) -> Result<(), RegistryError> {
        let json = serde_json::to_string_pretty(def)
            .map_err(|e| RegistryError::Storage(format!("serialize {}: {e}", def.agent_name)))?;
        let path = self.path(&def.agent_name);
        std::fs::write(&path, json)
            .map_err(|e| RegistryError::Storage(format!("write {}: {e}", path.display())))
    }

    pub fn remove(&self, agent_name: &str) -> Result<(), RegistryError> {
        let path = self.path(agent_name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RegistryError::Storage(format!(
                "remove {}: {e}",
                path.display()
            ))),
        }
    }

    /// Scans the directory at startup. Invalid records are skipped with a
    /// structured warning; they never abort boot. Discovery order is the file
    /// name order, which keeps listings stable across restarts.
    pub fn load_all(&self) -> Vec<AgentDefinition> {
        let mut paths: Vec<PathBuf> = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect(),
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "agent store scan failed");
                return Vec::new();
            }
        };
        paths.sort();

        let mut defs = Vec::with_capacity(paths.len());
        for path in paths {
            match Self::load_one(&path) {
                Ok(def) => defs.push(def),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping invalid agent record");
                }
            }
        }
        defs
    }

    fn load_one(path: &Path) -> Result<AgentDefinition, RegistryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        let def: AgentDefinition =
            serde_json::from_str(&content).map_err(|e| RegistryError::Storage(e.to_string()))?;
        def.validate()?;
        Ok(def)
    }
}
