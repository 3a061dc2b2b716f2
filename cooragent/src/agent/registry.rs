//! Shared in-memory registry over the durable store.
//!
//! One flat index keyed by `agent_name` enforces global uniqueness;
//! visibility filters apply on read. Writes take the exclusive lock, flush to
//! the store, then update the index. `resolve` hands out `Arc` snapshots, so
//! an in-flight run keeps the definition it resolved even while an edit swaps
//! the index entry (snapshot-on-resolve).

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use regex::Regex;
use tracing::{info, warn};

use crate::tools::{ToolRegistry, ToolSpec};

use super::{default_agents, AgentDefinition, AgentStore, RegistryError, SHARE_OWNER};

#[derive(Default)]
struct Index {
    by_name: HashMap<String, Arc<AgentDefinition>>,
    /// Discovery/creation order; listings stay stable.
    order: Vec<String>,
}

impl Index {
    fn insert(&mut self, def: Arc<AgentDefinition>) {
        if !self.by_name.contains_key(&def.agent_name) {
            self.order.push(def.agent_name.clone());
        }
        self.by_name.insert(def.agent_name.clone(), def);
    }

    fn remove(&mut self, name: &str) {
        self.by_name.remove(name);
        self.order.retain(|n| n != name);
    }
}

pub struct AgentRegistry {
    store: AgentStore,
    tools: Arc<ToolRegistry>,
    index: RwLock<Index>,
    admin_user: String,
}

impl AgentRegistry {
    /// Opens the store, loads every valid record, and installs the default
    /// roster idempotently. A default agent that cannot be seeded (e.g. its
    /// tool is not registered) is logged and skipped; boot continues.
    pub fn open(
        dir: impl AsRef<Path>,
        tools: Arc<ToolRegistry>,
        admin_user: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        let store = AgentStore::open(dir.as_ref().to_path_buf())?;
        let mut index = Index::default();
        for def in store.load_all() {
            index.insert(Arc::new(def));
        }
        let registry = Self {
            store,
            tools,
            index: RwLock::new(index),
            admin_user: admin_user.into(),
        };
        for def in default_agents() {
            if registry.resolve(&def.agent_name).is_some() {
                continue;
            }
            match registry.create(def) {
                Ok(def) => info!(agent = %def.agent_name, "seeded default agent"),
                Err(e) => warn!(error = %e, "skipping default agent"),
            }
        }
        Ok(registry)
    }

    /// Captures the current registry schema for each referenced tool. A tool
    /// absent from the registry fails the whole operation.
    fn snapshot_tools(
        &self,
        agent: &str,
        selected: &[ToolSpec],
    ) -> Result<Vec<ToolSpec>, RegistryError> {
        selected
            .iter()
            .map(|t| {
                self.tools
                    .spec(&t.name)
                    .ok_or_else(|| RegistryError::SchemaMismatch {
                        agent: agent.to_string(),
                        tool: t.name.clone(),
                    })
            })
            .collect()
    }

    /// Creates a new agent: rejects duplicates, snapshots tool schemas,
    /// persists, then publishes the binding.
    pub fn create(&self, mut def: AgentDefinition) -> Result<Arc<AgentDefinition>, RegistryError> {
        def.validate()?;
        let mut index = self.index.write().expect("agent index lock poisoned");
        if index.by_name.contains_key(&def.agent_name) {
            return Err(RegistryError::AlreadyExists(def.agent_name));
        }
        def.selected_tools = self.snapshot_tools(&def.agent_name, &def.selected_tools)?;
        self.store.save(&def)?;
        let def = Arc::new(def);
        index.insert(Arc::clone(&def));
        Ok(def)
    }

    /// Replaces an existing binding atomically. The caller presents the full
    /// record; nothing is merged. An empty `selected_tools` preserves the
    /// existing schema snapshots; a non-empty list re-captures from the
    /// registry.
    pub fn edit(&self, mut def: AgentDefinition) -> Result<Arc<AgentDefinition>, RegistryError> {
        def.validate()?;
        let mut index = self.index.write().expect("agent index lock poisoned");
        let existing = index
            .by_name
            .get(&def.agent_name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(def.agent_name.clone()))?;
        if def.selected_tools.is_empty() {
            def.selected_tools = existing.selected_tools.clone();
        } else {
            def.selected_tools = self.snapshot_tools(&def.agent_name, &def.selected_tools)?;
        }
        self.store.save(&def)?;
        let def = Arc::new(def);
        index.insert(Arc::clone(&def));
        Ok(def)
    }

    /// Removes durable and in-memory state. Share-owned agents can only be
    /// removed by the administrator.
    pub fn remove(&self, user_id: &str, agent_name: &str) -> Result<(), RegistryError> {
        let mut index = self.index.write().expect("agent index lock poisoned");
        let existing = index
            .by_name
            .get(agent_name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(agent_name.to_string()))?;
        if existing.user_id == SHARE_OWNER && user_id != self.admin_user {
            return Err(RegistryError::Validation(format!(
                "agent {agent_name} is shared; only {} may remove it",
                self.admin_user
            )));
        }
        self.store.remove(agent_name)?;
        index.remove(agent_name);
        Ok(())
    }

    /// Snapshot of one definition; the returned `Arc` stays consistent for
    /// the remainder of a run regardless of later edits.
    pub fn resolve(&self, agent_name: &str) -> Option<Arc<AgentDefinition>> {
        self.index
            .read()
            .expect("agent index lock poisoned")
            .by_name
            .get(agent_name)
            .cloned()
    }

    /// Definitions filtered by visibility then by regex on `agent_name`, in
    /// stable discovery order. `user_id == None` lists everything.
    pub fn list(
        &self,
        user_id: Option<&str>,
        pattern: Option<&str>,
    ) -> Result<Vec<Arc<AgentDefinition>>, RegistryError> {
        let matcher = pattern
            .map(Regex::new)
            .transpose()
            .map_err(|e| RegistryError::Validation(format!("invalid pattern: {e}")))?;
        let index = self.index.read().expect("agent index lock poisoned");
        Ok(index
            .order
            .iter()
            .filter_map(|name| index.by_name.get(name))
            .filter(|def| match user_id {
                None => true,
                Some(u) => def.user_id == SHARE_OWNER || def.user_id == u,
            })
            .filter(|def| {
                matcher
                    .as_ref()
                    .is_none_or(|re| re.is_match(&def.agent_name))
            })
            .cloned()
            .collect())
    }

    /// Every definition in discovery order (team assembly walks this).
    pub fn all(&self) -> Vec<Arc<AgentDefinition>> {
        let index = self.index.read().expect("agent index lock poisoned");
        index
            .order
            .iter()
            .filter_map(|name| index.by_name.get(name))
            .cloned()
            .collect()
    }
}
