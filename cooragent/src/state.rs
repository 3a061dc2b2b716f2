//! Per-run session state: the blackboard every node reads and patches.

use std::collections::HashMap;

use serde::Serialize;

use crate::message::Message;

/// Mutable state of one workflow run. Created by the service at request
/// start, patched only through node [`Command`](crate::graph::Command)s,
/// discarded after the terminal event.
///
/// Invariant: `next`, when it names an agent rather than a control node, is an
/// element of `team_members` (enforced by the publisher).
#[derive(Clone, Debug, Serialize)]
pub struct SessionState {
    pub user_id: String,
    /// Fresh opaque id for this run.
    pub workflow_id: String,
    /// Ordered conversation; append-only within a run.
    pub messages: Vec<Message>,
    /// JSON plan text once the planner has produced one.
    pub full_plan: String,
    /// Ordered set of agent names visible to this run.
    pub team_members: Vec<String>,
    /// Derived roster text for the publisher prompt.
    pub team_members_description: String,
    /// Node or agent chosen by the publisher.
    pub next: String,
    /// Last agent dispatched through the proxy.
    pub processing_agent_name: String,
    pub deep_thinking_mode: bool,
    pub search_before_planning: bool,
}

impl SessionState {
    pub fn new(user_id: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            workflow_id: workflow_id.into(),
            messages: Vec::new(),
            full_plan: String::new(),
            team_members: Vec::new(),
            team_members_description: String::new(),
            next: String::new(),
            processing_agent_name: String::new(),
            deep_thinking_mode: false,
            search_before_planning: false,
        }
    }

    /// Last user message content, if any (planner search preflight query).
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::message::Role::User)
            .map(|m| m.content.as_str())
    }

    /// Values available to prompt templates, keyed by placeholder name.
    /// `CURRENT_TIME` is bound separately by the binder.
    pub fn template_vars(&self) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        vars.insert("USER_ID", self.user_id.clone());
        vars.insert("WORKFLOW_ID", self.workflow_id.clone());
        vars.insert("TEAM_MEMBERS", self.team_members.join(", "));
        vars.insert(
            "TEAM_MEMBERS_DESCRIPTION",
            self.team_members_description.clone(),
        );
        vars.insert("FULL_PLAN", self.full_plan.clone());
        vars.insert("NEXT", self.next.clone());
        vars.insert(
            "PROCESSING_AGENT_NAME",
            self.processing_agent_name.clone(),
        );
        vars.insert(
            "DEEP_THINKING_MODE",
            self.deep_thinking_mode.to_string(),
        );
        vars.insert(
            "SEARCH_BEFORE_PLANNING",
            self.search_before_planning.to_string(),
        );
        vars
    }
}
