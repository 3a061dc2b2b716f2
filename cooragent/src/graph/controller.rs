//! The run controller: drives nodes, applies patches, owns the terminal
//! events.
//!
//! Event contract per run: exactly one `start_of_workflow` first; every node
//! execution bracketed by `start_of_agent` / `end_of_agent`; on success one
//! `end_of_workflow`; on failure an `error` event followed by
//! `end_of_workflow` carrying the partial message list, so the caller always
//! sees a terminal event.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use stream_event::{WorkflowEnd, WorkflowEvent, WorkflowFailure, WorkflowStart};

use crate::error::WorkflowError;
use crate::message::messages_to_value;
use crate::state::SessionState;

use super::{CompiledWorkflow, EventSink, Goto, NodeContext};

/// Executes the graph to completion, emitting the full event stream. All
/// outcomes (including cancellation) are reported through the sink; emission
/// failures after cancellation are ignored since the consumer is gone.
pub async fn run_workflow(
    graph: &CompiledWorkflow,
    mut state: SessionState,
    sink: EventSink,
    cancel: CancellationToken,
    max_node_visits: usize,
) {
    let workflow_id = state.workflow_id.clone();
    info!(workflow_id = %workflow_id, start = %graph.start, "workflow starting");

    if sink
        .emit(WorkflowEvent::StartOfWorkflow {
            data: WorkflowStart {
                workflow_id: workflow_id.clone(),
                input: messages_to_value(&state.messages),
            },
        })
        .await
        .is_err()
    {
        return;
    }

    match drive(graph, &mut state, &sink, &cancel, max_node_visits).await {
        Ok(()) => {
            info!(workflow_id = %workflow_id, "workflow completed");
        }
        Err(e) => {
            warn!(workflow_id = %workflow_id, error = %e, "workflow failed");
            let _ = sink
                .emit(WorkflowEvent::Error {
                    data: WorkflowFailure {
                        workflow_id: workflow_id.clone(),
                        error: e.to_error_info(),
                    },
                })
                .await;
        }
    }

    let _ = sink
        .emit(WorkflowEvent::EndOfWorkflow {
            data: WorkflowEnd {
                workflow_id,
                messages: messages_to_value(&state.messages),
            },
        })
        .await;
}

async fn drive(
    graph: &CompiledWorkflow,
    state: &mut SessionState,
    sink: &EventSink,
    cancel: &CancellationToken,
    max_node_visits: usize,
) -> Result<(), WorkflowError> {
    let mut current = graph.start.clone();
    let mut step = 0usize;

    loop {
        step += 1;
        if step > max_node_visits {
            return Err(WorkflowError::Internal(format!(
                "IterationLimit: exceeded {max_node_visits} node visits"
            )));
        }
        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        let node = graph
            .nodes
            .get(&current)
            .ok_or_else(|| WorkflowError::Internal(format!("node {current} not in graph")))?;
        let agent_id = format!("{}_{}_{}", state.workflow_id, current, step);
        debug!(node = %current, step, "node starting");

        sink.agent_started(&current, &agent_id).await?;
        let ctx = NodeContext {
            sink: sink.clone(),
            cancel: cancel.clone(),
        };
        let result = node.run(state, &ctx).await;
        sink.agent_ended(&current, &agent_id).await?;

        let command = result?;
        command.patch.apply(state);
        match command.goto {
            Goto::End => return Ok(()),
            Goto::Node(next) => current = next,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Command, StatePatch, WorkflowGraph, WorkflowNode};
    use crate::message::Message;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct HopNode {
        id: &'static str,
        goto: Goto,
    }

    #[async_trait]
    impl WorkflowNode for HopNode {
        fn name(&self) -> &'static str {
            self.id
        }

        async fn run(
            &self,
            _state: &SessionState,
            _ctx: &NodeContext,
        ) -> Result<Command, WorkflowError> {
            let patch = StatePatch {
                messages: vec![Message::from_agent(self.id, format!("from {}", self.id))],
                ..Default::default()
            };
            Ok(Command {
                patch,
                goto: self.goto.clone(),
            })
        }
    }

    struct FailNode;

    #[async_trait]
    impl WorkflowNode for FailNode {
        fn name(&self) -> &'static str {
            "boom"
        }

        async fn run(
            &self,
            _state: &SessionState,
            _ctx: &NodeContext,
        ) -> Result<Command, WorkflowError> {
            Err(WorkflowError::Validation("planner output is not JSON".into()))
        }
    }

    async fn collect(graph: CompiledWorkflow, state: SessionState) -> Vec<WorkflowEvent> {
        let (tx, mut rx) = mpsc::channel(64);
        let sink = EventSink::new(tx, CancellationToken::new());
        let cancel = CancellationToken::new();
        let handle =
            tokio::spawn(async move { run_workflow(&graph, state, sink, cancel, 25).await });
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        handle.await.unwrap();
        events
    }

    #[tokio::test]
    async fn two_node_run_emits_bracketed_stream() {
        let mut graph = WorkflowGraph::new();
        graph.add_node(Arc::new(HopNode {
            id: "a",
            goto: Goto::Node("b".into()),
        }));
        graph.add_node(Arc::new(HopNode {
            id: "b",
            goto: Goto::End,
        }));
        graph.set_start("a");
        let events = collect(graph.compile().unwrap(), SessionState::new("u", "wf-1")).await;

        let tags: Vec<&str> = events.iter().map(|e| e.tag()).collect();
        assert_eq!(
            tags,
            vec![
                "start_of_workflow",
                "start_of_agent",
                "end_of_agent",
                "start_of_agent",
                "end_of_agent",
                "end_of_workflow",
            ]
        );
        // final event carries both patched messages
        match events.last().unwrap() {
            WorkflowEvent::EndOfWorkflow { data } => {
                assert_eq!(data.messages.as_array().unwrap().len(), 2);
            }
            other => panic!("expected end_of_workflow, got {}", other.tag()),
        }
    }

    #[tokio::test]
    async fn node_error_emits_error_then_terminal_end() {
        let mut graph = WorkflowGraph::new();
        graph.add_node(Arc::new(FailNode));
        graph.set_start("boom");
        let events = collect(graph.compile().unwrap(), SessionState::new("u", "wf-2")).await;

        let tags: Vec<&str> = events.iter().map(|e| e.tag()).collect();
        assert_eq!(
            tags,
            vec![
                "start_of_workflow",
                "start_of_agent",
                "end_of_agent",
                "error",
                "end_of_workflow",
            ]
        );
        match &events[3] {
            WorkflowEvent::Error { data } => {
                assert_eq!(data.error.kind, stream_event::ErrorKind::Validation);
            }
            other => panic!("expected error, got {}", other.tag()),
        }
    }

    #[tokio::test]
    async fn self_loop_hits_iteration_limit() {
        let mut graph = WorkflowGraph::new();
        graph.add_node(Arc::new(HopNode {
            id: "spin",
            goto: Goto::Node("spin".into()),
        }));
        graph.set_start("spin");
        let events = collect(graph.compile().unwrap(), SessionState::new("u", "wf-3")).await;

        let error = events
            .iter()
            .find_map(|e| match e {
                WorkflowEvent::Error { data } => Some(data.error.clone()),
                _ => None,
            })
            .expect("error event");
        assert_eq!(error.kind, stream_event::ErrorKind::Internal);
        assert!(error.message.contains("IterationLimit"));
    }
}
