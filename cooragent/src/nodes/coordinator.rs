//! Coordinator: the entry node. Small talk ends the run; real tasks hand off
//! to the planner.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::WorkflowError;
use crate::graph::{Command, NodeContext, WorkflowNode, NODE_COORDINATOR, NODE_PLANNER};
use crate::llm::{with_retry, LlmGateway, LlmType};
use crate::prompts::PromptLibrary;
use crate::state::SessionState;

/// Substring that triggers planning; the reply must begin with it.
const HANDOFF_SENTINEL: &str = "handoff_to_planner";

/// The coordinator never emits `message` events: a handoff reply is protocol,
/// not content, and chit-chat replies stay out of the stream as well, so a
/// coordinator-only run is exactly `start_of_agent` / `end_of_agent`.
pub struct CoordinatorNode {
    llm: Arc<LlmGateway>,
    prompts: Arc<PromptLibrary>,
}

impl CoordinatorNode {
    pub fn new(llm: Arc<LlmGateway>, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }
}

#[async_trait]
impl WorkflowNode for CoordinatorNode {
    fn name(&self) -> &'static str {
        NODE_COORDINATOR
    }

    async fn run(
        &self,
        state: &SessionState,
        ctx: &NodeContext,
    ) -> Result<Command, WorkflowError> {
        ctx.check_cancelled()?;
        let messages = self.prompts.apply(NODE_COORDINATOR, state)?;
        let client = self.llm.get(LlmType::Basic)?;
        let response = with_retry(|| client.invoke(&messages, &[])).await?;

        if response.content.trim_start().starts_with(HANDOFF_SENTINEL) {
            return Ok(Command::to(NODE_PLANNER));
        }
        Ok(Command::end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EventSink, Goto};
    use crate::llm::{MockLlm, MockReply};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn node(reply: &str) -> CoordinatorNode {
        CoordinatorNode::new(
            Arc::new(LlmGateway::single(Arc::new(MockLlm::new(vec![
                MockReply::text(reply),
            ])))),
            Arc::new(PromptLibrary::embedded()),
        )
    }

    fn ctx() -> (NodeContext, mpsc::Receiver<stream_event::WorkflowEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        (
            NodeContext {
                sink: EventSink::new(tx, cancel.clone()),
                cancel,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn handoff_reply_routes_to_planner_without_events() {
        let (ctx, mut rx) = ctx();
        let state = SessionState::new("u1", "wf-1");
        let cmd = node("handoff_to_planner").run(&state, &ctx).await.unwrap();
        assert_eq!(cmd.goto, Goto::Node(NODE_PLANNER.into()));
        assert!(rx.try_recv().is_err(), "no events expected from coordinator");
    }

    #[tokio::test]
    async fn chit_chat_ends_the_run_without_message_events() {
        let (ctx, mut rx) = ctx();
        let state = SessionState::new("u1", "wf-1");
        let cmd = node("Hello! I'm CoorAgent.").run(&state, &ctx).await.unwrap();
        assert_eq!(cmd.goto, Goto::End);
        assert!(cmd.patch.messages.is_empty());
        assert!(rx.try_recv().is_err());
    }
}
