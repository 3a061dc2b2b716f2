//! Scripted LM client for tests: replies are popped in order.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::WorkflowError;
use crate::message::Message;
use crate::tools::ToolSpec;

use super::{LlmClient, LlmResponse, ToolCall};

/// One scripted reply. `Text`/`WithToolCalls` answer `invoke` calls,
/// `Structured` answers `invoke_structured`, `Fail` errors either.
#[derive(Clone, Debug)]
pub enum MockReply {
    Text(String),
    WithToolCalls {
        content: String,
        tool_calls: Vec<ToolCall>,
    },
    Structured(Value),
    Fail(String),
}

impl MockReply {
    pub fn text(s: impl Into<String>) -> Self {
        MockReply::Text(s.into())
    }

    pub fn structured(v: Value) -> Self {
        MockReply::Structured(v)
    }
}

/// LM stub with a fixed reply queue. Calls past the end of the script fail
/// with an `Llm` error so a test sees exactly where its expectations diverge.
pub struct MockLlm {
    script: Mutex<VecDeque<MockReply>>,
    /// When set, an exhausted script returns this text forever instead of failing.
    fallback: Option<String>,
}

impl MockLlm {
    pub fn new(script: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
        }
    }

    /// Replies with the same text to every chat call.
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(text.into()),
        }
    }

    fn pop(&self) -> Option<MockReply> {
        self.script
            .lock()
            .expect("mock script lock poisoned")
            .pop_front()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(
        &self,
        _messages: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<LlmResponse, WorkflowError> {
        match self.pop() {
            Some(MockReply::Text(content)) => Ok(LlmResponse {
                content,
                tool_calls: Vec::new(),
            }),
            Some(MockReply::WithToolCalls {
                content,
                tool_calls,
            }) => Ok(LlmResponse {
                content,
                tool_calls,
            }),
            Some(MockReply::Structured(v)) => Ok(LlmResponse {
                content: v.to_string(),
                tool_calls: Vec::new(),
            }),
            Some(MockReply::Fail(message)) => Err(WorkflowError::Llm(message)),
            None => match &self.fallback {
                Some(text) => Ok(LlmResponse {
                    content: text.clone(),
                    tool_calls: Vec::new(),
                }),
                None => Err(WorkflowError::Llm("mock llm script exhausted".into())),
            },
        }
    }

    async fn invoke_structured(
        &self,
        _messages: &[Message],
        _schema: &Value,
    ) -> Result<Value, WorkflowError> {
        match self.pop() {
            Some(MockReply::Structured(v)) => Ok(v),
            Some(MockReply::Fail(message)) => Err(WorkflowError::Llm(message)),
            Some(other) => Err(WorkflowError::Llm(format!(
                "mock llm expected a structured reply next, script has {other:?}"
            ))),
            None => Err(WorkflowError::Llm("mock llm script exhausted".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn pops_replies_in_order() {
        let llm = MockLlm::new(vec![
            MockReply::text("first"),
            MockReply::structured(json!({"next": "FINISH"})),
        ]);
        let r = llm.invoke(&[], &[]).await.unwrap();
        assert_eq!(r.content, "first");
        let v = llm.invoke_structured(&[], &json!({})).await.unwrap();
        assert_eq!(v["next"], "FINISH");
    }

    #[tokio::test]
    async fn exhausted_script_fails() {
        let llm = MockLlm::new(vec![]);
        assert!(matches!(
            llm.invoke(&[], &[]).await,
            Err(WorkflowError::Llm(_))
        ));
    }

    #[tokio::test]
    async fn always_replies_forever() {
        let llm = MockLlm::always("hi");
        for _ in 0..3 {
            assert_eq!(llm.invoke(&[], &[]).await.unwrap().content, "hi");
        }
    }

    #[tokio::test]
    async fn default_stream_sends_full_content_as_one_delta() {
        let llm = MockLlm::new(vec![MockReply::text("hello")]);
        let (tx, mut rx) = mpsc::channel(2);
        let resp = llm.invoke_stream(&[], &[], Some(tx)).await.unwrap();
        assert_eq!(resp.content, "hello");
        let delta = rx.recv().await.expect("one delta");
        assert_eq!(delta.content.as_deref(), Some("hello"));
    }
}
