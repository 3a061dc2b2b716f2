//! End-to-end workflow runs over a scripted LM: full pipeline, chit-chat,
//! planner rejection, factory creation, protocol violations, cancellation.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use common::{build_service, create_echo_agent};
use cooragent::{
    AgentRequest, ErrorKind, Lang, Message, MockLlm, MockReply, TaskType, ToolCall,
    WorkflowEvent,
};

fn request(user_id: &str, task_type: TaskType, text: &str) -> AgentRequest {
    AgentRequest {
        user_id: user_id.into(),
        lang: Lang::En,
        task_type,
        messages: vec![Message::user(text)],
        debug: false,
        deep_thinking_mode: false,
        search_before_planning: false,
        coop_agents: vec![],
    }
}

async fn drain(
    service: &cooragent::WorkflowService,
    req: AgentRequest,
) -> Vec<WorkflowEvent> {
    let mut stream = service.run(req).unwrap();
    let mut events = Vec::new();
    while let Some(ev) = stream.next().await {
        events.push(ev);
    }
    events
}

fn tags(events: &[WorkflowEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.tag()).collect()
}

/// Full pipeline: coordinator hands off, planner produces a JSON plan,
/// publisher dispatches the echo agent (one tool round), then the reporter,
/// then finishes.
#[tokio::test]
async fn happy_agent_workflow_streams_the_whole_pipeline() {
    let plan = json!({"title": "echo then report", "steps": []}).to_string();
    let llm = Arc::new(MockLlm::new(vec![
        // coordinator
        MockReply::text("handoff_to_planner"),
        // planner (streamed as one delta by the mock)
        MockReply::text(plan.clone()),
        // publisher -> echoer
        MockReply::structured(json!({"next": "echoer"})),
        // proxy round 1: tool call, round 2: final reply
        MockReply::WithToolCalls {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "call-1".into(),
                name: "echo_tool".into(),
                arguments: json!({"text": "summarized https://x"}),
            }],
        },
        MockReply::text("echoed the page"),
        // publisher -> reporter
        MockReply::structured(json!({"next": "reporter"})),
        // reporter has no tools; replies directly
        MockReply::text("Final Answer: summarized https://x"),
        // publisher -> FINISH
        MockReply::structured(json!({"next": "FINISH"})),
    ]));
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(llm, dir.path());
    create_echo_agent(service.agents(), "u1", "echoer");
    let before = service.agents().list(Some("u1"), None).unwrap().len();

    let events = drain(
        &service,
        request("u1", TaskType::AgentWorkflow, "summarize https://x"),
    )
    .await;
    let tags = tags(&events);

    // exactly one start and one terminal end (I1)
    assert_eq!(tags.first(), Some(&"start_of_workflow"));
    assert_eq!(tags.last(), Some(&"end_of_workflow"));
    assert_eq!(tags.iter().filter(|t| **t == "start_of_workflow").count(), 1);
    assert_eq!(tags.iter().filter(|t| **t == "end_of_workflow").count(), 1);
    assert!(!tags.contains(&"error"));

    // node spans pair up and never interleave (I2)
    let mut open: Option<String> = None;
    let mut spans = Vec::new();
    for ev in &events {
        match ev {
            WorkflowEvent::StartOfAgent { data, .. } => {
                assert!(open.is_none(), "nested start_of_agent");
                open = Some(data.agent_id.clone());
            }
            WorkflowEvent::EndOfAgent { data, .. } => {
                assert_eq!(open.take().as_deref(), Some(data.agent_id.as_str()));
                spans.push(data.agent_name.clone());
            }
            _ => {}
        }
    }
    assert!(open.is_none());
    assert_eq!(
        spans,
        vec![
            "coordinator",
            "planner",
            "publisher",
            "agent_proxy",
            "publisher",
            "agent_proxy",
            "publisher",
        ]
    );

    // coordinator handoff suppressed: no message event before the planner span (I8)
    let planner_start = events
        .iter()
        .position(|e| matches!(e, WorkflowEvent::StartOfAgent { data, .. } if data.agent_name == "planner"))
        .unwrap();
    assert!(!events[..planner_start]
        .iter()
        .any(|e| e.tag() == "message" || e.tag() == "full_message"));

    // every tool_call has exactly one result with the same id (I3)
    let mut calls: HashMap<String, i32> = HashMap::new();
    for ev in &events {
        match ev {
            WorkflowEvent::ToolCall { data, .. } => {
                *calls.entry(data.tool_call_id.clone()).or_default() += 1;
            }
            WorkflowEvent::ToolCallResult { data, .. } => {
                *calls.entry(data.tool_call_id.clone()).or_default() -= 1;
            }
            _ => {}
        }
    }
    assert!(!calls.is_empty());
    assert!(calls.values().all(|v| *v == 0));

    // chunking is content-preserving per message id (R3)
    let mut deltas: HashMap<String, String> = HashMap::new();
    let mut fulls: HashMap<String, String> = HashMap::new();
    for ev in &events {
        match ev {
            WorkflowEvent::Message { data, .. } => {
                deltas
                    .entry(data.message_id.clone())
                    .or_default()
                    .push_str(data.delta.content.as_deref().unwrap_or_default());
            }
            WorkflowEvent::FullMessage { data, .. } => {
                fulls.insert(
                    data.message_id.clone(),
                    data.delta.content.clone().unwrap_or_default(),
                );
            }
            _ => {}
        }
    }
    assert!(!fulls.is_empty());
    for (message_id, full) in &fulls {
        assert_eq!(deltas.get(message_id), Some(full));
    }

    // the registry was not touched by a plain workflow
    assert_eq!(service.agents().list(Some("u1"), None).unwrap().len(), before);

    // the terminal event carries the planner plan and both agent responses
    match events.last().unwrap() {
        WorkflowEvent::EndOfWorkflow { data } => {
            let messages = data.messages.as_array().unwrap();
            assert!(messages.iter().any(|m| m["name"] == "planner"));
            assert!(messages.iter().any(|m| m["name"] == "echoer"));
            assert!(messages.iter().any(|m| m["name"] == "reporter"));
        }
        other => panic!("expected end_of_workflow, got {}", other.tag()),
    }
}

/// Coordinator chit-chat: two agent events around no message events, then a
/// normal terminal event.
#[tokio::test]
async fn coordinator_chit_chat_emits_no_messages() {
    let llm = Arc::new(MockLlm::new(vec![MockReply::text("Hi! I'm CoorAgent.")]));
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(llm, dir.path());

    let events = drain(&service, request("u1", TaskType::AgentWorkflow, "hi")).await;
    assert_eq!(
        tags(&events),
        vec![
            "start_of_workflow",
            "start_of_agent",
            "end_of_agent",
            "end_of_workflow",
        ]
    );
}

/// Planner output that does not parse as JSON ends the run with a validation
/// error; the publisher never starts.
#[tokio::test]
async fn planner_rejects_garbage_and_publisher_never_runs() {
    let llm = Arc::new(MockLlm::new(vec![
        MockReply::text("handoff_to_planner"),
        MockReply::text("I would rather chat than plan"),
    ]));
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(llm, dir.path());

    let events = drain(&service, request("u1", TaskType::AgentWorkflow, "do a task")).await;
    let error = events
        .iter()
        .find_map(|e| match e {
            WorkflowEvent::Error { data } => Some(data.error.clone()),
            _ => None,
        })
        .expect("error event");
    assert_eq!(error.kind, ErrorKind::Validation);
    assert!(!events.iter().any(
        |e| matches!(e, WorkflowEvent::StartOfAgent { data, .. } if data.agent_name == "publisher")
    ));
    assert_eq!(events.last().unwrap().tag(), "end_of_workflow");
}

/// agent_factory task type: the reduced graph creates the agent, emits
/// `new_agent_created` with the full definition, and the agent is listed
/// afterwards.
#[tokio::test]
async fn factory_task_creates_a_persisted_agent() {
    let plan = json!({"title": "make a stock analyzer", "steps": []}).to_string();
    let llm = Arc::new(MockLlm::new(vec![
        MockReply::text("handoff_to_planner"),
        MockReply::text(plan),
        MockReply::structured(json!({"next": "agent_factory"})),
        MockReply::structured(json!({
            "agent_name": "stock_analyzer",
            "agent_description": "Analyzes stocks using tavily search",
            "llm_type": "basic",
            "selected_tools": [{"name": "tavily_tool"}],
            "prompt": "Analyze stocks with search. Plan: <<FULL_PLAN>>",
        })),
        MockReply::structured(json!({"next": "FINISH"})),
    ]));
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(llm, dir.path());

    let events = drain(
        &service,
        request(
            "u2",
            TaskType::AgentFactory,
            "make me a stock analyzer using tavily",
        ),
    )
    .await;

    let payload = events
        .iter()
        .find_map(|e| match e {
            WorkflowEvent::NewAgentCreated { data, .. } => Some(data.clone()),
            _ => None,
        })
        .expect("new_agent_created event");
    assert_eq!(payload.agent_name, "stock_analyzer");
    assert_eq!(payload.definition["user_id"], "u2");
    assert_eq!(events.last().unwrap().tag(), "end_of_workflow");

    let matched = service.agents().list(Some("u2"), Some("stock")).unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].agent_name, "stock_analyzer");
}

/// Publisher naming an agent outside the roster is a protocol error (I4).
#[tokio::test]
async fn publisher_off_roster_choice_is_a_protocol_error() {
    let plan = json!({"steps": []}).to_string();
    let llm = Arc::new(MockLlm::new(vec![
        MockReply::text("handoff_to_planner"),
        MockReply::text(plan),
        MockReply::structured(json!({"next": "stranger"})),
    ]));
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(llm, dir.path());

    let events = drain(&service, request("u1", TaskType::AgentWorkflow, "task")).await;
    let error = events
        .iter()
        .find_map(|e| match e {
            WorkflowEvent::Error { data } => Some(data.error.clone()),
            _ => None,
        })
        .expect("error event");
    assert_eq!(error.kind, ErrorKind::Protocol);
}

/// Cancelling the stream's token stops the run; the stream terminates.
#[tokio::test]
async fn cancelling_the_consumer_stops_the_run() {
    let llm = Arc::new(MockLlm::always("handoff_to_planner"));
    let dir = tempfile::tempdir().unwrap();
    let service = build_service(llm, dir.path());

    let mut stream = service
        .run(request("u1", TaskType::AgentWorkflow, "task"))
        .unwrap();
    let first = stream.next().await.expect("first event");
    assert_eq!(first.tag(), "start_of_workflow");
    stream.cancel_token().cancel();
    // the producer stops; the channel drains and closes
    while stream.next().await.is_some() {}
}
