//! Route handlers. Every response body is newline-delimited JSON.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use cooragent::{
    default_agents, default_tool_specs, AgentDefinition, AgentRequest, RegistryError,
};

use super::app::AppState;

const NDJSON: &str = "application/x-ndjson";

fn ndjson_body(lines: Vec<String>) -> Response {
    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    ([(header::CONTENT_TYPE, NDJSON)], body).into_response()
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({"result": "error", "message": message}))).into_response()
}

/// POST `/v1/workflow`: runs the orchestration graph and streams its events.
pub async fn workflow(State(state): State<AppState>, Json(request): Json<AgentRequest>) -> Response {
    match state.service.run(request) {
        Ok(stream) => {
            let body = Body::from_stream(stream.map(|event| {
                let line = event.to_ndjson_line().unwrap_or_else(|e| {
                    warn!(error = %e, "failed to serialize event");
                    String::new()
                });
                Ok::<_, std::convert::Infallible>(Bytes::from(line))
            }));
            ([(header::CONTENT_TYPE, NDJSON)], body).into_response()
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListAgentsRequest {
    pub user_id: Option<String>,
    #[serde(rename = "match", default)]
    pub pattern: Option<String>,
}

/// POST `/v1/list_agents`: one definition per line, filtered by visibility
/// and optional regex.
pub async fn list_agents(
    State(state): State<AppState>,
    Json(request): Json<ListAgentsRequest>,
) -> Response {
    match state
        .agents()
        .list(request.user_id.as_deref(), request.pattern.as_deref())
    {
        Ok(agents) => ndjson_body(
            agents
                .iter()
                .filter_map(|def| serde_json::to_string(def.as_ref()).ok())
                .collect(),
        ),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// GET `/v1/list_default_agents`.
pub async fn list_default_agents() -> Response {
    ndjson_body(
        default_agents()
            .iter()
            .filter_map(|def| serde_json::to_string(def).ok())
            .collect(),
    )
}

/// GET `/v1/list_default_tools`.
pub async fn list_default_tools() -> Response {
    ndjson_body(
        default_tool_specs()
            .iter()
            .filter_map(|spec| serde_json::to_string(spec).ok())
            .collect(),
    )
}

/// POST `/v1/edit_agent`: full-record replacement.
pub async fn edit_agent(
    State(state): State<AppState>,
    Json(definition): Json<AgentDefinition>,
) -> Response {
    match state.agents().edit(definition) {
        Ok(_) => ndjson_body(vec![json!({"result": "success"}).to_string()]),
        Err(RegistryError::NotFound(_)) => {
            ndjson_body(vec![json!({"result": "agent not found"}).to_string()])
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct RemoveAgentRequest {
    pub user_id: String,
    pub agent_name: String,
}

/// POST `/v1/remove_agent`.
pub async fn remove_agent(
    State(state): State<AppState>,
    Json(request): Json<RemoveAgentRequest>,
) -> Response {
    match state
        .agents()
        .remove(&request.user_id, &request.agent_name)
    {
        Ok(()) => ndjson_body(vec![json!({
            "result": "success",
            "message": format!("agent {} removed", request.agent_name),
        })
        .to_string()]),
        Err(e) => ndjson_body(vec![json!({
            "result": "error",
            "message": e.to_string(),
        })
        .to_string()]),
    }
}
